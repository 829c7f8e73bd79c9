//! Reel CLI - Headless Playback Engine Driver
//!
//! Features:
//! - Playlist analysis (segments, variants, totals)
//! - Stream format probing (parameter-set extraction)
//! - Headless playback runs with stub decode collaborators

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// Reel CLI - adaptive streaming toolkit
#[derive(Parser)]
#[command(name = "reel-cli")]
#[command(author = "Reel Maintainers")]
#[command(version)]
#[command(about = "Playlist analysis and headless playback toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a playlist and report its segments and variants
    Analyze {
        /// URL or path to the playlist
        playlist: String,
    },

    /// Fetch the first segment and report its stream format
    Probe {
        /// URL or path to the playlist
        playlist: String,
    },

    /// Run a headless playback pass over the playlist
    Play {
        /// URL or path to the playlist
        playlist: String,

        /// Loop at end of item instead of pausing
        #[arg(long)]
        loop_item: bool,

        /// Number of passes to run before stopping (with --loop-item)
        #[arg(short, long, default_value = "1")]
        passes: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(level).init();

    match cli.command {
        Commands::Analyze { playlist } => {
            commands::analyze(&playlist, &cli.format).await?;
        }
        Commands::Probe { playlist } => {
            commands::probe(&playlist, &cli.format).await?;
        }
        Commands::Play {
            playlist,
            loop_item,
            passes,
        } => {
            commands::play(&playlist, loop_item, passes, &cli.format).await?;
        }
    }

    Ok(())
}
