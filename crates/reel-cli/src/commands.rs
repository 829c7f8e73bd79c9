//! CLI command implementations

use crate::output::{to_json, OutputFormat};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use reel_core::{
    ActionAtItemEnd, AudioSink, FormatDescriptor, HttpFetcher, MediaFetcher, NullAudioSink,
    NullDisplaySink, PassthroughDecoder, Player, PlayerConfig, PlayerEvent, PlaylistParser,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use url::Url;

/// Interpret the argument as an absolute URL, falling back to a local path.
fn locator(playlist: &str) -> anyhow::Result<Url> {
    if let Ok(url) = Url::parse(playlist) {
        return Ok(url);
    }
    let path = std::fs::canonicalize(Path::new(playlist))
        .with_context(|| format!("no such playlist: {playlist}"))?;
    Url::from_file_path(&path).map_err(|_| anyhow::anyhow!("not a usable path: {playlist}"))
}

/// Local-file fetcher for `file://` locators
struct FsFetcher;

#[async_trait]
impl MediaFetcher for FsFetcher {
    async fn fetch(&self, url: &Url) -> reel_core::Result<Bytes> {
        let path = url
            .to_file_path()
            .map_err(|_| reel_core::Error::SegmentFetch {
                url: url.to_string(),
                message: "not a file path".into(),
            })?;
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }
}

fn fetcher_for(url: &Url, timeout_ms: u64) -> anyhow::Result<Arc<dyn MediaFetcher>> {
    if url.scheme() == "file" {
        Ok(Arc::new(FsFetcher))
    } else {
        Ok(Arc::new(HttpFetcher::new(Duration::from_millis(
            timeout_ms,
        ))?))
    }
}

async fn fetch_playlist(playlist: &str) -> anyhow::Result<(Bytes, Url, Arc<dyn MediaFetcher>)> {
    let url = locator(playlist)?;
    let fetcher = fetcher_for(&url, PlayerConfig::default().request_timeout_ms)?;
    let bytes = fetcher
        .fetch(&url)
        .await
        .with_context(|| format!("fetching {url}"))?;
    tracing::debug!(%url, bytes = bytes.len(), "Playlist fetched");
    Ok((bytes, url, fetcher))
}

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Duration (s)")]
    duration: String,
    #[tabled(rename = "URI")]
    uri: String,
}

#[derive(Serialize)]
struct AnalyzeReport {
    segment_count: usize,
    variant_count: usize,
    total_duration_secs: f64,
    segments: Vec<SegmentReport>,
    variants: Vec<String>,
}

#[derive(Serialize)]
struct SegmentReport {
    uri: String,
    duration: f64,
}

/// Parse a playlist and report its contents
pub async fn analyze(playlist: &str, format: &str) -> anyhow::Result<()> {
    let (bytes, url, _) = fetch_playlist(playlist).await?;
    let parsed = PlaylistParser::parse(&bytes, &url)?;

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            let report = AnalyzeReport {
                segment_count: parsed.segments.len(),
                variant_count: parsed.variants.len(),
                total_duration_secs: parsed.total_duration(),
                segments: parsed
                    .segments
                    .iter()
                    .map(|s| SegmentReport {
                        uri: s.uri.to_string(),
                        duration: s.duration,
                    })
                    .collect(),
                variants: parsed.variants.iter().map(|v| v.to_string()).collect(),
            };
            println!("{}", to_json(&report));
        }
        OutputFormat::Text => {
            println!("{} {}", style("Playlist:").bold(), url);
            println!(
                "  {} segments, {} variants, {:.1}s total",
                parsed.segments.len(),
                parsed.variants.len(),
                parsed.total_duration()
            );

            if !parsed.segments.is_empty() {
                let rows: Vec<SegmentRow> = parsed
                    .segments
                    .iter()
                    .enumerate()
                    .map(|(index, s)| SegmentRow {
                        index,
                        duration: format!("{:.2}", s.duration),
                        uri: s.uri.to_string(),
                    })
                    .collect();
                println!("\n{}", Table::new(rows));
            }

            if !parsed.variants.is_empty() {
                println!("\n{}", style("Variants:").bold());
                for (i, v) in parsed.variants.iter().enumerate() {
                    println!("  {}. {}", i + 1, v);
                }
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct ProbeReport {
    first_segment: String,
    payload_bytes: usize,
    sequence_parameter_set_bytes: usize,
    picture_parameter_set_bytes: usize,
}

/// Fetch the first segment and report the extracted stream format
pub async fn probe(playlist: &str, format: &str) -> anyhow::Result<()> {
    let (bytes, url, fetcher) = fetch_playlist(playlist).await?;
    let parsed = PlaylistParser::parse(&bytes, &url)?;

    let Some(first) = parsed.segments.first() else {
        anyhow::bail!("playlist has no segments to probe");
    };

    let payload = fetcher
        .fetch(&first.uri)
        .await
        .with_context(|| format!("fetching first segment {}", first.uri))?;

    match FormatDescriptor::from_payload(&payload) {
        Ok(descriptor) => match OutputFormat::from(format) {
            OutputFormat::Json => {
                let report = ProbeReport {
                    first_segment: first.uri.to_string(),
                    payload_bytes: payload.len(),
                    sequence_parameter_set_bytes: descriptor.sequence_parameter_set.len(),
                    picture_parameter_set_bytes: descriptor.picture_parameter_set.len(),
                };
                println!("{}", to_json(&report));
            }
            OutputFormat::Text => {
                println!("{} {}", style("First segment:").bold(), first.uri);
                println!("  payload: {} bytes", payload.len());
                println!(
                    "  sequence parameter set: {} bytes",
                    descriptor.sequence_parameter_set.len()
                );
                println!(
                    "  picture parameter set: {} bytes",
                    descriptor.picture_parameter_set.len()
                );
                println!("{}", style("Format extraction OK").green());
            }
        },
        Err(e) => {
            eprintln!("{} {e}", style("Format extraction failed:").red());
            std::process::exit(1);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct PlaybackReport {
    passes: u32,
    segments: usize,
    audio_units_enqueued: u64,
    frames_presented: u64,
    error_entries: usize,
    buffer_empty: bool,
    likely_to_keep_up: bool,
    buffer_full: bool,
}

/// Run a headless playback pass with stub collaborators
pub async fn play(playlist: &str, loop_item: bool, passes: u32, format: &str) -> anyhow::Result<()> {
    let url = locator(playlist)?;
    let mut config = PlayerConfig::default();
    if loop_item {
        config.action_at_item_end = ActionAtItemEnd::Loop;
    }
    let fetcher = fetcher_for(&url, config.request_timeout_ms)?;

    let audio = Arc::new(NullAudioSink::new());
    let display = Arc::new(NullDisplaySink::new());
    let player = Player::new(
        config,
        fetcher,
        Arc::new(PassthroughDecoder::new()),
        Arc::clone(&display) as _,
        Arc::clone(&audio) as Arc<dyn AudioSink>,
    );
    let mut events = player.subscribe_events();

    player.load(&url).await?;
    let item = player
        .current_item()
        .await
        .context("no item after load")?;
    if item.segments.is_empty() {
        println!("Playlist has no segments; nothing to play.");
        return Ok(());
    }

    let total_passes = if loop_item { passes.max(1) } else { 1 };
    let bar = ProgressBar::new(item.segments.len() as u64 * total_passes as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} [{bar:40}] {pos}/{len} segments",
    )?);

    player.play().await;

    let mut completed = 0u32;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PlayerEvent::PlaybackEnded) => {
                    completed += 1;
                    if !loop_item || completed >= total_passes {
                        break;
                    }
                }
                Ok(PlayerEvent::ErrorLogged { event }) => {
                    bar.println(format!("{} {}", style("error:").red(), event.message));
                }
                Ok(PlayerEvent::LoadFailed { message }) => {
                    bar.println(format!("{} {}", style("load failed:").red(), message));
                    break;
                }
                Err(_) => break,
            },
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                let index = player.current_segment_index().await as u64;
                let position = completed as u64 * item.segments.len() as u64 + index;
                bar.set_position(position.min(bar.length().unwrap_or(position)));
            }
        }
    }

    player.stop().await;
    bar.finish_and_clear();

    let item = player.current_item().await.context("item disappeared")?;
    let report = PlaybackReport {
        passes: completed,
        segments: item.segments.len(),
        audio_units_enqueued: audio.enqueued(),
        frames_presented: display.presented(),
        error_entries: item.error_log.len(),
        buffer_empty: item.buffer_empty,
        likely_to_keep_up: item.likely_to_keep_up,
        buffer_full: item.buffer_full,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&report)),
        OutputFormat::Text => {
            println!("{}", style("Playback finished").bold());
            println!("  passes: {}", report.passes);
            println!("  segments per pass: {}", report.segments);
            println!("  audio units enqueued: {}", report.audio_units_enqueued);
            println!("  frames presented: {}", report.frames_presented);
            println!("  error log entries: {}", report.error_entries);
            println!(
                "  buffer: empty={} keep_up={} full={}",
                report.buffer_empty, report.likely_to_keep_up, report.buffer_full
            );
        }
    }

    Ok(())
}
