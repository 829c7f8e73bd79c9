//! Reel Core - Adaptive Streaming Playback Engine
//!
//! This crate provides the core functionality for segmented-media playback:
//! - Playlist parsing into segments and variant references
//! - Sequential segment scheduling and fetching
//! - Decode pipeline orchestration with pluggable decoder and sinks
//! - Buffering telemetry (empty / likely-to-keep-up / full)
//! - Playback control: play, pause, stop, seek, loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Reel Core                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐             │
//! │  │  Playlist  │  │  Segment   │  │   Buffer   │             │
//! │  │   Parser   │  │ Scheduler  │  │  Monitor   │             │
//! │  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘             │
//! │        │               │               │                    │
//! │        └───────────────┼───────────────┘                    │
//! │                        │                                    │
//! │                 ┌──────┴──────┐                             │
//! │                 │   Player    │                             │
//! │                 └──────┬──────┘                             │
//! │                        │                                    │
//! │  ┌────────────┐  ┌─────┴──────┐  ┌────────────┐             │
//! │  │   Decode   │  │   Event    │  │ PlayerItem │             │
//! │  │  Pipeline  │  │    Bus     │  │ + ErrorLog │             │
//! │  └────────────┘  └────────────┘  └────────────┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The decoder, display sink, audio sink, and network transport are
//! external collaborators behind traits; the engine defines the contracts
//! it needs from them and nothing more.

pub mod buffer;
pub mod error;
pub mod error_log;
pub mod events;
pub mod fetch;
pub mod format;
pub mod item;
pub mod pipeline;
pub mod player;
pub mod playlist;
pub mod scheduler;
pub mod types;

pub use buffer::{BufferFlags, BufferMonitor};
pub use error::{Error, ParameterSetKind, Result};
pub use error_log::{ErrorLog, ErrorLogEvent};
pub use events::PlayerEvent;
pub use fetch::{HttpFetcher, MapFetcher, MediaFetcher};
pub use format::FormatDescriptor;
pub use item::PlayerItem;
pub use pipeline::{
    AudioSink, DecodePipeline, DecodeSessionId, Decoder, DisplaySink, NullAudioSink,
    NullDisplaySink, PassthroughDecoder, VideoFrame,
};
pub use player::Player;
pub use playlist::PlaylistParser;
pub use scheduler::{ScheduleOutcome, SegmentScheduler};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Reel Core initialized");
}
