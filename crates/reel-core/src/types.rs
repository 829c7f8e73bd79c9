//! Core types for Reel

use serde::{Deserialize, Serialize};
use url::Url;

/// One fetchable, independently decodable chunk of the media timeline.
///
/// Immutable once parsed; segment order is appearance order in the playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Absolute URI to fetch the segment
    pub uri: Url,
    /// Duration of this segment in seconds
    pub duration: f64,
}

/// Ordered manifest of segments and variant (quality) references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Media segments in source order
    pub segments: Vec<Segment>,
    /// Variant stream references in source order
    pub variants: Vec<Url>,
}

impl Playlist {
    /// Total declared duration in seconds
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Quality selection for an item.
///
/// Chosen once when the item is loaded; the engine never re-evaluates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    /// Let the platform pick
    Auto,
    /// Index into the item's variant list
    Explicit(usize),
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Auto
    }
}

/// Load status of a player item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Unknown,
    ReadyToPlay,
    Failed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Unknown => write!(f, "unknown"),
            ItemStatus::ReadyToPlay => write!(f, "ready_to_play"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What the controller does when the segment list is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionAtItemEnd {
    Pause,
    Stop,
    Loop,
}

impl Default for ActionAtItemEnd {
    fn default() -> Self {
        ActionAtItemEnd::Pause
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// Initial state, no content playing
    Idle,
    /// Content is playing
    Playing,
    /// Playback paused, session preserved
    Paused,
    /// Playback stopped, session torn down; terminal until restarted
    Stopped,
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }

    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        match (self, target) {
            // stop() is unconditional
            (_, Stopped) => true,
            // play() restarts from anywhere except an active Playing state
            (Idle, Playing) | (Paused, Playing) | (Stopped, Playing) => true,
            // pause() only applies while playing
            (Playing, Paused) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Mutable playback bookkeeping, owned exclusively by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Current state machine state
    pub state: PlayerState,
    /// Index of the next segment to schedule; always in `[0, segments.len()]`
    pub current_segment_index: usize,
    /// End-of-item behavior
    pub action_at_item_end: ActionAtItemEnd,
    /// Playback clock in seconds, segment-granularity
    pub current_time: f64,
}

impl PlaybackState {
    pub fn new(action_at_item_end: ActionAtItemEnd) -> Self {
        Self {
            state: PlayerState::Idle,
            current_segment_index: 0,
            action_at_item_end,
            current_time: 0.0,
        }
    }
}

/// Buffering heuristic thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Failed reads at or above this count flag the buffer empty
    pub empty_failure_threshold: u32,
    /// Accumulated buffered seconds at or above this flag the buffer full
    pub full_duration_secs: f64,
    /// Rolling counters reset after this many seconds
    pub counter_window_secs: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            empty_failure_threshold: 3,
            full_duration_secs: 5.0,
            counter_window_secs: 1.0,
        }
    }
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// End-of-item behavior
    pub action_at_item_end: ActionAtItemEnd,
    /// Initial audio volume, 0.0..=1.0
    pub volume: f32,
    /// Buffering thresholds
    pub buffer: BufferConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            action_at_item_end: ActionAtItemEnd::Pause,
            volume: 1.0,
            buffer: BufferConfig::default(),
        }
    }
}
