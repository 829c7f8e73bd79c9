//! Player observer events
//!
//! Delivered through a broadcast channel; observers subscribe via
//! [`Player::subscribe_events`](crate::Player::subscribe_events).

use crate::error_log::ErrorLogEvent;
use serde::{Deserialize, Serialize};

/// Signals raised on behalf of the current item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// The playlist or the item's first segment failed to load
    LoadFailed { message: String },

    /// The segment list was exhausted during playback
    PlaybackEnded,

    /// A new entry was appended to the item's error log
    ErrorLogged { event: ErrorLogEvent },
}
