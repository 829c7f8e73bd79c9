//! Player item
//!
//! Aggregates a playlist, its parsed segments and qualities, the buffering
//! and status flags, and the per-item error log. Owned by whichever player
//! is currently playing it and replaced wholesale by the next load.

use crate::{
    buffer::BufferFlags,
    error_log::{ErrorLog, ErrorLogEvent},
    types::{ItemStatus, Playlist, Quality, Resolution, Segment},
};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerItem {
    /// Locator the item was loaded from
    pub locator: Url,
    /// The parsed playlist
    pub playlist: Playlist,
    /// Parsed media segments, in playlist order
    pub segments: Vec<Segment>,
    /// Variant (quality) references, in playlist order
    pub qualities: Vec<Url>,
    /// Quality selected at load time; never re-evaluated
    pub quality: Quality,
    /// Buffering flags, written by the buffer monitor on every check
    pub buffer_empty: bool,
    pub likely_to_keep_up: bool,
    pub buffer_full: bool,
    /// Load status
    pub status: ItemStatus,
    /// Size reported by the decoder, once frames arrive
    pub presentation_size: Option<Resolution>,
    /// Append-only failure record
    pub error_log: ErrorLog,
    /// Whether any failure has been recorded for this item
    pub error_occurred: bool,
}

impl PlayerItem {
    pub fn new(locator: Url, playlist: Playlist, quality: Quality) -> Self {
        let segments = playlist.segments.clone();
        let qualities = playlist.variants.clone();
        Self {
            locator,
            playlist,
            segments,
            qualities,
            quality,
            buffer_empty: false,
            likely_to_keep_up: false,
            buffer_full: false,
            status: ItemStatus::Unknown,
            presentation_size: None,
            error_log: ErrorLog::new(),
            error_occurred: false,
        }
    }

    /// Item shell for a locator whose playlist never loaded
    pub fn failed(locator: Url, quality: Quality) -> Self {
        let mut item = Self::new(locator, Playlist::default(), quality);
        item.status = ItemStatus::Failed;
        item
    }

    /// Overwrite the three buffering flags; called on every monitor check
    pub fn apply_buffer_flags(&mut self, flags: BufferFlags) {
        self.buffer_empty = flags.is_buffer_empty;
        self.likely_to_keep_up = flags.likely_to_keep_up;
        self.buffer_full = flags.is_buffer_full;
    }

    /// Append to the error log and mark the item as having erred
    pub fn record_error(&mut self, message: impl Into<String>) -> ErrorLogEvent {
        self.error_occurred = true;
        self.error_log.append(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> PlayerItem {
        PlayerItem::new(
            Url::parse("https://example.com/playlist.m3u8").unwrap(),
            Playlist::default(),
            Quality::Auto,
        )
    }

    #[test]
    fn test_new_item_defaults() {
        let item = item();
        assert_eq!(item.status, ItemStatus::Unknown);
        assert!(!item.error_occurred);
        assert!(item.error_log.is_empty());
        assert!(item.presentation_size.is_none());
    }

    #[test]
    fn test_apply_buffer_flags() {
        let mut item = item();
        item.apply_buffer_flags(BufferFlags {
            is_buffer_empty: true,
            likely_to_keep_up: false,
            is_buffer_full: true,
        });
        assert!(item.buffer_empty);
        assert!(!item.likely_to_keep_up);
        assert!(item.buffer_full);
    }

    #[test]
    fn test_record_error_sets_flag() {
        let mut item = item();
        let event = item.record_error("segment 3 unreachable");
        assert!(item.error_occurred);
        assert_eq!(item.error_log.last().unwrap(), &event);
    }

    #[test]
    fn test_failed_shell() {
        let item = PlayerItem::failed(
            Url::parse("https://example.com/missing.m3u8").unwrap(),
            Quality::Explicit(1),
        );
        assert_eq!(item.status, ItemStatus::Failed);
        assert!(item.segments.is_empty());
        assert_eq!(item.quality, Quality::Explicit(1));
    }
}
