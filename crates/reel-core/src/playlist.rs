//! Segmented-media playlist parsing
//!
//! Implements the playlist subset this engine recognizes:
//! - `#EXT-X-STREAM-INF` variant references
//! - `#EXTINF:<number>,<title>` segment durations
//! - bare locator lines, resolved against the playlist URL
//!
//! All other `#`-prefixed lines and blank lines are ignored.

use crate::{
    error::{Error, Result},
    types::{Playlist, Segment},
};
use tracing::{debug, warn};
use url::Url;

/// Marker for a variant (quality) reference line
const STREAM_INF_MARKER: &str = "#EXT-X-STREAM-INF";
/// Marker for a segment duration line
const EXTINF_MARKER: &str = "#EXTINF:";

/// Line-scanning playlist parser.
///
/// The scan keeps one piece of pending state: a duration waiting for the
/// next locator line. Two consecutive duration lines overwrite the pending
/// value, so only the last one is ever attached to a segment. A locator
/// line with no pending duration yields nothing. Variant references are
/// taken from the marker line itself; attribute lists that do not form an
/// absolute URL are dropped.
pub struct PlaylistParser;

impl PlaylistParser {
    /// Parse playlist text into an ordered segment and variant list.
    ///
    /// Fails only when the input is not valid UTF-8; a zero-segment result
    /// is valid.
    pub fn parse(bytes: &[u8], base: &Url) -> Result<Playlist> {
        let text = std::str::from_utf8(bytes).map_err(Error::PlaylistDecode)?;
        Ok(Self::parse_text(text, base))
    }

    fn parse_text(text: &str, base: &Url) -> Playlist {
        let mut segments = Vec::new();
        let mut variants = Vec::new();
        let mut pending_duration: Option<f64> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(STREAM_INF_MARKER) {
                if let Some(candidate) = Self::extract_variant(line) {
                    variants.push(candidate);
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix(EXTINF_MARKER) {
                // Last-wins: a still-pending duration is silently replaced.
                pending_duration = Self::parse_duration_field(rest);
                continue;
            }

            if line.starts_with('#') {
                continue;
            }

            // Locator line. Without a pending duration it yields nothing.
            if let Some(duration) = pending_duration.take() {
                match base.join(line) {
                    Ok(uri) => segments.push(Segment { uri, duration }),
                    Err(e) => warn!(line, error = %e, "Dropping unresolvable locator line"),
                }
            }
        }

        debug!(
            segments = segments.len(),
            variants = variants.len(),
            "Playlist parsed"
        );

        Playlist { segments, variants }
    }

    /// Variant locator extraction from the marker line itself.
    ///
    /// Attribute lists (`BANDWIDTH=...`) are not absolute URLs and fall out
    /// here.
    fn extract_variant(line: &str) -> Option<Url> {
        let rest = line.split_once(':').map(|(_, rest)| rest)?;
        Url::parse(rest.trim()).ok()
    }

    /// Numeric field of a `#EXTINF:<number>,<title>` line, up to the first
    /// comma. An unparseable field clears any stale pending value.
    fn parse_duration_field(rest: &str) -> Option<f64> {
        let field = rest.split(',').next().unwrap_or(rest);
        field.trim().parse::<f64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://cdn.example.com/stream/playlist.m3u8").unwrap()
    }

    #[test]
    fn test_parse_preserves_order_and_durations() {
        let text = "#EXTM3U\n#EXTINF:4.0,first\nseg0.ts\n#EXTINF:6.5,second\nseg1.ts\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();

        assert_eq!(playlist.segments.len(), 2);
        assert_eq!(playlist.segments[0].duration, 4.0);
        assert_eq!(
            playlist.segments[0].uri.as_str(),
            "https://cdn.example.com/stream/seg0.ts"
        );
        assert_eq!(playlist.segments[1].duration, 6.5);
        assert_eq!(
            playlist.segments[1].uri.as_str(),
            "https://cdn.example.com/stream/seg1.ts"
        );
    }

    #[test]
    fn test_pending_duration_last_wins() {
        let text = "#EXTINF:4.0,\n#EXTINF:9.0,\nseg0.ts\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();

        assert_eq!(playlist.segments.len(), 1);
        assert_eq!(playlist.segments[0].duration, 9.0);
    }

    #[test]
    fn test_unparseable_duration_clears_pending() {
        // The bad EXTINF wipes the stale 4.0, so the locator has no duration.
        let text = "#EXTINF:4.0,\n#EXTINF:abc,\nseg0.ts\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();
        assert!(playlist.segments.is_empty());
    }

    #[test]
    fn test_locator_without_duration_is_ignored() {
        let text = "orphan.ts\n#EXTINF:4.0,\nseg0.ts\nsecond-orphan.ts\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();

        assert_eq!(playlist.segments.len(), 1);
        assert_eq!(
            playlist.segments[0].uri.as_str(),
            "https://cdn.example.com/stream/seg0.ts"
        );
    }

    #[test]
    fn test_variant_attribute_line_is_dropped() {
        let text = "#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=640x360\nlow.m3u8\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();
        assert!(playlist.variants.is_empty());
        // The following locator line has no pending duration either.
        assert!(playlist.segments.is_empty());
    }

    #[test]
    fn test_variant_absolute_url_is_kept() {
        let text = "#EXT-X-STREAM-INF:https://cdn.example.com/stream/hi.m3u8\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();

        assert_eq!(playlist.variants.len(), 1);
        assert_eq!(
            playlist.variants[0].as_str(),
            "https://cdn.example.com/stream/hi.m3u8"
        );
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let text = "#EXTM3U\n\n#EXT-X-VERSION:3\n\n#EXT-X-ENDLIST\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();
        assert!(playlist.segments.is_empty());
        assert!(playlist.variants.is_empty());
    }

    #[test]
    fn test_zero_segment_playlist_is_valid() {
        let playlist = PlaylistParser::parse(b"", &base()).unwrap();
        assert!(playlist.is_empty());
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let result = PlaylistParser::parse(&[0xff, 0xfe, 0x00], &base());
        assert!(matches!(result, Err(Error::PlaylistDecode(_))));
    }

    #[test]
    fn test_duration_without_comma() {
        let text = "#EXTINF:3.25\nseg0.ts\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();
        assert_eq!(playlist.segments.len(), 1);
        assert_eq!(playlist.segments[0].duration, 3.25);
    }

    #[test]
    fn test_end_to_end_sample() {
        let text = "#EXTINF:4.0,\nseg0.ts\n#EXTINF:6.0,\nseg1.ts\n";
        let playlist = PlaylistParser::parse(text.as_bytes(), &base()).unwrap();

        assert_eq!(playlist.segments.len(), 2);
        assert_eq!(playlist.segments[0].duration, 4.0);
        assert_eq!(playlist.segments[1].duration, 6.0);
        assert!(playlist.variants.is_empty());
        assert_eq!(playlist.total_duration(), 10.0);
    }
}
