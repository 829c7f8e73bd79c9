//! Error types for Reel Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Playlist errors
    #[error("Playlist is not valid UTF-8")]
    PlaylistDecode(#[from] std::str::Utf8Error),

    #[error("Failed to fetch playlist {url}: {message}")]
    PlaylistFetch { url: String, message: String },

    // Segment errors
    #[error("Failed to fetch segment {url}: {message}")]
    SegmentFetch { url: String, message: String },

    // Format extraction errors
    #[error("No {kind} parameter set found in stream payload")]
    MissingParameterSet { kind: ParameterSetKind },

    // Decode errors
    #[error("Decoder rejected stream format: {0}")]
    SessionCreation(String),

    #[error("No decode session established")]
    NoSession,

    #[error("Failed to decode segment payload: {0}")]
    Decode(String),

    // Playback errors
    #[error("No item loaded")]
    NoItem,

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid locator: {0}")]
    InvalidLocator(#[from] url::ParseError),

    // Internal errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two required out-of-band parameter blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetKind {
    Sequence,
    Picture,
}

impl std::fmt::Display for ParameterSetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterSetKind::Sequence => write!(f, "sequence"),
            ParameterSetKind::Picture => write!(f, "picture"),
        }
    }
}

impl Error {
    /// Returns true if playback can continue past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SegmentFetch { .. } | Error::Decode(_) | Error::Network(_)
        )
    }

    /// Returns the error code for log entries
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::PlaylistDecode(_) => "PLAYLIST_DECODE",
            Error::PlaylistFetch { .. } => "PLAYLIST_FETCH",
            Error::SegmentFetch { .. } => "SEGMENT_FETCH",
            Error::MissingParameterSet { .. } => "FORMAT_EXTRACTION",
            Error::SessionCreation(_) => "SESSION_CREATION",
            Error::NoSession => "NO_SESSION",
            Error::Decode(_) => "DECODE",
            Error::NoItem => "NO_ITEM",
            Error::Network(_) => "NETWORK",
            Error::InvalidLocator(_) => "INVALID_LOCATOR",
            Error::Io(_) => "IO",
        }
    }
}
