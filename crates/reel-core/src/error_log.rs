//! Per-item error log
//!
//! Append-only, time-ordered record of playback failures. Entries are never
//! mutated or removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEvent {
    /// When the failure was recorded
    pub timestamp: DateTime<Utc>,
    /// Human-readable description
    pub message: String,
}

/// Append-only error log for a player item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorLog {
    events: Vec<ErrorLogEvent>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure, stamped with the current time.
    ///
    /// Timestamps are clamped against the previous entry so the log stays
    /// non-decreasing even if the wall clock steps backwards.
    pub fn append(&mut self, message: impl Into<String>) -> ErrorLogEvent {
        let mut timestamp = Utc::now();
        if let Some(last) = self.events.last() {
            if timestamp < last.timestamp {
                timestamp = last.timestamp;
            }
        }
        let event = ErrorLogEvent {
            timestamp,
            message: message.into(),
        };
        self.events.push(event.clone());
        event
    }

    /// All events in call order
    pub fn all(&self) -> &[ErrorLogEvent] {
        &self.events
    }

    /// Most recent event, if any
    pub fn last(&self) -> Option<&ErrorLogEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_call_order() {
        let mut log = ErrorLog::new();
        log.append("first");
        log.append("second");
        log.append("third");

        let messages: Vec<_> = log.all().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
        assert_eq!(log.last().unwrap().message, "third");
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut log = ErrorLog::new();
        for i in 0..10 {
            log.append(format!("event {i}"));
        }
        for pair in log.all().windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_empty_log() {
        let log = ErrorLog::new();
        assert!(log.is_empty());
        assert!(log.last().is_none());
        assert!(log.all().is_empty());
    }
}
