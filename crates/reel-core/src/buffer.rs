//! Buffering heuristic
//!
//! Derives three boolean buffering signals from rolling read counters and
//! the accumulated buffered duration. Counters are reset once per window
//! so the flags always describe recent history.

use crate::types::BufferConfig;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// Derived buffering signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferFlags {
    pub is_buffer_empty: bool,
    pub likely_to_keep_up: bool,
    pub is_buffer_full: bool,
}

#[derive(Debug)]
struct Counters {
    successful_reads: u32,
    failed_reads: u32,
    buffer_duration: f64,
    last_check: Instant,
}

/// Rolling buffer monitor for the active item
pub struct BufferMonitor {
    config: BufferConfig,
    counters: RwLock<Counters>,
}

impl BufferMonitor {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            counters: RwLock::new(Counters {
                successful_reads: 0,
                failed_reads: 0,
                buffer_duration: 0.0,
                last_check: Instant::now(),
            }),
        }
    }

    /// Record one fetch completion
    pub async fn record_result(&self, success: bool) {
        let mut counters = self.counters.write().await;
        if success {
            counters.successful_reads += 1;
        } else {
            counters.failed_reads += 1;
        }
    }

    /// Accumulate buffered media duration from a successful fetch
    pub async fn add_buffered(&self, seconds: f64) {
        let mut counters = self.counters.write().await;
        counters.buffer_duration += seconds;
    }

    /// Compute the current flags, then reset the counters if the window has
    /// elapsed. The reset happens after flag computation, so the returned
    /// flags always reflect the pre-reset counters.
    pub async fn check(&self) -> BufferFlags {
        self.check_at(Instant::now()).await
    }

    async fn check_at(&self, now: Instant) -> BufferFlags {
        let mut counters = self.counters.write().await;

        let flags = BufferFlags {
            is_buffer_empty: counters.failed_reads >= self.config.empty_failure_threshold,
            likely_to_keep_up: counters.successful_reads > counters.failed_reads,
            is_buffer_full: counters.buffer_duration >= self.config.full_duration_secs,
        };

        if now.duration_since(counters.last_check).as_secs_f64() > self.config.counter_window_secs {
            debug!(
                successful = counters.successful_reads,
                failed = counters.failed_reads,
                buffered = counters.buffer_duration,
                "Buffer counter window elapsed, resetting"
            );
            counters.successful_reads = 0;
            counters.failed_reads = 0;
            counters.buffer_duration = 0.0;
            counters.last_check = now;
        }

        flags
    }

    /// Reset all counters, e.g. when the item is replaced
    pub async fn reset(&self) {
        let mut counters = self.counters.write().await;
        counters.successful_reads = 0;
        counters.failed_reads = 0;
        counters.buffer_duration = 0.0;
        counters.last_check = Instant::now();
    }
}
