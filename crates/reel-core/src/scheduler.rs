//! Segment scheduling
//!
//! Fetches segment payloads by index, sequentially, and hands them to the
//! decode pipeline. The current index advances when a segment is scheduled,
//! not when its fetch completes; a failed fetch is logged and skipped with
//! no retry, so the index never moves backwards on error.

use crate::{
    buffer::BufferMonitor,
    events::PlayerEvent,
    fetch::MediaFetcher,
    item::PlayerItem,
    pipeline::DecodePipeline,
    types::{PlaybackState, Segment},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, warn};

/// Result of a scheduling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A fetch was issued and the index advanced
    Scheduled,
    /// Nothing to do, playback is not active
    NotPlaying,
    /// The segment list is exhausted; the controller decides what happens
    EndOfList,
}

/// Sequential segment fetcher for the active item
pub struct SegmentScheduler {
    fetcher: Arc<dyn MediaFetcher>,
    pipeline: Arc<DecodePipeline>,
    monitor: Arc<BufferMonitor>,
    state: Arc<RwLock<PlaybackState>>,
    item: Arc<RwLock<Option<PlayerItem>>>,
    epoch: Arc<AtomicU64>,
    events: broadcast::Sender<PlayerEvent>,
    completions: mpsc::UnboundedSender<()>,
}

impl SegmentScheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        fetcher: Arc<dyn MediaFetcher>,
        pipeline: Arc<DecodePipeline>,
        monitor: Arc<BufferMonitor>,
        state: Arc<RwLock<PlaybackState>>,
        item: Arc<RwLock<Option<PlayerItem>>>,
        epoch: Arc<AtomicU64>,
        events: broadcast::Sender<PlayerEvent>,
        completions: mpsc::UnboundedSender<()>,
    ) -> Self {
        Self {
            fetcher,
            pipeline,
            monitor,
            state,
            item,
            epoch,
            events,
            completions,
        }
    }

    /// Issue an asynchronous fetch for the segment at `index`.
    ///
    /// Out-of-range indices are a no-op. The fetch is fire-and-forget; its
    /// completion is checked against the issue-time epoch so a late result
    /// for a replaced or stopped item is dropped.
    pub async fn load_segment(&self, index: usize) {
        let in_range = self
            .item
            .read()
            .await
            .as_ref()
            .map(|item| index < item.segments.len())
            .unwrap_or(false);
        if !in_range {
            debug!(index, "load_segment out of range, ignoring");
            return;
        }
        self.spawn_fetch(index, false);
    }

    /// Schedule the segment at the current index and advance.
    ///
    /// Only proceeds while playing and segments remain. The advance is
    /// unconditional, not gated on fetch success.
    pub async fn play_next_segment(&self) -> ScheduleOutcome {
        let segment_count = match self.item.read().await.as_ref() {
            Some(item) => item.segments.len(),
            None => return ScheduleOutcome::NotPlaying,
        };

        let index = {
            let mut state = self.state.write().await;
            if !state.state.is_playing() {
                return ScheduleOutcome::NotPlaying;
            }
            if state.current_segment_index >= segment_count {
                return ScheduleOutcome::EndOfList;
            }
            let index = state.current_segment_index;
            state.current_segment_index += 1;
            index
        };

        self.spawn_fetch(index, true);
        ScheduleOutcome::Scheduled
    }

    /// Spawn the fetch task for one segment. `chained` fetches signal the
    /// completion channel so the controller can schedule the next segment.
    fn spawn_fetch(&self, index: usize, chained: bool) {
        let issued_epoch = self.epoch.load(Ordering::SeqCst);
        let fetcher = Arc::clone(&self.fetcher);
        let pipeline = Arc::clone(&self.pipeline);
        let monitor = Arc::clone(&self.monitor);
        let state = Arc::clone(&self.state);
        let item = Arc::clone(&self.item);
        let epoch = Arc::clone(&self.epoch);
        let events = self.events.clone();
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let target = {
                let guard = item.read().await;
                guard.as_ref().and_then(|item| {
                    item.segments.get(index).map(|segment: &Segment| {
                        let cumulative_end: f64 = item.segments[..=index]
                            .iter()
                            .map(|s| s.duration)
                            .sum();
                        (segment.clone(), cumulative_end)
                    })
                })
            };
            let Some((segment, cumulative_end)) = target else {
                return;
            };

            debug!(index, uri = %segment.uri, "Fetching segment");
            let result = fetcher.fetch(&segment.uri).await;

            if epoch.load(Ordering::SeqCst) != issued_epoch {
                debug!(index, "Dropping stale fetch completion");
                return;
            }

            match result {
                Ok(payload) => {
                    monitor.record_result(true).await;
                    monitor.add_buffered(segment.duration).await;

                    match pipeline.decode(payload).await {
                        Ok(resolution) => {
                            if epoch.load(Ordering::SeqCst) == issued_epoch {
                                state.write().await.current_time = cumulative_end;
                                if let Some(resolution) = resolution {
                                    if let Some(item) = item.write().await.as_mut() {
                                        item.presentation_size = Some(resolution);
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            record_item_error(
                                &item,
                                &events,
                                format!("Failed to decode segment {index}: {e}"),
                            )
                            .await;
                        }
                    }
                }
                Err(e) => {
                    monitor.record_result(false).await;
                    record_item_error(
                        &item,
                        &events,
                        format!("Failed to fetch segment {index} ({}): {e}", segment.uri),
                    )
                    .await;
                }
            }

            let flags = monitor.check().await;
            if let Some(item) = item.write().await.as_mut() {
                item.apply_buffer_flags(flags);
            }

            if chained {
                let _ = completions.send(());
            }
        });
    }
}

/// Append to the item's error log and raise the observer event.
pub(crate) async fn record_item_error(
    item: &Arc<RwLock<Option<PlayerItem>>>,
    events: &broadcast::Sender<PlayerEvent>,
    message: String,
) {
    warn!(%message, "Playback error");
    let event = item
        .write()
        .await
        .as_mut()
        .map(|item| item.record_error(message));
    if let Some(event) = event {
        let _ = events.send(PlayerEvent::ErrorLogged { event });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetch::MapFetcher,
        pipeline::{NullAudioSink, NullDisplaySink, PassthroughDecoder},
        types::{ActionAtItemEnd, BufferConfig, PlayerState, Playlist},
        PlaylistParser,
    };
    use std::time::Duration;
    use url::Url;

    struct Fixture {
        scheduler: SegmentScheduler,
        state: Arc<RwLock<PlaybackState>>,
        item: Arc<RwLock<Option<PlayerItem>>>,
        events: broadcast::Receiver<PlayerEvent>,
        completions: mpsc::UnboundedReceiver<()>,
    }

    fn fixture(fetcher: MapFetcher, playlist: Playlist) -> Fixture {
        let state = Arc::new(RwLock::new(PlaybackState::new(ActionAtItemEnd::Pause)));
        let item = Arc::new(RwLock::new(Some(PlayerItem::new(
            Url::parse("https://example.com/playlist.m3u8").unwrap(),
            playlist,
            crate::types::Quality::Auto,
        ))));
        let (events_tx, events_rx) = broadcast::channel(32);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let pipeline = Arc::new(DecodePipeline::new(
            Arc::new(PassthroughDecoder::new()),
            Arc::new(NullDisplaySink::new()),
            Arc::new(NullAudioSink::new()),
        ));

        let scheduler = SegmentScheduler::new(
            Arc::new(fetcher),
            pipeline,
            Arc::new(BufferMonitor::new(BufferConfig::default())),
            Arc::clone(&state),
            Arc::clone(&item),
            Arc::new(AtomicU64::new(0)),
            events_tx,
            completions_tx,
        );

        Fixture {
            scheduler,
            state,
            item,
            events: events_rx,
            completions: completions_rx,
        }
    }

    fn playlist(count: usize) -> Playlist {
        let base = Url::parse("https://example.com/playlist.m3u8").unwrap();
        let text: String = (0..count)
            .map(|i| format!("#EXTINF:4.0,\nseg{i}.ts\n"))
            .collect();
        PlaylistParser::parse(text.as_bytes(), &base).unwrap()
    }

    #[tokio::test]
    async fn test_load_segment_out_of_range_is_noop() {
        let mut fx = fixture(MapFetcher::new(), playlist(2));
        fx.scheduler.load_segment(2).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fx.events.try_recv().is_err());
        assert!(fx.item.read().await.as_ref().unwrap().error_log.is_empty());
    }

    #[tokio::test]
    async fn test_play_next_segment_requires_playing() {
        let fx = fixture(MapFetcher::new(), playlist(2));
        assert_eq!(
            fx.scheduler.play_next_segment().await,
            ScheduleOutcome::NotPlaying
        );
    }

    #[tokio::test]
    async fn test_advance_is_unconditional_on_fetch_failure() {
        // No entries in the fetcher: every fetch fails.
        let mut fx = fixture(MapFetcher::new(), playlist(2));
        fx.state.write().await.state = PlayerState::Playing;

        assert_eq!(
            fx.scheduler.play_next_segment().await,
            ScheduleOutcome::Scheduled
        );
        assert_eq!(fx.state.read().await.current_segment_index, 1);

        // The failure lands in the error log and raises the event.
        let event = tokio::time::timeout(Duration::from_secs(1), fx.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, PlayerEvent::ErrorLogged { .. }));

        let guard = fx.item.read().await;
        let item = guard.as_ref().unwrap();
        assert!(item.error_occurred);
        assert_eq!(item.error_log.len(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reported_to_caller() {
        let fx = fixture(MapFetcher::new(), playlist(1));
        {
            let mut state = fx.state.write().await;
            state.state = PlayerState::Playing;
            state.current_segment_index = 1;
        }
        assert_eq!(
            fx.scheduler.play_next_segment().await,
            ScheduleOutcome::EndOfList
        );
    }

    #[tokio::test]
    async fn test_chained_fetch_signals_completion() {
        let mut fx = fixture(MapFetcher::new(), playlist(1));
        fx.state.write().await.state = PlayerState::Playing;
        fx.scheduler.play_next_segment().await;

        tokio::time::timeout(Duration::from_secs(1), fx.completions.recv())
            .await
            .expect("completion signal")
            .unwrap();
    }
}
