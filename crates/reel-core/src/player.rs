//! Playback controller
//!
//! Coordinates:
//! - Playlist loading and item replacement
//! - Play / pause / stop / seek / loop
//! - Sequential segment scheduling via the completion-driven chain
//! - End-of-item dispatch
//! - Observer events
//!
//! All mutable playback state lives behind one lock owned here; fetch
//! completions re-enter through a channel consumed by a single driver
//! task, so callback-origin mutations are serialized.

use crate::{
    buffer::BufferMonitor,
    error::{Error, Result},
    events::PlayerEvent,
    fetch::MediaFetcher,
    item::PlayerItem,
    pipeline::{AudioSink, Decoder, DecodePipeline, DisplaySink},
    playlist::PlaylistParser,
    scheduler::{ScheduleOutcome, SegmentScheduler},
    types::{ActionAtItemEnd, ItemStatus, PlaybackState, PlayerConfig, PlayerState, Quality, Segment},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Player managing a single item at a time
pub struct Player {
    /// Player configuration
    config: PlayerConfig,
    /// Mutable playback bookkeeping
    state: Arc<RwLock<PlaybackState>>,
    /// State change broadcaster
    state_tx: watch::Sender<PlayerState>,
    /// The item currently loaded, if any
    item: Arc<RwLock<Option<PlayerItem>>>,
    /// Segment scheduler
    scheduler: Arc<SegmentScheduler>,
    /// Decode pipeline
    pipeline: Arc<DecodePipeline>,
    /// Buffer monitor
    monitor: Arc<BufferMonitor>,
    /// Fetch capability, shared with the scheduler
    fetcher: Arc<dyn MediaFetcher>,
    /// Bumped on stop and item replacement; stale completions are dropped
    epoch: Arc<AtomicU64>,
    /// Observer event broadcaster
    events_tx: broadcast::Sender<PlayerEvent>,
}

impl Player {
    /// Wire a player to its collaborators and start the driver task.
    pub fn new(
        config: PlayerConfig,
        fetcher: Arc<dyn MediaFetcher>,
        decoder: Arc<dyn Decoder>,
        display: Arc<dyn DisplaySink>,
        audio: Arc<dyn AudioSink>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(PlayerState::Idle);
        let (events_tx, _) = broadcast::channel(64);
        let (completions_tx, mut completions_rx) = mpsc::unbounded_channel();

        audio.set_volume(config.volume);

        let state = Arc::new(RwLock::new(PlaybackState::new(config.action_at_item_end)));
        let item = Arc::new(RwLock::new(None));
        let epoch = Arc::new(AtomicU64::new(0));
        let monitor = Arc::new(BufferMonitor::new(config.buffer.clone()));
        let pipeline = Arc::new(DecodePipeline::new(decoder, display, audio));

        let scheduler = Arc::new(SegmentScheduler::new(
            Arc::clone(&fetcher),
            Arc::clone(&pipeline),
            Arc::clone(&monitor),
            Arc::clone(&state),
            Arc::clone(&item),
            Arc::clone(&epoch),
            events_tx.clone(),
            completions_tx,
        ));

        let player = Arc::new(Self {
            config,
            state,
            state_tx,
            item,
            scheduler,
            pipeline,
            monitor,
            fetcher,
            epoch,
            events_tx,
        });

        // Driver: each fetch completion schedules the next segment, one
        // outstanding fetch at a time.
        let weak = Arc::downgrade(&player);
        tokio::spawn(async move {
            while completions_rx.recv().await.is_some() {
                let Some(player) = weak.upgrade() else { break };
                if player.scheduler.play_next_segment().await == ScheduleOutcome::EndOfList {
                    player.handle_end_of_item().await;
                }
            }
        });

        player
    }

    /// Load an item with automatic quality selection
    pub async fn load(&self, locator: &Url) -> Result<()> {
        self.load_with_quality(locator, Quality::Auto).await
    }

    /// Load an item, replacing the current one.
    ///
    /// The playlist is fetched and parsed, then the first segment fetched
    /// and the decode session established from its stream format. Any
    /// failure leaves the item in `Failed` status with no partial playback.
    #[instrument(skip(self))]
    pub async fn load_with_quality(&self, locator: &Url, quality: Quality) -> Result<()> {
        info!(%locator, "Loading item");

        // Invalidate everything belonging to the previous item.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.pipeline.set_delivery_active(false);
        self.pipeline.teardown().await;
        self.monitor.reset().await;
        {
            let mut state = self.state.write().await;
            state.state = PlayerState::Idle;
            state.current_segment_index = 0;
            state.current_time = 0.0;
        }
        let _ = self.state_tx.send(PlayerState::Idle);

        let playlist_bytes = match self.fetcher.fetch(locator).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return self
                    .fail_load(
                        PlayerItem::failed(locator.clone(), quality),
                        format!("Failed to fetch playlist {locator}: {e}"),
                        Error::PlaylistFetch {
                            url: locator.to_string(),
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        };

        let playlist = match PlaylistParser::parse(&playlist_bytes, locator) {
            Ok(playlist) => playlist,
            Err(e) => {
                let message = format!("Failed to parse playlist {locator}: {e}");
                return self
                    .fail_load(PlayerItem::failed(locator.clone(), quality), message, e)
                    .await;
            }
        };

        info!(
            segments = playlist.segments.len(),
            variants = playlist.variants.len(),
            "Playlist parsed"
        );

        let mut item = PlayerItem::new(locator.clone(), playlist, quality);

        // The decode session is bound to the first segment's stream format.
        // An empty playlist is valid and simply has no session.
        if let Some(first) = item.segments.first().cloned() {
            let payload = match self.fetcher.fetch(&first.uri).await {
                Ok(payload) => {
                    self.monitor.record_result(true).await;
                    self.monitor.add_buffered(first.duration).await;
                    payload
                }
                Err(e) => {
                    self.monitor.record_result(false).await;
                    let message = format!("Failed to fetch first segment {}: {e}", first.uri);
                    return self.fail_load(item, message, e).await;
                }
            };

            if let Err(e) = self.pipeline.establish(&payload).await {
                let message = format!("Failed to establish decode session: {e}");
                return self.fail_load(item, message, e).await;
            }
        }

        item.status = ItemStatus::ReadyToPlay;
        *self.item.write().await = Some(item);

        info!(%locator, "Item ready to play");
        Ok(())
    }

    /// Mark the item failed, log, raise the load-failure event.
    async fn fail_load(&self, mut item: PlayerItem, message: String, err: Error) -> Result<()> {
        warn!(%message, "Item load failed");
        item.status = ItemStatus::Failed;
        let event = item.record_error(message.clone());
        *self.item.write().await = Some(item);

        let _ = self.events_tx.send(PlayerEvent::ErrorLogged { event });
        let _ = self.events_tx.send(PlayerEvent::LoadFailed { message });
        Err(err)
    }

    /// Start or resume playback.
    ///
    /// The audio start and frame-delivery side effects fire only on the
    /// transition into `Playing`; the segment schedule is kicked either
    /// way, which is what restarts loading after a seek while playing.
    #[instrument(skip(self))]
    pub async fn play(&self) {
        {
            let mut state = self.state.write().await;
            if !state.state.is_playing() {
                state.state = PlayerState::Playing;
                self.pipeline.audio().play();
                self.pipeline.set_delivery_active(true);
                info!("Playback started");
                drop(state);
                let _ = self.state_tx.send(PlayerState::Playing);
            }
        }
        let _ = self.scheduler.play_next_segment().await;
    }

    /// Pause playback, preserving the decode session and buffered state
    #[instrument(skip(self))]
    pub async fn pause(&self) {
        let mut state = self.state.write().await;
        if state.state.is_playing() {
            state.state = PlayerState::Paused;
            self.pipeline.audio().pause();
            self.pipeline.set_delivery_active(false);
            info!("Playback paused");
            drop(state);
            let _ = self.state_tx.send(PlayerState::Paused);
        }
    }

    /// Stop playback unconditionally: reset position, tear down the decode
    /// session, stop audio output.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.write().await;
            state.state = PlayerState::Stopped;
            state.current_segment_index = 0;
            state.current_time = 0.0;
        }
        self.pipeline.set_delivery_active(false);
        self.pipeline.audio().stop();
        self.pipeline.teardown().await;
        info!("Playback stopped");
        let _ = self.state_tx.send(PlayerState::Stopped);
    }

    /// Seek to a target time in seconds.
    ///
    /// Selects the first segment whose cumulative duration reaches the
    /// target; a target beyond the total duration falls back to index 0.
    /// If playback was active it re-enters `play`, restarting the schedule
    /// at the new index.
    #[instrument(skip(self))]
    pub async fn seek(&self, target: f64) -> Result<()> {
        let segments = match self.item.read().await.as_ref() {
            Some(item) => item.segments.clone(),
            None => return Err(Error::NoItem),
        };

        let index = select_segment_index(&segments, target);
        let was_playing = {
            let mut state = self.state.write().await;
            state.current_segment_index = index;
            state.current_time = target;
            state.state.is_playing()
        };

        debug!(target, index, was_playing, "Seeking");
        self.scheduler.load_segment(index).await;

        if was_playing {
            self.play().await;
        }
        Ok(())
    }

    /// Dispatch the configured end-of-item action, then announce the end.
    async fn handle_end_of_item(&self) {
        let action = self.state.read().await.action_at_item_end;
        info!(?action, "Segment list exhausted");

        match action {
            ActionAtItemEnd::Pause => self.pause().await,
            ActionAtItemEnd::Stop => self.stop().await,
            ActionAtItemEnd::Loop => {
                if let Err(e) = self.seek(0.0).await {
                    warn!(error = %e, "Loop seek failed");
                }
                self.play().await;
            }
        }

        let _ = self.events_tx.send(PlayerEvent::PlaybackEnded);
    }

    /// Set the audio output volume
    pub fn set_volume(&self, level: f32) {
        self.pipeline.audio().set_volume(level);
    }

    /// Change the end-of-item behavior
    pub async fn set_action_at_item_end(&self, action: ActionAtItemEnd) {
        self.state.write().await.action_at_item_end = action;
    }

    /// Current state machine state
    pub async fn state(&self) -> PlayerState {
        self.state.read().await.state
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to observer events
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events_tx.subscribe()
    }

    /// Snapshot of the current item
    pub async fn current_item(&self) -> Option<PlayerItem> {
        self.item.read().await.clone()
    }

    /// Index of the next segment to schedule
    pub async fn current_segment_index(&self) -> usize {
        self.state.read().await.current_segment_index
    }

    /// Playback clock in seconds
    pub async fn current_time(&self) -> f64 {
        self.state.read().await.current_time
    }

    /// Player configuration
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }
}

/// First segment whose cumulative duration reaches the target, else 0.
fn select_segment_index(segments: &[Segment], target: f64) -> usize {
    let mut cumulative = 0.0;
    for (index, segment) in segments.iter().enumerate() {
        cumulative += segment.duration;
        if cumulative >= target {
            return index;
        }
    }
    0
}
