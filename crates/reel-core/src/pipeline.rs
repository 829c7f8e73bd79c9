//! Decode pipeline orchestration
//!
//! Owns the decode session bound to the current stream format, submits one
//! decode unit per segment, and routes decoded output to the display and
//! audio sinks. The decoder, display, and audio capabilities are external
//! collaborators behind traits; this module only defines the contract the
//! engine needs from them.
//!
//! Decoded frames may complete on any task; delivery to the display sink is
//! marshaled through a single presentation task so the sink always sees one
//! serialized call stream.

use crate::{
    error::{Error, Result},
    format::FormatDescriptor,
    types::Resolution,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};
use uuid::Uuid;

/// Stable key for a live decode session.
///
/// Handed out by the decoder capability and used for every subsequent
/// submission; the decoder keeps its own registry behind the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeSessionId(pub Uuid);

impl DecodeSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DecodeSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DecodeSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Decoded picture data
    pub data: Bytes,
    /// Frame dimensions, when the decoder reports them
    pub resolution: Option<Resolution>,
}

/// Video decode capability
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Bind a session to a stream format. At most one live session per item.
    async fn establish(&self, format: &FormatDescriptor) -> Result<DecodeSessionId>;

    /// Submit one segment payload as a single decode unit
    async fn submit(&self, session: DecodeSessionId, payload: Bytes) -> Result<VideoFrame>;

    /// Release a session and everything bound to it
    async fn teardown(&self, session: DecodeSessionId);
}

/// Frame presentation capability.
///
/// `present` is always invoked from one serialized execution context;
/// aspect-fit rendering is the sink's responsibility.
pub trait DisplaySink: Send + Sync {
    fn present(&self, frame: VideoFrame);
}

/// Audio output capability
pub trait AudioSink: Send + Sync {
    fn enqueue(&self, samples: Bytes);
    fn play(&self);
    fn pause(&self);
    fn stop(&self);
    fn set_volume(&self, level: f32);
}

/// Decode session lifecycle and output routing for the active item
pub struct DecodePipeline {
    decoder: Arc<dyn Decoder>,
    audio: Arc<dyn AudioSink>,
    session: RwLock<Option<DecodeSessionId>>,
    frame_tx: mpsc::UnboundedSender<VideoFrame>,
    delivery_active: Arc<AtomicBool>,
}

impl DecodePipeline {
    /// Wire the pipeline to its collaborators and start the presentation
    /// task that owns delivery to the display sink.
    pub fn new(
        decoder: Arc<dyn Decoder>,
        display: Arc<dyn DisplaySink>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<VideoFrame>();
        let delivery_active = Arc::new(AtomicBool::new(false));

        let gate = Arc::clone(&delivery_active);
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if gate.load(Ordering::Acquire) {
                    display.present(frame);
                } else {
                    trace!("Frame delivery inactive, dropping frame");
                }
            }
        });

        Self {
            decoder,
            audio,
            session: RwLock::new(None),
            frame_tx,
            delivery_active,
        }
    }

    /// Derive the stream format from the first segment's payload and bind a
    /// decode session to it. Replaces any previous session.
    pub async fn establish(&self, first_payload: &[u8]) -> Result<()> {
        let format = FormatDescriptor::from_payload(first_payload)?;

        self.teardown().await;
        let id = self.decoder.establish(&format).await?;
        *self.session.write().await = Some(id);

        debug!(session = %id, "Decode session established");
        Ok(())
    }

    /// Submit one segment payload for decode.
    ///
    /// The raw payload is handed to the audio sink unchanged: the audio
    /// path is a byte pass-through contract, not a decode step. A decode
    /// failure is returned for the caller to log; the session stays live.
    pub async fn decode(&self, payload: Bytes) -> Result<Option<Resolution>> {
        let session = self.session.read().await.ok_or(Error::NoSession)?;

        self.audio.enqueue(payload.clone());

        let frame = self.decoder.submit(session, payload).await?;
        let resolution = frame.resolution;
        // Receiver gone only when the pipeline itself is being dropped.
        let _ = self.frame_tx.send(frame);
        Ok(resolution)
    }

    /// Tear down the live session, if any
    pub async fn teardown(&self) {
        if let Some(id) = self.session.write().await.take() {
            self.decoder.teardown(id).await;
            debug!(session = %id, "Decode session torn down");
        }
    }

    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Gate frame delivery to the display sink
    pub fn set_delivery_active(&self, active: bool) {
        self.delivery_active.store(active, Ordering::Release);
    }

    pub fn audio(&self) -> &Arc<dyn AudioSink> {
        &self.audio
    }
}

// ---------------------------------------------------------------------------
// Reference collaborators
// ---------------------------------------------------------------------------

/// Decoder that validates sessions and wraps payloads as frames, for
/// headless runs and tests.
#[derive(Default)]
pub struct PassthroughDecoder {
    sessions: RwLock<std::collections::HashMap<DecodeSessionId, FormatDescriptor>>,
}

impl PassthroughDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Decoder for PassthroughDecoder {
    async fn establish(&self, format: &FormatDescriptor) -> Result<DecodeSessionId> {
        if format.sequence_parameter_set.is_empty() || format.picture_parameter_set.is_empty() {
            return Err(Error::SessionCreation("empty parameter set".into()));
        }
        let id = DecodeSessionId::new();
        self.sessions.write().await.insert(id, format.clone());
        Ok(id)
    }

    async fn submit(&self, session: DecodeSessionId, payload: Bytes) -> Result<VideoFrame> {
        if !self.sessions.read().await.contains_key(&session) {
            return Err(Error::Decode(format!("unknown session {session}")));
        }
        if payload.is_empty() {
            return Err(Error::Decode("empty decode unit".into()));
        }
        Ok(VideoFrame {
            data: payload,
            resolution: None,
        })
    }

    async fn teardown(&self, session: DecodeSessionId) {
        self.sessions.write().await.remove(&session);
    }
}

/// Display sink that discards frames and counts them
#[derive(Default)]
pub struct NullDisplaySink {
    presented: AtomicU64,
}

impl NullDisplaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }
}

impl DisplaySink for NullDisplaySink {
    fn present(&self, _frame: VideoFrame) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }
}

/// Audio sink that discards samples and records control calls
#[derive(Default)]
pub struct NullAudioSink {
    enqueued: AtomicU64,
    play_calls: AtomicU64,
    pause_calls: AtomicU64,
    stop_calls: AtomicU64,
    volume: std::sync::Mutex<Option<f32>>,
}

impl NullAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn play_calls(&self) -> u64 {
        self.play_calls.load(Ordering::Relaxed)
    }

    pub fn pause_calls(&self) -> u64 {
        self.pause_calls.load(Ordering::Relaxed)
    }

    pub fn stop_calls(&self) -> u64 {
        self.stop_calls.load(Ordering::Relaxed)
    }

    pub fn volume(&self) -> Option<f32> {
        *self.volume.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AudioSink for NullAudioSink {
    fn enqueue(&self, _samples: Bytes) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn play(&self) {
        self.play_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn set_volume(&self, level: f32) {
        *self.volume.lock().unwrap_or_else(|e| e.into_inner()) = Some(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn annex_b_payload() -> Bytes {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1e]);
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xce, 0x38, 0x80]);
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00]);
        Bytes::from(payload)
    }

    fn pipeline() -> (Arc<DecodePipeline>, Arc<NullDisplaySink>, Arc<NullAudioSink>) {
        let display = Arc::new(NullDisplaySink::new());
        let audio = Arc::new(NullAudioSink::new());
        let pipeline = Arc::new(DecodePipeline::new(
            Arc::new(PassthroughDecoder::new()),
            Arc::clone(&display) as Arc<dyn DisplaySink>,
            Arc::clone(&audio) as Arc<dyn AudioSink>,
        ));
        (pipeline, display, audio)
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_establish_and_decode() {
        let (pipeline, display, audio) = pipeline();
        pipeline.set_delivery_active(true);

        pipeline.establish(&annex_b_payload()).await.unwrap();
        assert!(pipeline.has_session().await);

        pipeline.decode(annex_b_payload()).await.unwrap();
        wait_for(|| display.presented() == 1).await;
        assert_eq!(audio.enqueued(), 1);
    }

    #[tokio::test]
    async fn test_decode_without_session_fails() {
        let (pipeline, _display, _audio) = pipeline();
        let err = pipeline.decode(annex_b_payload()).await.unwrap_err();
        assert!(matches!(err, Error::NoSession));
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_session() {
        let (pipeline, _display, _audio) = pipeline();
        pipeline.establish(&annex_b_payload()).await.unwrap();

        let err = pipeline.decode(Bytes::new()).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(pipeline.has_session().await);

        // The session still accepts the next unit.
        pipeline.decode(annex_b_payload()).await.unwrap();
    }

    #[tokio::test]
    async fn test_inactive_delivery_drops_frames() {
        let (pipeline, display, _audio) = pipeline();
        pipeline.establish(&annex_b_payload()).await.unwrap();

        pipeline.decode(annex_b_payload()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(display.presented(), 0);
    }

    #[tokio::test]
    async fn test_teardown_releases_session() {
        let (pipeline, _display, _audio) = pipeline();
        pipeline.establish(&annex_b_payload()).await.unwrap();
        pipeline.teardown().await;
        assert!(!pipeline.has_session().await);
    }

    #[tokio::test]
    async fn test_establish_replaces_previous_session() {
        let (pipeline, _display, _audio) = pipeline();
        pipeline.establish(&annex_b_payload()).await.unwrap();
        pipeline.establish(&annex_b_payload()).await.unwrap();
        assert!(pipeline.has_session().await);
    }

    #[tokio::test]
    async fn test_format_extraction_failure_is_hard() {
        let (pipeline, _display, _audio) = pipeline();
        let err = pipeline.establish(b"not a stream").await.unwrap_err();
        assert!(matches!(err, Error::MissingParameterSet { .. }));
        assert!(!pipeline.has_session().await);
    }
}
