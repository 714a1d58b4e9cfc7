//! Mock collaborators for testing without devices or network.
//!
//! Every mock is cheap to clone and shares its recorded state between clones,
//! so a test can hand one copy to the component under test and inspect the other.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tokio::sync::mpsc;

pub use crate::store::MemoryStore;
use crate::config::CaptureConfig;
use crate::session::ClientId;
use crate::traits::{
    CaptureDevice, ClientRegistration, DisplayError, EncodedFrame, FrameSink, FullscreenHost,
    GestureConnection, GestureTransport, MediaError, MediaStream, SessionApi, TransportError,
    VideoFrame, VideoSink,
};

// ============================================================================
// Session API
// ============================================================================

#[derive(Clone, Default)]
pub struct MockSessionApi {
    register: Arc<Mutex<Vec<ClientRegistration>>>,
    consent: Arc<Mutex<Vec<ClientRegistration>>>,
    fail: bool,
}

impl MockSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call records its payload and then fails with a network error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn register_calls(&self) -> Vec<ClientRegistration> {
        self.register.lock().unwrap().clone()
    }

    pub fn consent_calls(&self) -> Vec<ClientRegistration> {
        self.consent.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<(), TransportError> {
        if self.fail {
            Err(TransportError::Network("mock failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn register_client(
        &self,
        registration: &ClientRegistration,
    ) -> Result<(), TransportError> {
        self.register.lock().unwrap().push(registration.clone());
        self.outcome()
    }

    async fn client_consent(&self, registration: &ClientRegistration) -> Result<(), TransportError> {
        self.consent.lock().unwrap().push(registration.clone());
        self.outcome()
    }
}

// ============================================================================
// Frame sink
// ============================================================================

/// Records every upload attempt as `(sequence, client id, byte length)`.
#[derive(Clone, Default)]
pub struct MockFrameSink {
    attempts: Arc<Mutex<Vec<(u64, String, usize)>>>,
    completed: Arc<AtomicUsize>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Each upload takes `delay` before it resolves.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.attempts.lock().unwrap().iter().map(|a| a.0).collect()
    }

    pub fn attempts(&self) -> Vec<(u64, String, usize)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSink for MockFrameSink {
    async fn upload_frame(&self, frame: EncodedFrame) -> Result<(), TransportError> {
        self.attempts.lock().unwrap().push((
            frame.sequence,
            frame.client_id.to_string(),
            frame.jpeg.len(),
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(TransportError::Status {
                status: 500,
                body: "mock failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Gesture channel
// ============================================================================

#[derive(Default)]
struct ChannelState {
    connects: AtomicUsize,
    closes: AtomicUsize,
    fail_connect: AtomicBool,
    client_ids: Mutex<Vec<String>>,
    peer: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

/// Transport whose connections are fed by [`MockGestureTransport::push`].
#[derive(Clone, Default)]
pub struct MockGestureTransport {
    state: Arc<ChannelState>,
}

impl MockGestureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.state.fail_connect.store(true, Ordering::SeqCst);
        transport
    }

    /// Deliver a raw text payload on the most recent connection.
    pub fn push(&self, message: impl Into<String>) -> bool {
        match self.state.peer.lock().unwrap().as_ref() {
            Some(tx) => tx.send(message.into()).is_ok(),
            None => false,
        }
    }

    /// Simulate the server closing the most recent connection.
    pub fn disconnect(&self) {
        self.state.peer.lock().unwrap().take();
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.state.client_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl GestureTransport for MockGestureTransport {
    async fn connect(
        &self,
        client_id: &ClientId,
    ) -> Result<Box<dyn GestureConnection>, TransportError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Network("connection refused".into()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state
            .client_ids
            .lock()
            .unwrap()
            .push(client_id.to_string());

        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.peer.lock().unwrap() = Some(tx);
        Ok(Box::new(MockConnection {
            rx,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    rx: mpsc::UnboundedReceiver<String>,
    state: Arc<ChannelState>,
}

#[async_trait]
impl GestureConnection for MockConnection {
    async fn next_message(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.rx.close();
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Single-track stream serving a fixed frame.
pub struct MockMediaStream {
    frame: Mutex<VideoFrame>,
    live: AtomicBool,
    stops: AtomicUsize,
}

impl MockMediaStream {
    pub fn new(frame: VideoFrame) -> Self {
        Self {
            frame: Mutex::new(frame),
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn set_frame(&self, frame: VideoFrame) {
        *self.frame.lock().unwrap() = frame;
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaStream for MockMediaStream {
    fn snapshot(&self) -> Option<VideoFrame> {
        if !self.live.load(Ordering::SeqCst) {
            return None;
        }
        let frame = self.frame.lock().unwrap();
        if frame.width() == 0 || frame.height() == 0 {
            None
        } else {
            Some(frame.clone())
        }
    }

    fn stop_tracks(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.live.load(Ordering::SeqCst))
    }
}

#[derive(Clone)]
pub struct MockCaptureDevice {
    streams: Arc<Mutex<Vec<Arc<MockMediaStream>>>>,
    requests: Arc<Mutex<Vec<CaptureConfig>>>,
    frame: VideoFrame,
    deny: bool,
}

impl MockCaptureDevice {
    /// Device producing a small solid frame.
    pub fn new() -> Self {
        Self::with_frame(RgbaImage::from_pixel(8, 6, Rgba([200, 40, 40, 255])))
    }

    pub fn with_frame(frame: VideoFrame) -> Self {
        Self {
            streams: Arc::default(),
            requests: Arc::default(),
            frame,
            deny: false,
        }
    }

    /// Device that refuses permission.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    pub fn streams(&self) -> Vec<Arc<MockMediaStream>> {
        self.streams.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<CaptureConfig> {
        self.requests.lock().unwrap().clone()
    }

    /// Tracks still running across every stream ever opened.
    pub fn live_tracks(&self) -> usize {
        self.streams().iter().map(|s| s.live_tracks()).sum()
    }
}

impl Default for MockCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for MockCaptureDevice {
    async fn open(&self, constraints: CaptureConfig) -> Result<Arc<dyn MediaStream>, MediaError> {
        self.requests.lock().unwrap().push(constraints);
        if self.deny {
            return Err(MediaError::PermissionDenied("NotAllowedError".into()));
        }
        let stream = Arc::new(MockMediaStream::new(self.frame.clone()));
        self.streams.lock().unwrap().push(Arc::clone(&stream));
        Ok(stream)
    }
}

/// Preview element that records attachment.
#[derive(Clone, Default)]
pub struct MockVideoSink {
    attached: Arc<Mutex<Option<Weak<dyn MediaStream>>>>,
    detaches: Arc<AtomicUsize>,
}

impl MockVideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.lock().unwrap().is_some()
    }

    pub fn detach_calls(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

impl VideoSink for MockVideoSink {
    fn attach(&mut self, stream: Weak<dyn MediaStream>) {
        *self.attached.lock().unwrap() = Some(stream);
    }

    fn detach(&mut self) {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        self.attached.lock().unwrap().take();
    }
}

// ============================================================================
// Host
// ============================================================================

/// Fullscreen host that enters/exits immediately unless built as rejecting.
#[derive(Clone, Default)]
pub struct MockFullscreenHost {
    fullscreen: Arc<AtomicBool>,
    reject: bool,
}

impl MockFullscreenHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }
}

impl FullscreenHost for MockFullscreenHost {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    fn request_fullscreen(&mut self) -> Result<(), DisplayError> {
        if self.reject {
            return Err(DisplayError::Rejected("not triggered by user activation".into()));
        }
        self.fullscreen.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), DisplayError> {
        self.fullscreen.store(false, Ordering::SeqCst);
        Ok(())
    }
}
