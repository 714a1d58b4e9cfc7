//! Collaborator traits.
//!
//! Everything the client talks to but does not own is expressed here:
//! - Network: `SessionApi`, `FrameSink`, `GestureTransport` / `GestureConnection`
//! - Media: `CaptureDevice`, `MediaStream`, `VideoSink`
//! - Host: `FullscreenHost`, `KeyValueStore`
//!
//! Concrete network implementations live in `client-transport`; in-memory
//! implementations for tests live in [`crate::mock`].

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CaptureConfig;
use crate::session::ClientId;

/// Raw RGBA frame as delivered by the capture engine.
pub type VideoFrame = image::RgbaImage;

/// Per-pixel subject opacity (255 = subject, 0 = background).
pub type Matte = image::GrayImage;

// ============================================================================
// Error Types
// ============================================================================

/// Network transport errors. Always non-fatal for the caller.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Media acquisition and encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Camera access requires consent")]
    ConsentRequired,

    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),
}

/// Display host errors (fullscreen requests may be rejected silently by the platform).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    #[error("Fullscreen request rejected: {0}")]
    Rejected(String),
}

/// Durable key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ============================================================================
// Wire Types
// ============================================================================

/// Body of `POST /register_client` and `POST /client_consent`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    pub client_id: String,
    /// `None` while the user has not answered the consent prompt.
    pub consent_accepted: Option<bool>,
}

/// One JPEG-encoded frame ready for upload.
#[derive(Clone, Debug)]
pub struct EncodedFrame {
    /// Strictly increasing per session, starting at 1.
    pub sequence: u64,
    pub client_id: ClientId,
    pub jpeg: Vec<u8>,
}

// ============================================================================
// Network
// ============================================================================

/// Best-effort session notifications. Repeating a call with the same payload is safe.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn register_client(&self, registration: &ClientRegistration)
    -> Result<(), TransportError>;

    async fn client_consent(&self, registration: &ClientRegistration)
    -> Result<(), TransportError>;
}

/// Fire-and-forget frame upload target.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn upload_frame(&self, frame: EncodedFrame) -> Result<(), TransportError>;
}

/// Opens persistent gesture channels keyed by client id.
#[async_trait]
pub trait GestureTransport: Send + Sync {
    async fn connect(
        &self,
        client_id: &ClientId,
    ) -> Result<Box<dyn GestureConnection>, TransportError>;
}

/// A single open gesture channel.
#[async_trait]
pub trait GestureConnection: Send {
    /// Next inbound text payload. `None` once the peer has closed the channel.
    async fn next_message(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the channel. Called at most once per connection by the owner.
    async fn close(&mut self);
}

// ============================================================================
// Media
// ============================================================================

/// Camera access point.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(&self, constraints: CaptureConfig) -> Result<Arc<dyn MediaStream>, MediaError>;
}

/// A live capture session made of one or more tracks.
pub trait MediaStream: Send + Sync {
    /// Current video frame, or `None` if no frame is available yet (or tracks are stopped).
    fn snapshot(&self) -> Option<VideoFrame>;

    /// Stop every track of the stream.
    fn stop_tracks(&self);

    /// Number of tracks that have not been stopped.
    fn live_tracks(&self) -> usize;
}

/// Element a stream can be attached to for preview.
pub trait VideoSink: Send {
    fn attach(&mut self, stream: Weak<dyn MediaStream>);
    fn detach(&mut self);
}

// ============================================================================
// Host
// ============================================================================

/// Fullscreen control over the content container.
///
/// Requests are fire-and-forget: the effective state is reported separately
/// through the host's fullscreen-change notifications.
pub trait FullscreenHost: Send {
    fn is_fullscreen(&self) -> bool;
    fn request_fullscreen(&mut self) -> Result<(), DisplayError>;
    fn exit_fullscreen(&mut self) -> Result<(), DisplayError>;
}

/// Durable per-session key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str);
}
