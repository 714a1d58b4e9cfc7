//! Page builder with dependency injection pattern.

use std::sync::Arc;

use anyhow::{Context, Result};
use client_core::{
    CaptureDevice, ClientConfig, FrameSink, FullscreenHost, GestureTransport, KeyValueStore,
    SessionIdentity, VideoSink,
};
use client_media::{CameraResource, FrameUplink};
use tokio::sync::mpsc;

use crate::channel::GestureChannel;
use crate::page::{PageMode, PageParts, PresentationPage};

/// Builder for mounting a [`PresentationPage`].
///
/// Session identity, network collaborators and platform surfaces are
/// required; configuration defaults to [`ClientConfig::default`] and the
/// mode to [`PageMode::Presentation`].
#[derive(Default)]
pub struct PageBuilder {
    config: Option<ClientConfig>,
    identity: Option<Arc<SessionIdentity>>,
    store: Option<Arc<dyn KeyValueStore>>,
    frame_sink: Option<Arc<dyn FrameSink>>,
    gesture_transport: Option<Arc<dyn GestureTransport>>,
    capture_device: Option<Arc<dyn CaptureDevice>>,
    video_sink: Option<Box<dyn VideoSink>>,
    fullscreen: Option<Box<dyn FullscreenHost>>,
    mode: Option<PageMode>,
}

impl PageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the session identity (required).
    pub fn identity(mut self, identity: Arc<SessionIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the preference store holding the remap table (required).
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the frame upload target (required).
    pub fn frame_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.frame_sink = Some(sink);
        self
    }

    /// Set the gesture channel transport (required).
    pub fn gesture_transport(mut self, transport: Arc<dyn GestureTransport>) -> Self {
        self.gesture_transport = Some(transport);
        self
    }

    /// Set the camera (required).
    pub fn capture_device(mut self, device: Arc<dyn CaptureDevice>) -> Self {
        self.capture_device = Some(device);
        self
    }

    /// Set the preview element (required).
    pub fn video_sink(mut self, sink: Box<dyn VideoSink>) -> Self {
        self.video_sink = Some(sink);
        self
    }

    /// Set the fullscreen host (required).
    pub fn fullscreen(mut self, host: Box<dyn FullscreenHost>) -> Self {
        self.fullscreen = Some(host);
        self
    }

    pub fn mode(mut self, mode: PageMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Mount the page. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if any required collaborator is missing.
    pub fn mount(self) -> Result<PresentationPage> {
        let config = self.config.unwrap_or_default();
        let identity = self
            .identity
            .context("Session identity is required. Use .identity() to set it.")?;
        let store = self
            .store
            .context("Key-value store is required. Use .store() to set it.")?;
        let frame_sink = self
            .frame_sink
            .context("Frame sink is required. Use .frame_sink() to set it.")?;
        let gesture_transport = self
            .gesture_transport
            .context("Gesture transport is required. Use .gesture_transport() to set it.")?;
        let capture_device = self
            .capture_device
            .context("Capture device is required. Use .capture_device() to set it.")?;
        let video_sink = self
            .video_sink
            .context("Video sink is required. Use .video_sink() to set it.")?;
        let fullscreen = self
            .fullscreen
            .context("Fullscreen host is required. Use .fullscreen() to set it.")?;

        let (events_tx, events_rx) = mpsc::channel(config.channel.event_buffer);

        Ok(PresentationPage::mount(PageParts {
            identity,
            store,
            camera: CameraResource::new(capture_device, video_sink, config.capture),
            uplink: FrameUplink::new(frame_sink, config.uplink),
            channel: GestureChannel::new(gesture_transport, events_tx),
            events_rx,
            fullscreen,
            marker_interval: config.display.marker_frame_interval,
            subject_label: config.display.subject_toggle_label,
            mode: self.mode.unwrap_or(PageMode::Presentation),
        }))
    }
}
