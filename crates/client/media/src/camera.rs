//! Camera capture ownership.
use std::sync::{Arc, Weak};

use client_core::{
    CaptureConfig, CaptureDevice, Consent, MediaError, MediaStream, VideoFrame, VideoSink,
};
use tracing::{debug, info, warn};

/// Exclusive owner of one page's capture stream.
///
/// The resource holds the only strong reference to the stream; consumers
/// such as the uplink get a [`Weak`] tap and stop seeing frames as soon as
/// the resource is released.
pub struct CameraResource {
    device: Arc<dyn CaptureDevice>,
    sink: Box<dyn VideoSink>,
    constraints: CaptureConfig,
    stream: Option<Arc<dyn MediaStream>>,
    video_ready: bool,
    last_error: Option<MediaError>,
}

impl CameraResource {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        sink: Box<dyn VideoSink>,
        constraints: CaptureConfig,
    ) -> Self {
        Self {
            device,
            sink,
            constraints,
            stream: None,
            video_ready: false,
            last_error: None,
        }
    }

    /// Open the camera if `consent` allows it.
    ///
    /// Already holding a stream is success. Failures are recorded in
    /// [`last_error`](Self::last_error) and leave the resource not ready.
    pub async fn acquire(&mut self, consent: Consent) -> Result<(), MediaError> {
        if !consent.is_accepted() {
            self.last_error = Some(MediaError::ConsentRequired);
            return Err(MediaError::ConsentRequired);
        }
        if self.stream.is_some() {
            debug!("Camera already acquired");
            return Ok(());
        }

        match self.device.open(self.constraints).await {
            Ok(stream) => {
                self.sink.attach(Arc::downgrade(&stream));
                self.stream = Some(stream);
                self.video_ready = true;
                self.last_error = None;
                info!(
                    width = self.constraints.width,
                    height = self.constraints.height,
                    "Camera acquired"
                );
                Ok(())
            }
            Err(e) => {
                warn!("Camera acquisition failed: {}", e);
                self.video_ready = false;
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Stop every track, detach the preview and forget the stream.
    ///
    /// Returns `false` when nothing was held.
    pub fn release(&mut self) -> bool {
        let Some(stream) = self.stream.take() else {
            return false;
        };
        stream.stop_tracks();
        self.sink.detach();
        self.video_ready = false;
        info!("Camera released");
        true
    }

    pub fn is_ready(&self) -> bool {
        self.video_ready
    }

    pub fn is_held(&self) -> bool {
        self.stream.is_some()
    }

    /// Non-owning handle for frame consumers.
    pub fn frame_tap(&self) -> Option<Weak<dyn MediaStream>> {
        self.stream.as_ref().map(Arc::downgrade)
    }

    /// Current frame of the held stream.
    pub fn snapshot(&self) -> Option<VideoFrame> {
        self.stream.as_ref().and_then(|s| s.snapshot())
    }

    pub fn last_error(&self) -> Option<&MediaError> {
        self.last_error.as_ref()
    }
}

impl Drop for CameraResource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::mock::{MockCaptureDevice, MockVideoSink};

    fn camera(device: &MockCaptureDevice, sink: &MockVideoSink) -> CameraResource {
        CameraResource::new(
            Arc::new(device.clone()),
            Box::new(sink.clone()),
            CaptureConfig::default(),
        )
    }

    #[tokio::test]
    async fn acquire_requires_consent() {
        let device = MockCaptureDevice::new();
        let sink = MockVideoSink::new();
        let mut camera = camera(&device, &sink);

        assert_eq!(
            camera.acquire(Consent::Unset).await,
            Err(MediaError::ConsentRequired)
        );
        assert_eq!(
            camera.acquire(Consent::Declined).await,
            Err(MediaError::ConsentRequired)
        );
        assert!(!camera.is_ready());
        assert!(device.requests().is_empty());
    }

    #[tokio::test]
    async fn acquire_attaches_preview_and_requests_constraints() {
        let device = MockCaptureDevice::new();
        let sink = MockVideoSink::new();
        let mut camera = camera(&device, &sink);

        camera.acquire(Consent::Accepted).await.unwrap();
        assert!(camera.is_ready());
        assert!(sink.is_attached());
        assert_eq!(device.requests(), vec![CaptureConfig::default()]);
        assert!(camera.snapshot().is_some());

        // A second acquire keeps the same stream.
        camera.acquire(Consent::Accepted).await.unwrap();
        assert_eq!(device.streams().len(), 1);
    }

    #[tokio::test]
    async fn denial_is_recorded_without_panicking() {
        let device = MockCaptureDevice::denying();
        let sink = MockVideoSink::new();
        let mut camera = camera(&device, &sink);

        let err = camera.acquire(Consent::Accepted).await.unwrap_err();
        assert!(matches!(err, MediaError::PermissionDenied(_)));
        assert!(!camera.is_ready());
        assert_eq!(camera.last_error(), Some(&err));
        assert!(!camera.release());
    }

    #[tokio::test]
    async fn release_is_idempotent_and_stops_tracks() {
        let device = MockCaptureDevice::new();
        let sink = MockVideoSink::new();
        let mut camera = camera(&device, &sink);
        camera.acquire(Consent::Accepted).await.unwrap();
        let tap = camera.frame_tap().unwrap();

        assert!(camera.release());
        assert!(!camera.release());

        let stream = &device.streams()[0];
        assert_eq!(stream.stop_calls(), 1);
        assert_eq!(device.live_tracks(), 0);
        assert_eq!(sink.detach_calls(), 1);
        assert!(!sink.is_attached());
        assert!(!camera.is_ready());
        assert!(tap.upgrade().and_then(|s| s.snapshot()).is_none());
    }

    #[tokio::test]
    async fn drop_releases_held_stream() {
        let device = MockCaptureDevice::new();
        let sink = MockVideoSink::new();
        {
            let mut camera = camera(&device, &sink);
            camera.acquire(Consent::Accepted).await.unwrap();
        }
        assert_eq!(device.live_tracks(), 0);
    }
}
