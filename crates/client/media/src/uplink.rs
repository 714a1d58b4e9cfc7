//! Periodic frame upload.
//!
//! Every tick snapshots the camera, assigns the next sequence number and
//! spawns an independent encode-and-upload task. Uploads are never awaited
//! by the loop: a slow or failed upload neither delays nor cancels later
//! ticks, and completions may arrive in any order.

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use client_core::{
    ClientId, EncodedFrame, FrameSink, MediaError, MediaStream, UplinkConfig, VideoFrame,
};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

pub struct FrameUplink {
    sink: Arc<dyn FrameSink>,
    config: UplinkConfig,
    sequence: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl FrameUplink {
    pub fn new(sink: Arc<dyn FrameSink>, config: UplinkConfig) -> Self {
        Self {
            sink,
            config,
            sequence: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    /// Start ticking against `source`. Returns `false` if already running.
    ///
    /// The loop ends on its own once the source stream is dropped.
    pub fn start(&mut self, source: Weak<dyn MediaStream>, client_id: ClientId) -> bool {
        if self.is_running() {
            return false;
        }

        let sink = Arc::clone(&self.sink);
        let sequence = Arc::clone(&self.sequence);
        let config = self.config;
        info!(client_id = %client_id, period_ms = config.interval.as_millis() as u64, "Frame uplink started");

        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; uploads start one period in.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(stream) = source.upgrade() else {
                    debug!("Capture stream gone; uplink exiting");
                    break;
                };
                let Some(frame) = stream.snapshot() else {
                    trace!("No frame available yet");
                    continue;
                };
                drop(stream);

                let seq = sequence.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::spawn(upload(
                    Arc::clone(&sink),
                    frame,
                    seq,
                    client_id.clone(),
                    config.jpeg_quality,
                ));
            }
        }));
        true
    }

    /// Cancel the periodic loop. In-flight uploads are left to finish.
    ///
    /// Returns `false` when no loop was active.
    pub fn stop(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        task.abort();
        info!("Frame uplink stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Sequence number of the most recently issued upload (0 before the first).
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Drop for FrameUplink {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn upload(
    sink: Arc<dyn FrameSink>,
    frame: VideoFrame,
    sequence: u64,
    client_id: ClientId,
    quality: u8,
) {
    let jpeg = match encode_jpeg(frame, quality) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            warn!(sequence, "Dropping frame: {}", e);
            return;
        }
    };
    let frame = EncodedFrame {
        sequence,
        client_id,
        jpeg,
    };
    match sink.upload_frame(frame).await {
        Ok(()) => trace!(sequence, "Frame uploaded"),
        Err(e) => debug!(sequence, "Frame upload failed: {}", e),
    }
}

/// Encode an RGBA frame as baseline JPEG (alpha is discarded).
pub fn encode_jpeg(frame: VideoFrame, quality: u8) -> Result<Vec<u8>, MediaError> {
    let rgb = DynamicImage::ImageRgba8(frame).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use client_core::mock::{MockFrameSink, MockMediaStream};
    use image::{Rgba, RgbaImage};

    fn stream() -> Arc<dyn MediaStream> {
        Arc::new(MockMediaStream::new(RgbaImage::from_pixel(
            8,
            6,
            Rgba([10, 20, 30, 255]),
        )))
    }

    fn uplink(sink: &MockFrameSink) -> FrameUplink {
        FrameUplink::new(Arc::new(sink.clone()), UplinkConfig::default())
    }

    fn client() -> ClientId {
        ClientId::parse("client-1").unwrap()
    }

    #[test]
    fn encodes_valid_jpeg() {
        let jpeg = encode_jpeg(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])), 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_every_period_with_increasing_sequence() {
        let sink = MockFrameSink::new();
        let mut uplink = uplink(&sink);
        let source = stream();

        assert!(uplink.start(Arc::downgrade(&source), client()));
        time::sleep(Duration::from_millis(350)).await;

        assert_eq!(sink.sequences(), vec![1, 2, 3]);
        assert_eq!(uplink.last_sequence(), 3);
        assert!(sink.attempts().iter().all(|(_, id, len)| id == "client-1" && *len > 0));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_uploads_do_not_delay_ticks() {
        let sink = MockFrameSink::with_delay(Duration::from_secs(5));
        let mut uplink = uplink(&sink);
        let source = stream();

        uplink.start(Arc::downgrade(&source), client());
        time::sleep(Duration::from_millis(550)).await;

        assert_eq!(sink.sequences(), vec![1, 2, 3, 4, 5]);
        assert_eq!(sink.completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_uploads_do_not_stop_the_loop() {
        let sink = MockFrameSink::failing();
        let mut uplink = uplink(&sink);
        let source = stream();

        uplink.start(Arc::downgrade(&source), client());
        time::sleep(Duration::from_millis(350)).await;

        assert_eq!(sink.sequences().len(), 3);
        assert!(uplink.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_uploads() {
        let sink = MockFrameSink::new();
        let mut uplink = uplink(&sink);
        let source = stream();

        assert!(!uplink.stop());
        uplink.start(Arc::downgrade(&source), client());
        assert!(!uplink.start(Arc::downgrade(&source), client()));
        time::sleep(Duration::from_millis(250)).await;

        assert!(uplink.stop());
        assert!(!uplink.stop());
        assert!(!uplink.is_running());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.sequences(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_continues_across_restarts() {
        let sink = MockFrameSink::new();
        let mut uplink = uplink(&sink);
        let source = stream();

        uplink.start(Arc::downgrade(&source), client());
        time::sleep(Duration::from_millis(150)).await;
        uplink.stop();
        uplink.start(Arc::downgrade(&source), client());
        time::sleep(Duration::from_millis(150)).await;

        assert_eq!(sink.sequences(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_source_is_released() {
        let sink = MockFrameSink::new();
        let mut uplink = uplink(&sink);
        let source = stream();

        uplink.start(Arc::downgrade(&source), client());
        drop(source);
        time::sleep(Duration::from_millis(150)).await;

        assert!(!uplink.is_running());
        assert!(sink.sequences().is_empty());
    }
}
