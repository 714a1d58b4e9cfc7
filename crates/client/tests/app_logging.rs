use std::sync::Arc;

use client_core::mock::{MemoryStore, MockCaptureDevice, MockFullscreenHost, MockVideoSink};
use client_core::{CaptureDevice, ClientConfig, FullscreenHost, VideoSink};
use presenter_client::{Platform, PresenterApp};

struct HeadlessPlatform;

impl Platform for HeadlessPlatform {
    fn capture_device(&self) -> Arc<dyn CaptureDevice> {
        Arc::new(MockCaptureDevice::new())
    }

    fn video_sink(&self) -> Box<dyn VideoSink> {
        Box::new(MockVideoSink::new())
    }

    fn fullscreen_host(&self) -> Box<dyn FullscreenHost> {
        Box::new(MockFullscreenHost::new())
    }
}

#[tokio::test]
async fn test_configured_log_dir_receives_log_file() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let log_dir = tmp.path().join("presenter-logs");
    let config = ClientConfig {
        log_dir: Some(log_dir.clone()),
        ..ClientConfig::default()
    };

    let app = PresenterApp::from_config(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(HeadlessPlatform),
    )
    .expect("client should build with a log directory");

    assert!(app.is_logging_to_file());
    assert_eq!(app.config().log_dir.as_deref(), Some(log_dir.as_path()));
    let files: Vec<_> = std::fs::read_dir(&log_dir)
        .expect("log directory should exist")
        .filter_map(|entry| entry.ok())
        .collect();
    assert_eq!(files.len(), 1);

    // The global subscriber is already taken.
    assert!(
        PresenterApp::from_config(
            ClientConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(HeadlessPlatform),
        )
        .is_err()
    );
}
