//! Client configuration structures and loaders.
//!
//! All endpoints and tunables come from the process environment. There is no
//! command-line surface; hosts that embed the client call [`ClientConfig::from_env`]
//! once at startup (after optionally loading a `.env` file).

use std::env;
use std::time::Duration;

/// Complete client configuration.
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    pub endpoints: EndpointConfig,
    pub capture: CaptureConfig,
    pub uplink: UplinkConfig,
    pub channel: ChannelConfig,
    pub display: DisplayConfig,
    pub log_dir: Option<std::path::PathBuf>,
}

impl ClientConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `PRESENTER_API_URL` - HTTP API base URL (default: http://127.0.0.1:8000)
    /// - `PRESENTER_WS_URL` - Gesture channel base URL (default: ws://127.0.0.1:8000)
    /// - `CAPTURE_WIDTH` / `CAPTURE_HEIGHT` - Requested capture size (default: 1280x720)
    /// - `UPLINK_INTERVAL_MS` - Frame upload period (default: 100)
    /// - `UPLINK_JPEG_QUALITY` - JPEG quality 1..=100 (default: 80)
    /// - `GESTURE_EVENT_BUFFER` - Inbound gesture queue size (default: 32)
    /// - `MARKER_FRAME_INTERVAL_MS` - Marker interpolation period (default: 16)
    /// - `SUBJECT_TOGGLE_LABEL` - Label matched for the toggle-subject action
    /// - `PRESENTER_LOG_DIR` - Directory for rolling log files (default: stderr only)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construct configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("PRESENTER_API_URL").filter(|s| !s.trim().is_empty()) {
            config.endpoints.api_base = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("PRESENTER_WS_URL").filter(|s| !s.trim().is_empty()) {
            config.endpoints.ws_base = url.trim_end_matches('/').to_string();
        }

        if let Some(width) = parse::<u32>(&lookup, "CAPTURE_WIDTH") {
            config.capture.width = width.max(1);
        }
        if let Some(height) = parse::<u32>(&lookup, "CAPTURE_HEIGHT") {
            config.capture.height = height.max(1);
        }

        if let Some(ms) = parse::<u64>(&lookup, "UPLINK_INTERVAL_MS") {
            config.uplink.interval = Duration::from_millis(ms.max(10));
        }
        if let Some(quality) = parse::<u8>(&lookup, "UPLINK_JPEG_QUALITY") {
            config.uplink.jpeg_quality = quality.clamp(1, 100);
        }

        if let Some(capacity) = parse::<usize>(&lookup, "GESTURE_EVENT_BUFFER") {
            config.channel.event_buffer = capacity.max(1);
        }

        if let Some(ms) = parse::<u64>(&lookup, "MARKER_FRAME_INTERVAL_MS") {
            config.display.marker_frame_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(label) = lookup("SUBJECT_TOGGLE_LABEL").filter(|s| !s.trim().is_empty()) {
            config.display.subject_toggle_label = label;
        }

        config.log_dir = lookup("PRESENTER_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(std::path::PathBuf::from);

        config
    }
}

/// Server endpoints. Both are base URLs without a trailing slash.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub api_base: String,
    pub ws_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8000".to_string(),
            ws_base: "ws://127.0.0.1:8000".to_string(),
        }
    }
}

/// Requested camera constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct UplinkConfig {
    pub interval: Duration,
    pub jpeg_quality: u8,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            jpeg_quality: 80,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ChannelConfig {
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { event_buffer: 32 }
    }
}

#[derive(Clone, Debug)]
pub struct DisplayConfig {
    /// Period of the marker interpolation loop (one display refresh).
    pub marker_frame_interval: Duration,
    /// User-facing label of the toggle-subject action.
    pub subject_toggle_label: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            marker_frame_interval: Duration::from_millis(16),
            subject_toggle_label: "Hide person".to_string(),
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    lookup(key)?.trim().parse().ok()
}
