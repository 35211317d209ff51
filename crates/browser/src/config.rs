//! Configuration objects with documented defaults
//!
//! Everything that used to be a tuning knob lives here explicitly: timeouts,
//! the capture ceiling, highlight colors. Constructed once and handed to the
//! session/tab at creation time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Session-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub id: String,
    /// Remote-debugging endpoint. Either the browser's WebSocket URL
    /// (`ws://...`) or the HTTP endpoint (`http://host:port`), which is
    /// resolved through `/json/version`.
    pub debugger_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            debugger_url: "http://127.0.0.1:9222".to_string(),
        }
    }
}

/// Per-tab timing and capture configuration.
#[derive(Debug, Clone)]
pub struct TabConfig {
    /// Upper bound on waiting for the load event after `Page.navigate`
    /// returned. Expiry is a soft stop, not a failure.
    pub load_event_timeout: Duration,
    /// Grace period after the load-event wait, letting page scripts settle.
    pub js_settle: Duration,
    /// Granularity of all bounded waits.
    pub poll_interval: Duration,
    /// Pause after scrolling to top before measuring a full-page capture.
    pub scroll_settle: Duration,
    pub capture: CaptureConfig,
    pub highlight: HighlightConfig,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            load_event_timeout: Duration::from_secs(30),
            js_settle: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
            scroll_settle: Duration::from_millis(500),
            capture: CaptureConfig::default(),
            highlight: HighlightConfig::default(),
        }
    }
}

/// Screenshot capture configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Single-capture height ceiling; the compositor's texture limit.
    /// Captures taller than this are tiled and stitched.
    pub max_slice_height: u32,
    /// JPEG quality for viewport-only captures. Full-page captures are
    /// always lossless.
    pub viewport_jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_slice_height: 16 * 1024,
            viewport_jpeg_quality: 95,
        }
    }
}

/// One RGBA overlay color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl HighlightColor {
    pub fn to_json(self) -> Value {
        json!({ "r": self.r, "g": self.g, "b": self.b, "a": self.a })
    }
}

/// Overlay styling for node highlighting and inspect mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightConfig {
    pub content: HighlightColor,
    pub padding: HighlightColor,
    pub margin: HighlightColor,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            content: HighlightColor { r: 152, g: 196, b: 234, a: 0.5 },
            padding: HighlightColor { r: 184, g: 226, b: 183, a: 0.5 },
            margin: HighlightColor { r: 253, g: 201, b: 148, a: 0.5 },
        }
    }
}

impl HighlightConfig {
    /// The `highlightConfig` parameter of `Overlay.highlightNode` and
    /// `Overlay.setInspectMode`.
    pub fn to_json(&self) -> Value {
        json!({
            "contentColor": self.content.to_json(),
            "paddingColor": self.padding.to_json(),
            "marginColor": self.margin.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings_match_documented_values() {
        let config = TabConfig::default();
        assert_eq!(config.load_event_timeout, Duration::from_secs(30));
        assert_eq!(config.js_settle, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.capture.max_slice_height, 16384);
    }

    #[test]
    fn highlight_config_serializes_cdp_shape() {
        let value = HighlightConfig::default().to_json();
        assert_eq!(value["contentColor"]["r"], 152);
        assert_eq!(value["paddingColor"]["g"], 226);
        assert_eq!(value["marginColor"]["b"], 148);
        assert_eq!(value["contentColor"]["a"], 0.5);
    }
}
