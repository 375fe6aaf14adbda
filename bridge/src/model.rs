//! Data types for discovered cameras and the snapshots returned by the Frigate API.
//!
//! The wire types mirror the JSON documents served by Frigate and go2rtc, the
//! [`Camera`] record is what the registry keeps and what gets persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// An on/off switch as Frigate nests it inside a camera config (`detect`, `record`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggle {
    #[serde(default)]
    pub enabled: bool,
}

/// Per-camera configuration as reported by `GET /api/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Display name Frigate sometimes repeats inside the entry; the map key stays authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub detect: Toggle,
    #[serde(default)]
    pub record: Toggle,
}

impl CameraConfig {
    #[must_use]
    pub const fn detection_enabled(&self) -> bool {
        self.detect.enabled
    }

    #[must_use]
    pub const fn recording_enabled(&self) -> bool {
        self.record.enabled
    }
}

/// Runtime counters for one camera as reported by `GET /api/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraStats {
    #[serde(default)]
    pub camera_fps: f64,
    #[serde(default)]
    pub process_fps: f64,
}

/// go2rtc and older persisted state write empty lists as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One producer of a live stream, as listed by go2rtc's `GET /api/streams`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub remote_addr: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub medias: Vec<String>,
}

/// Real-time stream descriptor of a camera.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub producers: Vec<Producer>,
}

impl StreamInfo {
    /// URL of the first producer, the canonical stream of the camera.
    #[must_use]
    pub fn primary_url(&self) -> Option<&str> {
        self.producers
            .first()
            .map(|producer| producer.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

/// Body of `GET /api/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FrigateConfig {
    #[serde(default)]
    pub cameras: HashMap<String, CameraConfig>,
}

/// Body of `GET /api/stats`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrigateStats {
    #[serde(default)]
    pub cameras: HashMap<String, CameraStats>,
}

/// Body of `GET /api/streams`, keyed by camera name.
pub type StreamMap = HashMap<String, StreamInfo>;

/// A camera the bridge has seen at least once.
///
/// `stats` and `rtc_stream` are overlays: they are only replaced when a poll
/// actually returned data for the camera, so a failed stats or streams fetch
/// keeps the last known values around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub name: String,
    #[serde(default)]
    pub config: CameraConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<CameraStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtc_stream: Option<StreamInfo>,
    #[serde(default)]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Camera {
    /// A fresh, offline record that has not been merged with any poll yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CameraConfig::default(),
            stats: None,
            rtc_stream: None,
            online: false,
            last_seen: None,
        }
    }

    #[must_use]
    pub fn stream_url(&self) -> Option<&str> {
        self.rtc_stream.as_ref().and_then(StreamInfo::primary_url)
    }
}
