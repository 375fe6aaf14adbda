//! Configuration data types.

use core::time::Duration;
use std::env;

use serde::Deserialize;

use crate::remote::SourceUrls;

pub const FRIGATE_URL_ENV: &str = "FRIGATE_URL";
pub const FRIGATE_RTC_URL_ENV: &str = "FRIGATE_RTC_URL";

/// Contents of the optional TOML config file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Base URL of the Frigate API.
    #[serde(default)]
    pub frigate_url: Option<String>,
    /// Base URL of go2rtc, when streams are discovered on a different host than Frigate.
    #[serde(default)]
    pub frigate_rtc_url: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where the standalone runner keeps its state between restarts.
    /// Relative paths are resolved against the working directory.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            frigate_url: None,
            frigate_rtc_url: None,
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            state_path: default_state_path(),
        }
    }
}

const fn default_poll_interval_secs() -> u64 {
    60
}

const fn default_request_timeout_secs() -> u64 {
    5
}

fn default_state_path() -> String {
    "./frigate_bridge_state.json".to_string()
}

impl BridgeConfig {
    /// Period of the discovery loop, at least one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Timeout of every single Frigate request, at least one second.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// URLs the file provides, as the lowest-precedence deployment layer.
    #[must_use]
    pub fn deployment(&self) -> Deployment {
        Deployment::new(self.frigate_url.clone(), self.frigate_rtc_url.clone())
    }
}

/// Remote source URLs coming from the deployment rather than from persisted state.
/// Blank values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deployment {
    pub frigate_url: Option<String>,
    pub frigate_rtc_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Deployment {
    #[must_use]
    pub fn new(frigate_url: Option<String>, frigate_rtc_url: Option<String>) -> Self {
        Self {
            frigate_url: non_blank(frigate_url),
            frigate_rtc_url: non_blank(frigate_rtc_url),
        }
    }

    /// Reads `FRIGATE_URL` and `FRIGATE_RTC_URL`, for hosts embedding the plugin
    /// without the CLI.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads both URLs through `lookup`, keyed by their environment variable names.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(lookup(FRIGATE_URL_ENV), lookup(FRIGATE_RTC_URL_ENV))
    }

    /// Fills the values missing in `self` from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            frigate_url: self.frigate_url.or(fallback.frigate_url),
            frigate_rtc_url: self.frigate_rtc_url.or(fallback.frigate_rtc_url),
        }
    }

    /// Effective source URLs given the URL restored from persisted state.
    /// The deployment URL wins; `None` if neither is known.
    #[must_use]
    pub fn resolve(&self, persisted_url: &str) -> Option<SourceUrls> {
        let frigate_url = self
            .frigate_url
            .clone()
            .or_else(|| non_blank(Some(persisted_url.to_owned())))?;
        Some(SourceUrls {
            frigate_url,
            rtc_url: self.frigate_rtc_url.clone(),
        })
    }
}
