//! Access to the Frigate server.
//!
//! The engine only talks to Frigate through [`RemoteSource`], a capability with
//! three independent read operations. Production code builds a [`FrigateClient`]
//! through [`http_connector`]; tests plug in an in-memory fake.

#[cfg(test)]
pub(crate) mod fake;
mod http;

use alloc::sync::Arc;
use core::time::Duration;

use futures::future::BoxFuture;

use crate::{
    error::BridgeError,
    model::{FrigateConfig, FrigateStats, StreamMap},
};

pub use http::{DEFAULT_REQUEST_TIMEOUT, FrigateClient};

/// Read-only view of a Frigate server.
///
/// Implementations must not retry and must bound every call with a timeout.
pub trait RemoteSource: Send + Sync {
    /// Camera configuration, the authoritative list of cameras that exist.
    fn fetch_config(&self) -> BoxFuture<'_, Result<FrigateConfig, BridgeError>>;
    /// Capture and processing frame rates per camera.
    fn fetch_stats(&self) -> BoxFuture<'_, Result<FrigateStats, BridgeError>>;
    /// Real-time stream producers per camera.
    fn fetch_streams(&self) -> BoxFuture<'_, Result<StreamMap, BridgeError>>;
}

/// Base URLs of the remote source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceUrls {
    /// Base URL of the Frigate HTTP API.
    pub frigate_url: String,
    /// Optional distinct base URL for real-time stream discovery (go2rtc).
    pub rtc_url: Option<String>,
}

/// Builds a remote source for a set of URLs. Called at startup and whenever the URL is reconfigured.
pub type Connector =
    Arc<dyn Fn(&SourceUrls) -> Result<Arc<dyn RemoteSource>, BridgeError> + Send + Sync>;

/// Connector producing HTTP clients with the given per-request timeout.
#[must_use]
pub fn http_connector(request_timeout: Duration) -> Connector {
    Arc::new(move |urls: &SourceUrls| {
        let client = FrigateClient::new(urls, request_timeout)?;
        Ok(Arc::new(client) as Arc<dyn RemoteSource>)
    })
}
