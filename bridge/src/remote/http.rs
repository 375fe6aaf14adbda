//! HTTP implementation of [`RemoteSource`] on top of `reqwest`.

use core::time::Duration;
use std::sync::Once;

use futures::{FutureExt as _, future::BoxFuture};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{RemoteSource, SourceUrls};
use crate::{
    error::BridgeError,
    model::{FrigateConfig, FrigateStats, StreamMap},
};

/// Upper bound for every request made against Frigate.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT_RUSTLS: Once = Once::new();

fn install_crypto_provider() {
    INIT_RUSTLS.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("A rustls crypto provider was already installed, keeping it");
        }
    });
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}

/// Stateless client for the three Frigate read endpoints.
#[derive(Debug, Clone)]
pub struct FrigateClient {
    frigate_url: String,
    rtc_url: Option<String>,
    http: reqwest::Client,
}

impl FrigateClient {
    /// Creates a client for `urls`, every request is cut off after `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` if the underlying HTTP client cannot be built.
    pub fn new(urls: &SourceUrls, request_timeout: Duration) -> Result<Self, BridgeError> {
        install_crypto_provider();
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BridgeError::remote(urls.frigate_url.clone(), e))?;
        Ok(Self {
            frigate_url: trim_base(&urls.frigate_url),
            rtc_url: urls
                .rtc_url
                .as_deref()
                .map(trim_base)
                .filter(|url| !url.is_empty()),
            http,
        })
    }

    /// Base URL used for stream discovery, go2rtc if configured, Frigate otherwise.
    fn streams_base(&self) -> &str {
        self.rtc_url.as_deref().unwrap_or(&self.frigate_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, BridgeError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);
        match response {
            Ok(response) => response
                .json::<T>()
                .await
                .map_err(|e| BridgeError::remote(url, e)),
            Err(e) => Err(BridgeError::remote(url, e)),
        }
    }
}

impl RemoteSource for FrigateClient {
    fn fetch_config(&self) -> BoxFuture<'_, Result<FrigateConfig, BridgeError>> {
        self.get_json(format!("{}/api/config", self.frigate_url))
            .boxed()
    }

    fn fetch_stats(&self) -> BoxFuture<'_, Result<FrigateStats, BridgeError>> {
        self.get_json(format!("{}/api/stats", self.frigate_url))
            .boxed()
    }

    fn fetch_streams(&self) -> BoxFuture<'_, Result<StreamMap, BridgeError>> {
        self.get_json(format!("{}/api/streams", self.streams_base()))
            .boxed()
    }
}
