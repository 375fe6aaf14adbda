//! Error taxonomy of the bridge.

use alloc::boxed::Box;
use core::error;

use thiserror::Error as ThisError;

/// Boxed cause of a failed remote call.
pub type RemoteCause = Box<dyn error::Error + Send + Sync>;

/// Errors surfaced by the engine and its host callbacks.
#[derive(Debug, ThisError)]
pub enum BridgeError {
    /// Frigate could not be reached, timed out, answered with a non-2xx status
    /// or sent a body we could not decode. Callers do not distinguish further.
    #[error("Frigate unavailable at {url}")]
    RemoteUnavailable {
        url: String,
        #[source]
        source: RemoteCause,
    },
    /// No Frigate URL is known, neither from deployment configuration nor from persisted state.
    #[error("FRIGATE_URL not configured")]
    ConfigurationMissing,
    /// An inbound event carried a payload that is not a camera state.
    #[error("Malformed camera state payload")]
    MalformedEvent(#[source] serde_json::Error),
    /// The plugin state could not be serialized for the host.
    #[error("Failed to encode plugin state")]
    StateEncoding(#[source] serde_json::Error),
}

impl BridgeError {
    pub(crate) fn remote(url: impl Into<String>, source: impl Into<RemoteCause>) -> Self {
        Self::RemoteUnavailable {
            url: url.into(),
            source: source.into(),
        }
    }

    /// This error followed by its chain of causes, for log lines.
    #[must_use]
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut cause = error::Error::source(self);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = error::Error::source(inner);
        }
        message
    }
}
