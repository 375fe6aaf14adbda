//! Persistence format of the plugin state.
//!
//! The host stores an opaque blob for us; we fill it with
//! `{"config": {"frigate_url": ...}, "discovered": {name: Camera}}`.
//! The registry map is name-ordered, so encoding the same state twice
//! yields the same bytes.

use serde::{Deserialize, Serialize};

use crate::registry::CameraMap;

/// Remote source settings that survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub frigate_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub config: PluginConfig,
    #[serde(default)]
    pub discovered: CameraMap,
}

/// # Errors
///
/// Returns an error if the state cannot be represented as JSON.
pub fn encode(state: &PersistedState) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(state)
}

/// Decodes a stored blob. An empty blob means nothing was stored yet.
///
/// # Errors
///
/// Returns an error if `bytes` is not a valid persisted state.
pub fn decode(bytes: &[u8]) -> Result<Option<PersistedState>, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes).map(Some)
}
