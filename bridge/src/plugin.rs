//! Host-facing surface of the bridge.
//!
//! [`FrigatePlugin`] owns one engine instance: the registry, the reconciler
//! and its poll loop. Every host callback is an async method that only
//! contends on the registry lock.

use alloc::sync::Arc;
use core::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{Instrument as _, debug, error, info, warn};

use crate::{
    codec::{self, PersistedState, PluginConfig},
    config::{BridgeConfig, Deployment},
    emitter::EventSink,
    error::BridgeError,
    host::{Command, Device, Entity, Event, Manifest, Storage},
    presentation::{self, CONFIG_ENTITY_ID, CameraState},
    reconcile::{CycleReport, DEFAULT_POLL_INTERVAL, PollLoop, Reconciler},
    registry::Registry,
    remote::{Connector, DEFAULT_REQUEST_TIMEOUT, SourceUrls, http_connector},
};

pub const PLUGIN_ID: &str = "plugin-frigate";
pub const PLUGIN_NAME: &str = "Frigate Video";

/// Everything the plugin needs besides the host-provided state and sink.
pub struct PluginOptions {
    /// URLs from environment, CLI or config file. Override persisted state.
    pub deployment: Deployment,
    pub poll_interval: Duration,
    pub connector: Connector,
}

impl PluginOptions {
    /// Defaults: 60 s polling over HTTP with a 5 s request timeout.
    #[must_use]
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connector: http_connector(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Options from a loaded config file, with `overrides` taking precedence over its URLs.
    #[must_use]
    pub fn from_config(config: &BridgeConfig, overrides: Deployment) -> Self {
        Self {
            deployment: overrides.or(config.deployment()),
            poll_interval: config.poll_interval(),
            connector: http_connector(config.request_timeout()),
        }
    }
}

/// Payload of the reconfiguration command accepted by `frigate-config`.
#[derive(Debug, Deserialize)]
struct Reconfigure {
    frigate_url: String,
}

#[must_use]
pub fn manifest() -> Manifest {
    Manifest {
        id: PLUGIN_ID.to_owned(),
        name: PLUGIN_NAME.to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    }
}

pub struct FrigatePlugin {
    registry: Arc<Registry>,
    reconciler: Arc<Reconciler>,
    config: RwLock<PluginConfig>,
    deployment: Deployment,
    connector: Connector,
    poll_interval: Duration,
    poll_loop: Mutex<Option<PollLoop>>,
}

fn restore(prior: &Storage) -> PersistedState {
    match codec::decode(&prior.data) {
        Ok(Some(state)) => state,
        Ok(None) => PersistedState::default(),
        Err(e) => {
            warn!("Ignoring unreadable persisted state: {}", e);
            PersistedState::default()
        }
    }
}

impl FrigatePlugin {
    /// Restores `prior` state and prepares the remote client.
    ///
    /// Polling only starts with [`Self::on_ready`].
    #[must_use]
    pub fn initialize(
        options: PluginOptions,
        prior: &Storage,
        sink: Arc<dyn EventSink>,
    ) -> (Self, Manifest) {
        let PluginOptions {
            deployment,
            poll_interval,
            connector,
        } = options;

        let mut state = restore(prior);
        let source = match deployment.resolve(&state.config.frigate_url) {
            Some(urls) => {
                state.config.frigate_url.clone_from(&urls.frigate_url);
                match connector(&urls) {
                    Ok(source) => {
                        info!("Using Frigate at {}", urls.frigate_url);
                        Some(source)
                    }
                    Err(e) => {
                        error!("Failed to create Frigate client: {}", e.report());
                        None
                    }
                }
            }
            None => {
                warn!("FRIGATE_URL not configured, discovery is disabled until configured");
                None
            }
        };

        debug!("Restored {} cameras", state.discovered.len());
        let registry = Arc::new(Registry::from_cameras(state.discovered));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&registry), sink, source));

        let plugin = Self {
            registry,
            reconciler,
            config: RwLock::new(state.config),
            deployment,
            connector,
            poll_interval,
            poll_loop: Mutex::new(None),
        };
        (plugin, manifest())
    }

    /// Starts the poll loop. Calling it again while running has no effect.
    #[tracing::instrument(skip_all)]
    pub async fn on_ready(&self) {
        let mut poll_loop = self.poll_loop.lock().await;
        if poll_loop.is_some() {
            debug!("Poll loop already running");
            return;
        }
        if !self.reconciler.has_source().await {
            warn!("Starting without Frigate URL, cycles are skipped until one is configured");
        }
        *poll_loop = Some(PollLoop::spawn(
            Arc::clone(&self.reconciler),
            self.poll_interval,
        ));
    }

    /// # Errors
    ///
    /// `ConfigurationMissing` if no Frigate client could be set up from a known URL.
    /// Remote failures are not reported here.
    pub async fn health_check(&self) -> Result<(), BridgeError> {
        if !self.reconciler.has_source().await {
            return Err(BridgeError::ConfigurationMissing);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub async fn list_devices(&self, current: Vec<Device>) -> Vec<Device> {
        let cameras = self.registry.snapshot_all().await;
        presentation::list_devices(&cameras, current)
    }

    #[tracing::instrument(skip(self, current))]
    pub async fn list_entities(&self, device_id: &str, current: Vec<Entity>) -> Vec<Entity> {
        let cameras = self.registry.snapshot_all().await;
        presentation::list_entities(&cameras, device_id, current)
    }

    /// Handles `{"frigate_url": ...}` sent to `frigate-config`.
    ///
    /// A usable URL replaces the remote client and requests a poll without
    /// waiting for it. Anything else leaves the plugin unchanged.
    #[tracing::instrument(skip_all, fields(entity = %entity.id))]
    pub async fn on_command(&self, command: &Command, entity: Entity) -> Entity {
        if entity.id != CONFIG_ENTITY_ID {
            debug!("Ignoring command for non-config entity");
            return entity;
        }
        let params = match serde_json::from_slice::<Reconfigure>(&command.payload) {
            Ok(params) => params,
            Err(e) => {
                debug!("Ignoring malformed command payload: {}", e);
                return entity;
            }
        };
        let frigate_url = params.frigate_url.trim();
        if frigate_url.is_empty() {
            debug!("Ignoring command without Frigate URL");
            return entity;
        }

        let urls = SourceUrls {
            frigate_url: frigate_url.to_owned(),
            rtc_url: self.deployment.frigate_rtc_url.clone(),
        };
        match (self.connector)(&urls) {
            Ok(source) => {
                self.config.write().await.frigate_url.clone_from(&urls.frigate_url);
                self.reconciler.set_source(source).await;
                info!("Frigate URL changed to {}", urls.frigate_url);
                self.request_poll().await;
            }
            Err(e) => warn!("Keeping previous Frigate client: {}", e.report()),
        }
        entity
    }

    /// Stores a pushed camera state as the entity's reported and effective state.
    ///
    /// # Errors
    ///
    /// `MalformedEvent` if the payload is not a camera state; `entity` is dropped unchanged.
    #[tracing::instrument(skip_all, fields(entity = %entity.id))]
    pub async fn on_event(&self, event: &Event, mut entity: Entity) -> Result<Entity, BridgeError> {
        let state: CameraState =
            serde_json::from_slice(&event.payload).map_err(BridgeError::MalformedEvent)?;
        state
            .apply_to(&mut entity, Some(Utc::now()))
            .map_err(BridgeError::MalformedEvent)?;
        Ok(entity)
    }

    /// Returns `current` with its data replaced by the encoded plugin state.
    ///
    /// # Errors
    ///
    /// `StateEncoding` if the state cannot be serialized.
    #[tracing::instrument(skip_all)]
    pub async fn on_storage_update(&self, current: Storage) -> Result<Storage, BridgeError> {
        let state = self.persisted_state().await;
        let data = codec::encode(&state).map_err(BridgeError::StateEncoding)?;
        debug!("Persisting {} cameras", state.discovered.len());
        Ok(Storage { data, ..current })
    }

    /// Stops the poll loop and waits for a running cycle to finish.
    pub async fn shutdown(&self) {
        if let Some(poll_loop) = self.poll_loop.lock().await.take() {
            poll_loop.shutdown().await;
        }
        info!("Frigate plugin stopped");
    }

    /// Runs one discovery cycle right away, independent of the loop.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::poll_once`].
    pub async fn poll_once(&self) -> Result<CycleReport, BridgeError> {
        self.reconciler.poll_once().await
    }

    pub async fn persisted_state(&self) -> PersistedState {
        PersistedState {
            config: self.config.read().await.clone(),
            discovered: self.registry.snapshot_map().await,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn request_poll(&self) {
        if let Some(poll_loop) = self.poll_loop.lock().await.as_ref() {
            poll_loop.wake();
            return;
        }
        let reconciler = Arc::clone(&self.reconciler);
        drop(tokio::spawn(
            async move {
                if let Err(e) = reconciler.poll_once().await {
                    error!("Frigate discovery failed: {}", e.report());
                }
            }
            .in_current_span(),
        ));
    }
}
