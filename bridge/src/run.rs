//! Standalone runner: drives a [`FrigatePlugin`] without a host.

use alloc::sync::Arc;
use core::time::Duration;
use std::{io, path::Path};

use eyre::WrapErr as _;
use serde::Serialize;
use tokio::{
    fs,
    io::{AsyncWriteExt as _, stdout},
    signal,
    sync::broadcast::{self, error::RecvError},
    time::timeout,
};
use tracing::{Instrument as _, debug, info, warn};

use crate::{
    cli::{RunArgs, SourceArgs},
    emitter::{BroadcastSink, InboundEvent, LogSink},
    host::{Device, Entity, Storage},
    plugin::{FrigatePlugin, PluginOptions},
};

/// Events buffered for a slow stdout before the oldest are dropped.
const EVENT_BUFFER: usize = 256;
const FORWARDER_GRACE: Duration = Duration::from_secs(1);

/// Creates a future that resolves when a shutdown signal is received.
pub(crate) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler, only Ctrl-C stops the bridge: {}", e);
                drop(signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    {
        drop(signal::ctrl_c().await);
    }
}

async fn read_state(path: &Path) -> eyre::Result<Storage> {
    match fs::read(path).await {
        Ok(data) => {
            debug!("Restoring state from {}", path.display());
            Ok(Storage {
                meta: String::new(),
                data,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No state file at {}, starting fresh", path.display());
            Ok(Storage::default())
        }
        Err(e) => {
            Err(e).wrap_err(format!("Failed to read state file at: {}", path.display()))
        }
    }
}

async fn write_state(path: &Path, data: &[u8]) -> eyre::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.wrap_err(format!(
            "Failed to create state directory: {}",
            parent.display()
        ))?;
    }
    fs::write(path, data)
        .await
        .wrap_err(format!("Failed to write state file at: {}", path.display()))?;
    info!("State written to {}", path.display());
    Ok(())
}

/// One line of `run` output.
#[derive(Debug, Serialize)]
struct EventLine {
    device_id: String,
    entity_id: String,
    state: serde_json::Value,
}

impl EventLine {
    fn of(event: InboundEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            state: serde_json::from_slice(&event.payload)?,
            device_id: event.device_id,
            entity_id: event.entity_id,
        })
    }
}

async fn forward_events(mut rx: broadcast::Receiver<InboundEvent>) -> io::Result<()> {
    let mut out = stdout();
    loop {
        match rx.recv().await {
            Ok(event) => {
                let line = match EventLine::of(event).and_then(|line| serde_json::to_vec(&line)) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Dropping undecodable event: {}", e);
                        continue;
                    }
                };
                out.write_all(&line).await?;
                out.write_all(b"\n").await?;
                out.flush().await?;
            }
            Err(RecvError::Lagged(skipped)) => warn!("Output too slow, skipped {} events", skipped),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Runs discovery until a shutdown signal arrives, then persists the state.
///
/// # Errors
///
/// Returns an error if the config or state file cannot be read, or the state cannot be written.
pub(crate) async fn run(args: RunArgs) -> eyre::Result<()> {
    let config = args.source.load_config().await?;
    let state_path = args
        .state
        .unwrap_or_else(|| config.state_path.clone().into());
    let prior = read_state(&state_path).await?;

    let (sink, rx) = BroadcastSink::new(EVENT_BUFFER);
    let forwarder = tokio::spawn(forward_events(rx).in_current_span());

    let options = PluginOptions::from_config(&config, args.source.deployment());
    let (plugin, manifest) = FrigatePlugin::initialize(options, &prior, Arc::new(sink));
    info!(
        id = %manifest.id,
        version = %manifest.version,
        "Starting {}",
        manifest.name
    );
    plugin.on_ready().await;

    shutdown_signal().await;
    info!("Received shutdown, shutting down");
    plugin.shutdown().await;

    let stored = plugin
        .on_storage_update(prior)
        .await
        .wrap_err("Failed to encode plugin state")?;
    write_state(&state_path, &stored.data).await?;

    // closes the sink once no reconfiguration poll holds it anymore
    drop(plugin);
    match timeout(FORWARDER_GRACE, forwarder).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Event output failed: {}", e),
        Ok(Err(e)) => warn!("Event forwarder terminated abnormally: {}", e),
        Err(_) => debug!("Event forwarder still busy, leaving it behind"),
    }
    Ok(())
}

/// A device with its entities, as printed by `discover`.
#[derive(Debug, Serialize)]
struct DeviceListing {
    #[serde(flatten)]
    device: Device,
    entities: Vec<Entity>,
}

/// Runs a single discovery cycle and prints the listings as JSON.
///
/// # Errors
///
/// Returns an error if no Frigate URL is configured, Frigate cannot be
/// queried or the output cannot be written.
pub(crate) async fn discover(args: SourceArgs) -> eyre::Result<()> {
    let config = args.load_config().await?;
    let options = PluginOptions::from_config(&config, args.deployment());
    let (plugin, _manifest) = FrigatePlugin::initialize(options, &Storage::default(), Arc::new(LogSink));
    plugin.health_check().await?;

    let report = plugin.poll_once().await.wrap_err("Discovery failed")?;
    info!(
        active = report.active,
        went_offline = report.went_offline,
        "Discovery finished"
    );

    let mut listing = Vec::new();
    for device in plugin.list_devices(Vec::new()).await {
        let entities = plugin.list_entities(&device.id, Vec::new()).await;
        listing.push(DeviceListing { device, entities });
    }

    let mut json = serde_json::to_vec_pretty(&listing).wrap_err("Failed to encode listing")?;
    json.push(b'\n');
    let mut out = stdout();
    out.write_all(&json).await?;
    out.flush().await?;
    Ok(())
}
