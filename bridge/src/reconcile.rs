//! Discovery: pulls Frigate snapshots, merges them into the registry and
//! notifies the host about every camera whose state changed.

use alloc::sync::Arc;
use core::time::Duration;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, Notify, RwLock, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{Instrument as _, debug, error, info, warn};

use crate::{
    emitter::{EventSink, InboundEvent},
    error::BridgeError,
    model::{Camera, FrigateConfig, FrigateStats, StreamMap},
    presentation::{CameraState, device_id, entity_id},
    registry::{Registry, Transaction},
    remote::RemoteSource,
};

/// Period of the discovery loop unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one successful discovery cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Enabled cameras in this cycle's config.
    pub active: usize,
    /// Cameras seen for the first time.
    pub created: usize,
    /// Cameras that were online and are gone now.
    pub went_offline: usize,
    /// Events handed to the sink.
    pub notified: usize,
}

/// Merges one cycle's snapshots into the registry. Returns the report and the
/// touched cameras (as they are after the merge), sorted by name.
fn merge(
    txn: &mut Transaction<'_>,
    config: &FrigateConfig,
    stats: Option<&FrigateStats>,
    streams: Option<&StreamMap>,
    now: DateTime<Utc>,
) -> (CycleReport, Vec<Camera>) {
    let mut report = CycleReport::default();
    let mut touched = Vec::new();
    let mut active = HashSet::new();

    for (name, cam_cfg) in config.cameras.iter().filter(|entry| entry.1.enabled) {
        active.insert(name.as_str());
        if txn.get(name).is_none() {
            report.created += 1;
        }
        let camera = txn.upsert(name, |cam| {
            cam.config = cam_cfg.clone();
            cam.online = true;
            cam.last_seen = Some(now);
            if let Some(cam_stats) = stats.and_then(|s| s.cameras.get(name)) {
                cam.stats = Some(*cam_stats);
            }
            if let Some(stream) = streams.and_then(|s| s.get(name)) {
                cam.rtc_stream = Some(stream.clone());
            }
        });
        touched.push(camera.clone());
    }
    report.active = active.len();

    for cam in txn.cameras_mut() {
        if cam.online && !active.contains(cam.name.as_str()) {
            cam.online = false;
            report.went_offline += 1;
            touched.push(cam.clone());
        }
    }

    touched.sort_by(|a, b| a.name.cmp(&b.name));
    (report, touched)
}

/// Runs discovery cycles against the current remote source.
pub struct Reconciler {
    registry: Arc<Registry>,
    sink: Arc<dyn EventSink>,
    source: RwLock<Option<Arc<dyn RemoteSource>>>,
    // at most one cycle merges at a time
    cycle: Mutex<()>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        sink: Arc<dyn EventSink>,
        source: Option<Arc<dyn RemoteSource>>,
    ) -> Self {
        Self {
            registry,
            sink,
            source: RwLock::new(source),
            cycle: Mutex::new(()),
        }
    }

    /// Replaces the remote source used by subsequent cycles.
    pub async fn set_source(&self, source: Arc<dyn RemoteSource>) {
        *self.source.write().await = Some(source);
    }

    pub async fn has_source(&self) -> bool {
        self.source.read().await.is_some()
    }

    /// Runs one discovery cycle.
    ///
    /// Stats and streams are best effort; without a config snapshot nothing is
    /// merged, so a Frigate outage is never mistaken for all cameras vanishing.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` if no source is configured, `RemoteUnavailable`
    /// if the config fetch failed. The registry is untouched in both cases.
    #[tracing::instrument(skip_all)]
    pub async fn poll_once(&self) -> Result<CycleReport, BridgeError> {
        let Some(source) = self.source.read().await.clone() else {
            return Err(BridgeError::ConfigurationMissing);
        };
        let _cycle = self.cycle.lock().await;

        let (config, stats, streams) = tokio::join!(
            source.fetch_config(),
            source.fetch_stats(),
            source.fetch_streams()
        );
        let stats = stats
            .inspect_err(|e| debug!("Stats unavailable, keeping previous values: {}", e.report()))
            .ok();
        let streams = streams
            .inspect_err(|e| debug!("Streams unavailable, keeping previous values: {}", e.report()))
            .ok();
        let config = config?;

        let now = Utc::now();
        let (mut report, touched) = self
            .registry
            .transaction(|txn| merge(txn, &config, stats.as_ref(), streams.as_ref(), now))
            .await;

        for camera in &touched {
            if self.notify(camera) {
                report.notified += 1;
            }
        }
        Ok(report)
    }

    /// Pushes the state of `camera` to the sink. Failures are logged and dropped.
    fn notify(&self, camera: &Camera) -> bool {
        let payload = match serde_json::to_vec(&CameraState::of(camera)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode state of camera '{}': {}", camera.name, e);
                return false;
            }
        };
        let event = InboundEvent {
            device_id: device_id(&camera.name),
            entity_id: entity_id(&camera.name),
            payload,
        };
        match self.sink.emit(event) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to emit state of camera '{}': {}", camera.name, e);
                false
            }
        }
    }
}

/// Handle to the background discovery task.
pub struct PollLoop {
    shutdown_tx: watch::Sender<bool>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl PollLoop {
    /// Starts polling every `period`, beginning immediately.
    #[must_use]
    pub fn spawn(reconciler: Arc<Reconciler>, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());
        let handle = tokio::spawn(
            run_poll_loop(reconciler, period, shutdown_rx, Arc::clone(&wake)).in_current_span(),
        );
        Self {
            shutdown_tx,
            wake,
            handle,
        }
    }

    /// Requests a cycle now instead of at the next tick. Does not wait for it.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Stops the loop before its next cycle and waits for the running one to finish.
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!("Poll loop already gone");
        }
        if let Err(e) = self.handle.await {
            error!("Poll loop terminated abnormally: {}", e);
        }
    }
}

async fn run_poll_loop(
    reconciler: Arc<Reconciler>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    wake: Arc<Notify>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Discovery loop started, polling every {:?}", period);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            () = wake.notified() => {
                debug!("Out-of-cycle discovery requested");
                ticker.reset();
            }
            _ = ticker.tick() => {}
        }
        if *shutdown_rx.borrow() {
            break;
        }

        match reconciler.poll_once().await {
            Ok(report) => debug!(?report, "Discovery cycle finished"),
            Err(BridgeError::ConfigurationMissing) => {
                debug!("No Frigate URL configured, skipping discovery");
            }
            Err(e) => error!("Frigate discovery failed: {}", e.report()),
        }
    }

    info!("Discovery loop stopped");
}
