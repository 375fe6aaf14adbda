//! Projection of the registry into the host's device/entity listings.
//!
//! Everything here works on a snapshot of the registry and never mutates it.
//! Results are sorted by id so repeated listings are identical.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    host::{Device, Entity, Storage},
    model::Camera,
};

pub const SYSTEM_DEVICE_ID: &str = "frigate-system";
pub const CONFIG_ENTITY_ID: &str = "frigate-config";
pub const CAMERA_DOMAIN: &str = "camera";
pub const CONFIG_DOMAIN: &str = "config";
pub const ACTION_STREAM: &str = "stream";
const CAMERA_DEVICE_META: &str = "frigate-camera";

/// Lowercases `name` and replaces spaces with hyphens.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[must_use]
pub fn device_id(camera_name: &str) -> String {
    format!("device-{}", sanitize(camera_name))
}

#[must_use]
pub fn entity_id(camera_name: &str) -> String {
    format!("entity-{}", sanitize(camera_name))
}

/// State of a camera entity, as reported to the host and as accepted from inbound events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    #[serde(default)]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub detecting: bool,
    #[serde(default)]
    pub recording: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_fps: Option<f64>,
}

impl CameraState {
    #[must_use]
    pub fn of(camera: &Camera) -> Self {
        Self {
            online: camera.online,
            stream_url: camera.stream_url().map(str::to_owned),
            detecting: camera.config.detection_enabled(),
            recording: camera.config.recording_enabled(),
            fps: camera.stats.map(|stats| stats.camera_fps),
            process_fps: camera.stats.map(|stats| stats.process_fps),
        }
    }

    /// Stores this state as both the reported and effective state of `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be represented as JSON.
    pub fn apply_to(
        &self,
        entity: &mut Entity,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(self)?;
        entity.data.reported = Some(value.clone());
        entity.data.effective = Some(value);
        entity.data.updated_at = at;
        Ok(())
    }
}

/// The synthetic device holding plugin-wide configuration.
#[must_use]
pub fn system_device() -> Device {
    Device {
        id: SYSTEM_DEVICE_ID.to_owned(),
        source_id: "system".to_owned(),
        source_name: "Frigate System".to_owned(),
        local_name: None,
        config: Storage::default(),
    }
}

fn camera_device(camera: &Camera) -> Device {
    Device {
        id: device_id(&camera.name),
        source_id: camera.name.clone(),
        source_name: camera.name.clone(),
        local_name: Some(camera.name.clone()),
        config: Storage {
            meta: CAMERA_DEVICE_META.to_owned(),
            data: Vec::new(),
        },
    }
}

fn config_entity() -> Entity {
    Entity {
        id: CONFIG_ENTITY_ID.to_owned(),
        device_id: SYSTEM_DEVICE_ID.to_owned(),
        domain: CONFIG_DOMAIN.to_owned(),
        ..Entity::default()
    }
}

fn camera_entity(camera: &Camera) -> Entity {
    let mut entity = Entity {
        id: entity_id(&camera.name),
        device_id: device_id(&camera.name),
        domain: CAMERA_DOMAIN.to_owned(),
        local_name: Some("Camera".to_owned()),
        actions: vec![ACTION_STREAM.to_owned()],
        ..Entity::default()
    };
    if let Err(e) = CameraState::of(camera).apply_to(&mut entity, camera.last_seen) {
        warn!("Failed to encode state of camera '{}': {}", camera.name, e);
    }
    entity
}

/// Cameras whose names only differ in case or spaces share an id; the camera
/// sorting last wins.
fn warn_on_collision<'name>(
    produced: &mut BTreeMap<String, &'name str>,
    id: &str,
    camera_name: &'name str,
) {
    if let Some(previous) = produced.insert(id.to_owned(), camera_name) {
        warn!(
            "Cameras '{}' and '{}' both map to '{}', only '{}' is listed",
            previous, camera_name, id, camera_name
        );
    }
}

/// Devices known to the host merged with the system device and one device per camera.
#[must_use]
pub fn list_devices(cameras: &[Camera], current: Vec<Device>) -> Vec<Device> {
    let mut by_id: BTreeMap<String, Device> = current
        .into_iter()
        .map(|device| (device.id.clone(), device))
        .collect();

    by_id.insert(SYSTEM_DEVICE_ID.to_owned(), system_device());
    let mut produced = BTreeMap::new();
    for camera in cameras {
        let device = camera_device(camera);
        warn_on_collision(&mut produced, &device.id, &camera.name);
        by_id.insert(device.id.clone(), device);
    }

    by_id.into_values().collect()
}

/// Entities of `for_device`, merged with the ones the host already knows.
#[must_use]
pub fn list_entities(cameras: &[Camera], for_device: &str, current: Vec<Entity>) -> Vec<Entity> {
    let mut by_id: BTreeMap<String, Entity> = current
        .into_iter()
        .map(|entity| (entity.id.clone(), entity))
        .collect();

    if for_device == SYSTEM_DEVICE_ID {
        by_id.insert(CONFIG_ENTITY_ID.to_owned(), config_entity());
    }

    let mut produced = BTreeMap::new();
    for camera in cameras.iter().filter(|cam| device_id(&cam.name) == for_device) {
        let entity = camera_entity(camera);
        warn_on_collision(&mut produced, &entity.id, &camera.name);
        by_id.insert(entity.id.clone(), entity);
    }

    by_id.into_values().collect()
}
