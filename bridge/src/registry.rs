//! The camera registry: every camera the bridge has ever seen, keyed by name.
//!
//! Readers (listings, persistence) take the shared side of a single
//! [`RwLock`]; the reconciler applies a whole poll cycle through one
//! [`Registry::transaction`] so readers never see a half-merged cycle.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::RwLock;

use crate::model::Camera;

/// Name-ordered map of cameras, as persisted and restored.
pub type CameraMap = BTreeMap<String, Camera>;

#[derive(Debug, Default)]
pub struct Registry {
    cameras: RwLock<CameraMap>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with restored cameras.
    #[must_use]
    pub fn from_cameras(cameras: CameraMap) -> Self {
        Self {
            cameras: RwLock::new(cameras),
        }
    }

    pub async fn get(&self, name: &str) -> Option<Camera> {
        self.cameras.read().await.get(name).cloned()
    }

    /// Reads the camera (creating it if unknown), applies `mutator` and writes it back
    /// under a single exclusive acquisition. Returns the resulting record.
    pub async fn upsert<F>(&self, name: &str, mutator: F) -> Camera
    where
        F: FnOnce(&mut Camera),
    {
        self.transaction(|txn| txn.upsert(name, mutator).clone())
            .await
    }

    /// All cameras, sorted by name.
    pub async fn snapshot_all(&self) -> Vec<Camera> {
        self.cameras.read().await.values().cloned().collect()
    }

    /// Owned copy of the whole map, for persistence.
    pub async fn snapshot_map(&self) -> CameraMap {
        self.cameras.read().await.clone()
    }

    pub async fn all_names(&self) -> BTreeSet<String> {
        self.cameras.read().await.keys().cloned().collect()
    }

    /// Runs `f` with exclusive access to the registry. The lock is released
    /// when `f` returns, so `f` must not block.
    pub async fn transaction<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Transaction<'_>) -> R,
    {
        let mut guard = self.cameras.write().await;
        let mut txn = Transaction {
            cameras: &mut guard,
        };
        f(&mut txn)
    }
}

/// Exclusive view of the registry handed out by [`Registry::transaction`].
pub struct Transaction<'registry> {
    cameras: &'registry mut CameraMap,
}

impl Transaction<'_> {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Camera> {
        self.cameras.get(name)
    }

    /// Applies `mutator` to the camera called `name`, creating an offline record first if needed.
    pub fn upsert<F>(&mut self, name: &str, mutator: F) -> &Camera
    where
        F: FnOnce(&mut Camera),
    {
        let camera = self
            .cameras
            .entry(name.to_owned())
            .or_insert_with(|| Camera::new(name));
        mutator(camera);
        camera
    }

    pub fn cameras_mut(&mut self) -> impl Iterator<Item = &mut Camera> {
        self.cameras.values_mut()
    }
}
