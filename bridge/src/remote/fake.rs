//! In-memory [`RemoteSource`] for unit tests.

use alloc::sync::Arc;
use std::{io, sync::Mutex};

use futures::{FutureExt as _, future::BoxFuture};

use super::{Connector, RemoteSource, SourceUrls};
use crate::{
    error::BridgeError,
    model::{CameraConfig, CameraStats, FrigateConfig, FrigateStats, Producer, StreamInfo, StreamMap, Toggle},
};

/// Scripted responses; `None` makes the corresponding fetch fail.
#[derive(Default)]
struct Script {
    config: Option<FrigateConfig>,
    stats: Option<FrigateStats>,
    streams: Option<StreamMap>,
    config_calls: usize,
}

#[derive(Default)]
pub(crate) struct FakeSource {
    script: Mutex<Script>,
}

fn unavailable(endpoint: &str) -> BridgeError {
    BridgeError::remote(
        format!("fake://frigate/api/{endpoint}"),
        io::Error::other("scripted failure"),
    )
}

impl FakeSource {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_config(&self, config: Option<FrigateConfig>) {
        self.script.lock().unwrap().config = config;
    }

    pub(crate) fn set_stats(&self, stats: Option<FrigateStats>) {
        self.script.lock().unwrap().stats = stats;
    }

    pub(crate) fn set_streams(&self, streams: Option<StreamMap>) {
        self.script.lock().unwrap().streams = streams;
    }

    pub(crate) fn config_calls(&self) -> usize {
        self.script.lock().unwrap().config_calls
    }

    /// Connector that always hands out `source` and records the URLs it was asked for.
    pub(crate) fn connector(source: &Arc<Self>, seen: Arc<Mutex<Vec<SourceUrls>>>) -> Connector {
        let source = Arc::clone(source);
        Arc::new(move |urls: &SourceUrls| {
            seen.lock().unwrap().push(urls.clone());
            Ok(Arc::clone(&source) as Arc<dyn RemoteSource>)
        })
    }
}

impl RemoteSource for FakeSource {
    fn fetch_config(&self) -> BoxFuture<'_, Result<FrigateConfig, BridgeError>> {
        let mut script = self.script.lock().unwrap();
        script.config_calls += 1;
        let result = script.config.clone().ok_or_else(|| unavailable("config"));
        futures::future::ready(result).boxed()
    }

    fn fetch_stats(&self) -> BoxFuture<'_, Result<FrigateStats, BridgeError>> {
        let result = self
            .script
            .lock()
            .unwrap()
            .stats
            .clone()
            .ok_or_else(|| unavailable("stats"));
        futures::future::ready(result).boxed()
    }

    fn fetch_streams(&self) -> BoxFuture<'_, Result<StreamMap, BridgeError>> {
        let result = self
            .script
            .lock()
            .unwrap()
            .streams
            .clone()
            .ok_or_else(|| unavailable("streams"));
        futures::future::ready(result).boxed()
    }
}

pub(crate) fn camera(enabled: bool, detect: bool, record: bool) -> CameraConfig {
    CameraConfig {
        name: None,
        enabled,
        detect: Toggle { enabled: detect },
        record: Toggle { enabled: record },
    }
}

pub(crate) fn config_of(cameras: &[(&str, CameraConfig)]) -> FrigateConfig {
    FrigateConfig {
        cameras: cameras
            .iter()
            .map(|&(name, ref cfg)| (name.to_owned(), cfg.clone()))
            .collect(),
    }
}

pub(crate) fn stats_of(cameras: &[(&str, f64, f64)]) -> FrigateStats {
    FrigateStats {
        cameras: cameras
            .iter()
            .map(|&(name, camera_fps, process_fps)| {
                (
                    name.to_owned(),
                    CameraStats {
                        camera_fps,
                        process_fps,
                    },
                )
            })
            .collect(),
    }
}

pub(crate) fn streams_of(cameras: &[(&str, &str)]) -> StreamMap {
    cameras
        .iter()
        .map(|&(name, url)| {
            (
                name.to_owned(),
                StreamInfo {
                    producers: vec![Producer {
                        url: url.to_owned(),
                        remote_addr: "10.0.0.1".to_owned(),
                        medias: vec!["video".to_owned()],
                    }],
                },
            )
        })
        .collect()
}
