//! Common utilities for integration tests.
//!
//! Provides a scriptable mock Frigate server and helpers to drive the bridge
//! binary against it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Value, json};

/// Responses of the mock server; `None` answers with a 500.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub config: Option<Value>,
    pub stats: Option<Value>,
    pub streams: Option<Value>,
}

/// Frigate stand-in listening on a free local port until dropped.
pub struct MockFrigate {
    pub addr: SocketAddr,
    script: Arc<Mutex<Script>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for MockFrigate {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type Shared = Arc<Mutex<Script>>;

fn reply(body: Option<Value>) -> Result<Json<Value>, StatusCode> {
    body.map(Json).ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn config(State(script): State<Shared>) -> Result<Json<Value>, StatusCode> {
    reply(script.lock().unwrap().config.clone())
}

async fn stats(State(script): State<Shared>) -> Result<Json<Value>, StatusCode> {
    reply(script.lock().unwrap().stats.clone())
}

async fn streams(State(script): State<Shared>) -> Result<Json<Value>, StatusCode> {
    reply(script.lock().unwrap().streams.clone())
}

impl MockFrigate {
    pub async fn start(script: Script) -> Self {
        let script = Arc::new(Mutex::new(script));
        let app = Router::new()
            .route("/api/config", get(config))
            .route("/api/stats", get(stats))
            .route("/api/streams", get(streams))
            .with_state(Arc::clone(&script));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock Frigate");
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, script, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn update(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }
}

/// The `front` camera with detection on and recording off.
pub fn front_script() -> Script {
    Script {
        config: Some(json!({
            "cameras": {
                "front": {
                    "enabled": true,
                    "detect": {"enabled": true},
                    "record": {"enabled": false}
                }
            }
        })),
        stats: Some(json!({
            "cameras": {"front": {"camera_fps": 15.0, "process_fps": 14.5}}
        })),
        streams: Some(json!({
            "front": {
                "producers": [
                    {"url": "rtsp://frigate/front", "remote_addr": "10.0.0.5:554", "medias": ["video"]}
                ]
            }
        })),
    }
}

pub fn empty_config() -> Value {
    json!({"cameras": {}})
}

pub fn bridge_bin() -> &'static str {
    env!("CARGO_BIN_EXE_frigate_bridge")
}

/// A fresh path in the temp dir, removed up front.
pub fn temp_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("frigate_bridge_it_{}_{name}", std::process::id()));
    drop(std::fs::remove_file(&path));
    path
}
