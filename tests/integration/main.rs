//! Uses the single integration test approach.
//!
//! This improves parallelism when running the tests, and reduces the number of binaries that have to be built (and linked)

mod common;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use frigate_bridge::{
    BridgeError, FrigatePlugin,
    config::Deployment,
    emitter::{BroadcastSink, InboundEvent},
    host::Storage,
    plugin::PluginOptions,
    remote::http_connector,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use common::{MockFrigate, Script, bridge_bin, empty_config, front_script, temp_path};

fn options(frigate_url: &str, rtc_url: Option<String>) -> PluginOptions {
    PluginOptions {
        deployment: Deployment::new(Some(frigate_url.to_owned()), rtc_url),
        poll_interval: Duration::from_secs(3600),
        connector: http_connector(Duration::from_secs(2)),
    }
}

fn state_of(event: &InboundEvent) -> Value {
    serde_json::from_slice(&event.payload).unwrap()
}

#[tokio::test]
async fn camera_goes_online_then_offline() {
    let frigate = MockFrigate::start(front_script()).await;
    let (sink, mut rx) = BroadcastSink::new(16);
    let (plugin, manifest) =
        FrigatePlugin::initialize(options(&frigate.url(), None), &Storage::default(), Arc::new(sink));
    assert_eq!(manifest.id, "plugin-frigate");

    plugin.poll_once().await.unwrap();
    let event = rx.try_recv().unwrap();
    assert_eq!(event.device_id, "device-front");
    assert_eq!(event.entity_id, "entity-front");
    let state = state_of(&event);
    assert_eq!(state["online"], true);
    assert_eq!(state["detecting"], true);
    assert_eq!(state["recording"], false);
    assert_eq!(state["fps"], 15.0);
    assert_eq!(state["process_fps"], 14.5);
    assert_eq!(state["stream_url"], "rtsp://frigate/front");
    assert!(rx.try_recv().is_err(), "exactly one event expected");

    let devices = plugin.list_devices(Vec::new()).await;
    assert_eq!(devices.len(), 2);
    let entities = plugin.list_entities("device-front", Vec::new()).await;
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].domain, "camera");
    assert_eq!(entities[0].actions, ["stream"]);

    frigate.update(|script| script.config = Some(empty_config()));
    plugin.poll_once().await.unwrap();
    let event = rx.try_recv().unwrap();
    assert_eq!(event.device_id, "device-front");
    assert_eq!(state_of(&event)["online"], false);
    assert!(rx.try_recv().is_err(), "exactly one offline event expected");

    plugin.poll_once().await.unwrap();
    assert!(rx.try_recv().is_err(), "no event while staying offline");
    assert_eq!(
        plugin.list_devices(Vec::new()).await.len(),
        2,
        "offline camera stays listed"
    );
}

#[tokio::test]
async fn frigate_outage_keeps_cameras_online() {
    let frigate = MockFrigate::start(front_script()).await;
    let (sink, mut rx) = BroadcastSink::new(16);
    let (plugin, _) =
        FrigatePlugin::initialize(options(&frigate.url(), None), &Storage::default(), Arc::new(sink));
    plugin.poll_once().await.unwrap();
    rx.try_recv().unwrap();

    frigate.update(|script| *script = Script::default());
    let err = plugin.poll_once().await.unwrap_err();
    assert!(
        matches!(err, BridgeError::RemoteUnavailable { .. }),
        "unexpected error: {err:?}"
    );
    assert!(rx.try_recv().is_err(), "failed cycle must not notify");
    let front = plugin.registry().get("front").await.unwrap();
    assert!(front.online, "front stays online");
    assert_eq!(front.stream_url(), Some("rtsp://frigate/front"));
}

#[tokio::test]
async fn streams_come_from_rtc_server() {
    let frigate = MockFrigate::start(Script {
        streams: None,
        ..front_script()
    })
    .await;
    let rtc = MockFrigate::start(Script {
        config: None,
        stats: None,
        streams: front_script().streams,
    })
    .await;
    let (sink, _rx) = BroadcastSink::new(16);
    let (plugin, _) = FrigatePlugin::initialize(
        options(&frigate.url(), Some(rtc.url())),
        &Storage::default(),
        Arc::new(sink),
    );

    plugin.poll_once().await.unwrap();
    let front = plugin.registry().get("front").await.unwrap();
    assert_eq!(front.stream_url(), Some("rtsp://frigate/front"));
}

#[tokio::test]
async fn state_survives_restart() {
    let frigate = MockFrigate::start(front_script()).await;
    let (sink, _rx) = BroadcastSink::new(16);
    let (plugin, _) =
        FrigatePlugin::initialize(options(&frigate.url(), None), &Storage::default(), Arc::new(sink));
    plugin.on_ready().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    plugin.shutdown().await;
    let stored = plugin.on_storage_update(Storage::default()).await.unwrap();

    let (sink, _rx) = BroadcastSink::new(16);
    let restored_options = PluginOptions {
        deployment: Deployment::default(),
        ..options(&frigate.url(), None)
    };
    let (restored, _) = FrigatePlugin::initialize(restored_options, &stored, Arc::new(sink));
    assert!(restored.health_check().await.is_ok(), "URL restored from state");
    assert_eq!(
        restored.list_devices(Vec::new()).await,
        plugin.list_devices(Vec::new()).await
    );
    assert_eq!(
        restored.list_entities("device-front", Vec::new()).await,
        plugin.list_entities("device-front", Vec::new()).await
    );
}

#[tokio::test]
async fn discover_prints_listing() {
    let frigate = MockFrigate::start(front_script()).await;
    let output = Command::new(bridge_bin())
        .args(["discover", "--frigate-url", &frigate.url()])
        .env_remove("FRIGATE_RTC_URL")
        .env("RUST_LOG", "error")
        .output()
        .await
        .expect("failed to run frigate_bridge");
    assert!(output.status.success(), "discover failed: {output:?}");

    let listing: Value = serde_json::from_slice(&output.stdout).unwrap();
    let devices = listing.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["id"], "device-front");
    assert_eq!(devices[0]["entities"][0]["id"], "entity-front");
    assert_eq!(
        devices[0]["entities"][0]["data"]["reported"]["stream_url"],
        "rtsp://frigate/front"
    );
    assert_eq!(devices[1]["id"], "frigate-system");
    assert_eq!(devices[1]["entities"][0]["id"], "frigate-config");
}

#[tokio::test]
async fn discover_without_url_fails() {
    let output = Command::new(bridge_bin())
        .arg("discover")
        .env_remove("FRIGATE_URL")
        .env_remove("FRIGATE_RTC_URL")
        .env("RUST_LOG", "error")
        .output()
        .await
        .expect("failed to run frigate_bridge");
    assert!(!output.status.success(), "discover should fail without URL");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("FRIGATE_URL not configured"),
        "unexpected stderr: {stderr}"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn run_streams_events_and_persists_on_sigterm() {
    let frigate = MockFrigate::start(front_script()).await;
    let state_path = temp_path("state.json");

    let mut child = Command::new(bridge_bin())
        .args(["run", "--frigate-url", &frigate.url(), "--state"])
        .arg(&state_path)
        .env_remove("FRIGATE_RTC_URL")
        .env("RUST_LOG", "error")
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start frigate_bridge");

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let line = tokio::time::timeout(Duration::from_secs(10), lines.next_line())
        .await
        .expect("no event within timeout")
        .unwrap()
        .expect("stdout closed");
    let event: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(event["device_id"], "device-front");
    assert_eq!(event["state"]["online"], true);

    let pid = child.id().unwrap().to_string();
    let killed = Command::new("kill")
        .args(["-TERM", &pid])
        .status()
        .await
        .unwrap();
    assert!(killed.success(), "failed to signal bridge");
    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("bridge did not stop")
        .unwrap();
    assert!(status.success(), "bridge exited with {status}");

    let persisted: Value = serde_json::from_slice(&std::fs::read(&state_path).unwrap()).unwrap();
    assert_eq!(persisted["config"]["frigate_url"], frigate.url());
    assert_eq!(persisted["discovered"]["front"]["online"], true);
}
