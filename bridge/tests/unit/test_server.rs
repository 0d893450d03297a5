//! Callback listener tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use http::{Request, StatusCode};
use doorbridge::errors::BridgeError;
use doorbridge::filesys::file::File;
use doorbridge::models::trigger::CallbackAddress;
use doorbridge::server::serve::router;
use doorbridge::server::state::ServerState;
use doorbridge::store::memory::MemoryStore;
use doorbridge::store::StateStore;
use doorbridge::sync::syncer::{SyncOptions, Syncer};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::fakes::{FakeDevice, MARKER};

const DEVICE_IP: &str = "192.168.1.20";

struct Harness {
    device: Arc<FakeDevice>,
    store: Arc<MemoryStore>,
    state: Arc<ServerState>,
}

fn harness(listen_all: bool) -> Harness {
    harness_with(listen_all, None)
}

fn harness_with(listen_all: bool, snapshot_file: Option<File>) -> Harness {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = Arc::new(Syncer::new(
        device.clone(),
        store.clone(),
        SyncOptions {
            marker: MARKER.to_string(),
            callback: CallbackAddress::new("192.168.1.5", 8081),
            max_favorite_rounds: 5,
            max_schedule_actions: 20,
        },
    ));
    let mut state = ServerState::new(store.clone(), device.clone(), syncer, DEVICE_IP, listen_all);
    if let Some(file) = snapshot_file {
        state = state.with_snapshot_file(file);
    }
    Harness {
        device,
        store,
        state: Arc::new(state),
    }
}

impl Harness {
    async fn send(&self, from: &str, uri: &str) -> StatusCode {
        let remote = SocketAddr::new(from.parse().unwrap(), 40000);
        let app = router(self.state.clone()).layer(MockConnectInfo(remote));
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    async fn value(&self, path: &str) -> Option<Value> {
        self.store.get_state(path).await.unwrap().map(|state| state.val)
    }
}

#[tokio::test(start_paused = true)]
async fn test_ring_raises_trigger_for_two_seconds() {
    let harness = harness(false);

    assert_eq!(harness.send(DEVICE_IP, "/ring?4F3B").await, StatusCode::NO_CONTENT);
    assert_eq!(harness.value("Doorbell.4F3B.trigger").await, Some(json!(true)));

    tokio::time::sleep(Duration::from_millis(1999)).await;
    assert_eq!(harness.value("Doorbell.4F3B.trigger").await, Some(json!(true)));
    assert_eq!(
        harness.store.blob("Doorbell.4F3B.snapshot", "snapshot.jpg").await,
        Some(harness.device.image.clone())
    );

    tokio::time::sleep(Duration::from_millis(2)).await;
    let state = harness.store.get_state("Doorbell.4F3B.trigger").await.unwrap().unwrap();
    assert_eq!(state.val, json!(false));
    assert!(state.ack);
}

#[tokio::test(start_paused = true)]
async fn test_motion_resets_after_two_and_a_half_seconds() {
    let harness = harness(false);

    assert_eq!(harness.send(DEVICE_IP, "/motion").await, StatusCode::NO_CONTENT);
    assert_eq!(harness.value("Motion.trigger").await, Some(json!(true)));

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(harness.value("Motion.trigger").await, Some(json!(true)));

    tokio::time::sleep(Duration::from_millis(401)).await;
    assert_eq!(harness.value("Motion.trigger").await, Some(json!(false)));
}

#[tokio::test]
async fn test_other_sources_are_rejected() {
    let harness = harness(false);

    assert_eq!(
        harness.send("192.168.1.99", "/ring?4F3B").await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(harness.value("Doorbell.4F3B.trigger").await, None);
}

#[tokio::test]
async fn test_mapped_ipv6_source_is_accepted() {
    let harness = harness(false);
    assert_eq!(
        harness.send("::ffff:192.168.1.20", "/motion").await,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn test_listen_all_accepts_any_source() {
    let harness = harness(true);
    assert_eq!(harness.send("10.1.2.3", "/ring?1").await, StatusCode::NO_CONTENT);
    assert_eq!(harness.value("Doorbell.1.trigger").await, Some(json!(true)));
}

#[tokio::test]
async fn test_unknown_paths_do_nothing() {
    let harness = harness(false);

    assert_eq!(harness.send(DEVICE_IP, "/favicon.ico").await, StatusCode::NO_CONTENT);
    assert_eq!(harness.send(DEVICE_IP, "/ring?bad%20id").await, StatusCode::NO_CONTENT);
    assert_eq!(harness.store.object_count().await, 0);
    assert_eq!(harness.value("Motion.trigger").await, None);
}

#[tokio::test(start_paused = true)]
async fn test_failed_snapshot_still_resets_trigger() {
    let harness = harness(false);
    harness.device.fail_snapshots(|| BridgeError::Timeout);

    harness.send(DEVICE_IP, "/ring?1").await;
    tokio::time::sleep(Duration::from_millis(2001)).await;

    assert_eq!(harness.value("Doorbell.1.trigger").await, Some(json!(false)));
    assert_eq!(harness.store.blob("Doorbell.1.snapshot", "snapshot.jpg").await, None);
}

#[tokio::test]
async fn test_snapshot_is_kept_on_disk() {
    let dir = std::env::temp_dir().join(format!("doorbridge-snap-{}", std::process::id()));
    let file = File::new(dir.join("snap.jpg"));
    let harness = harness_with(false, Some(file.clone()));

    harness.send(DEVICE_IP, "/motion").await;

    let mut stored = false;
    for _ in 0..100 {
        if file.exists().await {
            stored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stored);
    assert_eq!(tokio::fs::read(file.path()).await.unwrap(), harness.device.image);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
