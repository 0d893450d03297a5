//! Convergence driver tests

use std::sync::Arc;

use doorbridge::errors::BridgeError;
use doorbridge::models::trigger::{CallbackAddress, TriggerKind};
use doorbridge::store::memory::MemoryStore;
use doorbridge::store::{ObjectKind, StateStore};
use doorbridge::sync::fsm::CycleState;
use doorbridge::sync::syncer::{SyncOptions, Syncer};
use serde_json::json;

use crate::fakes::{bell, is_create, is_replace, is_update, is_write, FakeDevice, MARKER};

fn options() -> SyncOptions {
    SyncOptions {
        marker: MARKER.to_string(),
        callback: CallbackAddress::new("192.168.1.5", 8081),
        max_favorite_rounds: 5,
        max_schedule_actions: 20,
    }
}

fn syncer(device: &Arc<FakeDevice>, store: &Arc<MemoryStore>) -> Syncer {
    Syncer::new(device.clone(), store.clone(), options())
}

async fn connection(store: &MemoryStore) -> Option<serde_json::Value> {
    store
        .get_state("info.connection")
        .await
        .unwrap()
        .map(|state| state.val)
}

#[tokio::test]
async fn test_cycle_provisions_blank_device() {
    let device = Arc::new(FakeDevice::new().with_doorbell("1").with_doorbell("2"));
    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&device, &store);
    syncer.init_objects().await.unwrap();

    let report = syncer.trigger_sync().await.unwrap().unwrap();

    assert_eq!(
        report.known_triggers,
        vec![bell("1"), bell("2"), TriggerKind::MotionSensor]
    );
    // One round creating, one confirming
    assert_eq!(report.favorite_rounds, 2);
    assert_eq!(device.count(is_create), 3);
    assert_eq!(report.schedules.appended.len(), 3);

    for trigger in &report.known_triggers {
        let favorite = &report.favorites.owned[trigger];
        let entry = device.schedule_for(trigger).unwrap();
        assert!(entry.has_hook(favorite), "{} not hooked", trigger);
    }
    assert!(syncer.is_authorized());
    assert_eq!(syncer.get_state().await.phase, CycleState::Idle);
}

#[tokio::test]
async fn test_second_cycle_makes_no_writes() {
    let device = Arc::new(
        FakeDevice::new()
            .with_doorbell("1")
            .with_favorite("0", "Phone", "http://192.168.1.9/notify"),
    );
    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&device, &store);

    syncer.trigger_sync().await.unwrap();
    device.clear_calls();

    let report = syncer.trigger_sync().await.unwrap().unwrap();
    assert_eq!(device.count(is_write), 0);
    assert_eq!(report.favorite_rounds, 1);
    assert_eq!(report.schedules.hooked.len(), 2);
}

#[tokio::test]
async fn test_unsettled_favorites_abort_the_cycle() {
    let device = Arc::new(FakeDevice::new().with_doorbell("1"));
    device.forget_creates();
    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&device, &store);

    let result = syncer.trigger_sync().await;

    assert!(matches!(result, Err(BridgeError::ConvergenceBoundExceeded(5))));
    // Two triggers created again in each of the five rounds
    assert_eq!(device.count(is_create), 10);
    assert_eq!(device.count(is_replace), 0);

    let state = syncer.get_state().await;
    assert_eq!(state.phase, CycleState::Idle);
    assert!(state.last_error.is_some());
    assert!(state.last_synced_at.is_none());
}

#[tokio::test]
async fn test_failed_probe_flips_authorization() {
    let device = Arc::new(FakeDevice::new().with_doorbell("1"));
    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&device, &store);
    syncer.init_objects().await.unwrap();
    assert_eq!(connection(&store).await, Some(json!(false)));

    syncer.trigger_sync().await.unwrap();
    assert!(syncer.is_authorized());
    assert_eq!(connection(&store).await, Some(json!(true)));

    device.fail_list_schedule(|| BridgeError::Unauthorized);
    device.clear_calls();
    let result = syncer.trigger_sync().await;
    assert!(matches!(result, Err(BridgeError::Unauthorized)));
    assert!(!syncer.is_authorized());
    assert_eq!(connection(&store).await, Some(json!(false)));
    assert!(device.calls().is_empty());

    device.heal_list_schedule();
    syncer.trigger_sync().await.unwrap();
    assert!(syncer.is_authorized());
}

#[tokio::test]
async fn test_unreachable_device_is_not_fatal() {
    let device = Arc::new(FakeDevice::new());
    device.fail_list_schedule(|| BridgeError::Unreachable("connection refused".to_string()));
    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&device, &store);

    let error = syncer.trigger_sync().await.unwrap_err();
    assert!(error.is_connectivity());
    assert!(!syncer.is_authorized());
}

#[tokio::test]
async fn test_cycle_publishes_objects() {
    let device = Arc::new(FakeDevice::new().with_doorbell("1"));
    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&device, &store);
    syncer.init_objects().await.unwrap();

    syncer.trigger_sync().await.unwrap();

    let firmware = store.get_state("info.firmware").await.unwrap().unwrap();
    assert_eq!(firmware.val, json!("000130"));
    assert!(firmware.ack);

    let relay = store.object("Relays.gggaaa@1").await.unwrap();
    assert_eq!(relay.role.as_deref(), Some("button"));
    assert!(relay.write);

    assert_eq!(store.object("Doorbell.1").await.unwrap().kind, ObjectKind::Device);
    assert_eq!(
        store.object("Doorbell.1.trigger").await.unwrap().role.as_deref(),
        Some("indicator")
    );
    assert_eq!(store.object("Motion.snapshot").await.unwrap().kind, ObjectKind::Meta);
    assert!(syncer.knows(&bell("1")).await);
    assert!(!syncer.knows(&bell("9")).await);

    // Declaring again changes nothing
    let objects = store.object_count().await;
    syncer.trigger_sync().await.unwrap();
    assert_eq!(store.object_count().await, objects);
}

#[tokio::test]
async fn test_overlapping_cycle_is_dropped() {
    let device = Arc::new(FakeDevice::new().with_doorbell("1"));
    let gate = device.hold_next_schedule_read();
    let store = Arc::new(MemoryStore::new());
    let syncer = Arc::new(syncer(&device, &store));

    let first = {
        let syncer = syncer.clone();
        tokio::spawn(async move { syncer.trigger_sync().await })
    };
    gate.entered.notified().await;
    assert_eq!(syncer.get_state().await.phase, CycleState::Probing);

    let reads = device.schedule_reads();
    assert!(matches!(syncer.trigger_sync().await, Ok(None)));
    assert_eq!(device.schedule_reads(), reads);
    assert!(device.calls().is_empty());

    gate.release.notify_one();
    let report = first.await.unwrap().unwrap().unwrap();
    assert_eq!(report.known_triggers, vec![bell("1"), TriggerKind::MotionSensor]);
    assert_eq!(device.count(is_create), 2);
}

#[tokio::test]
async fn test_reconfigured_callback_rewrites_favorites() {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = syncer(&device, &store);

    syncer.trigger_sync().await.unwrap();
    assert_eq!(device.favorites()[0].target_url, "http://192.168.1.5:8081/motion");
    device.clear_calls();

    syncer
        .reconfigure(SyncOptions {
            callback: CallbackAddress::new("192.168.1.5", 9090),
            ..options()
        })
        .await;
    let report = syncer.trigger_sync().await.unwrap().unwrap();

    assert_eq!(device.count(is_update), 1);
    assert_eq!(device.count(is_create), 0);
    assert_eq!(device.favorites().len(), 1);
    assert_eq!(device.favorites()[0].target_url, "http://192.168.1.5:9090/motion");
    // The favorite keeps its id, so its schedule hook stays valid
    assert_eq!(device.count(is_replace), 0);
    assert_eq!(report.favorite_rounds, 2);
    assert_eq!(syncer.options().await.callback.port, 9090);
}
