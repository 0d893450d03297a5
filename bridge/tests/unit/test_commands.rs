//! Command worker tests

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use doorbridge::errors::BridgeError;
use doorbridge::models::trigger::CallbackAddress;
use doorbridge::store::memory::MemoryStore;
use doorbridge::store::{StateChange, StateStore, StateValue};
use doorbridge::sync::syncer::{SyncOptions, Syncer};
use doorbridge::workers::commands;
use serde_json::json;

use crate::fakes::{Call, FakeDevice, MARKER};

async fn authorized_syncer(device: &Arc<FakeDevice>, store: &Arc<MemoryStore>) -> Syncer {
    let syncer = Syncer::new(
        device.clone(),
        store.clone(),
        SyncOptions {
            marker: MARKER.to_string(),
            callback: CallbackAddress::new("192.168.1.5", 8081),
            max_favorite_rounds: 5,
            max_schedule_actions: 20,
        },
    );
    syncer.trigger_sync().await.unwrap();
    device.clear_calls();
    syncer
}

fn user_write(path: &str) -> StateChange {
    StateChange {
        path: path.to_string(),
        value: StateValue {
            val: json!(true),
            ack: false,
            ts: Utc::now(),
        },
    }
}

#[tokio::test]
async fn test_relay_write_opens_door_and_acks() {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = authorized_syncer(&device, &store).await;

    commands::handle_change(device.as_ref(), store.as_ref(), &syncer, &user_write("Relays.1")).await;

    assert_eq!(device.calls(), vec![Call::OpenDoor("1".to_string())]);
    let state = store.get_state("Relays.1").await.unwrap().unwrap();
    assert!(state.ack);
}

#[tokio::test]
async fn test_restart_and_light() {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = authorized_syncer(&device, &store).await;

    commands::handle_change(device.as_ref(), store.as_ref(), &syncer, &user_write("Restart")).await;
    commands::handle_change(device.as_ref(), store.as_ref(), &syncer, &user_write("Light")).await;

    assert_eq!(device.calls(), vec![Call::Restart, Call::LightOn]);
}

#[tokio::test]
async fn test_acknowledged_and_unrelated_writes_are_ignored() {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = authorized_syncer(&device, &store).await;

    let mut acked = user_write("Restart");
    acked.value.ack = true;
    commands::handle_change(device.as_ref(), store.as_ref(), &syncer, &acked).await;
    commands::handle_change(
        device.as_ref(),
        store.as_ref(),
        &syncer,
        &user_write("Doorbell.1.trigger"),
    )
    .await;

    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn test_commands_refused_while_unauthorized() {
    let device = Arc::new(FakeDevice::new());
    device.fail_list_schedule(|| BridgeError::Unauthorized);
    let store = Arc::new(MemoryStore::new());
    let syncer = Syncer::new(
        device.clone(),
        store.clone(),
        SyncOptions {
            marker: MARKER.to_string(),
            callback: CallbackAddress::new("192.168.1.5", 8081),
            max_favorite_rounds: 5,
            max_schedule_actions: 20,
        },
    );
    let _ = syncer.trigger_sync().await;

    commands::handle_change(device.as_ref(), store.as_ref(), &syncer, &user_write("Relays.1")).await;

    assert!(device.calls().is_empty());
    assert_eq!(store.get_state("Relays.1").await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_command_is_not_acknowledged() {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = authorized_syncer(&device, &store).await;
    device.fail_commands(|| BridgeError::UnexpectedStatus(204));

    commands::handle_change(device.as_ref(), store.as_ref(), &syncer, &user_write("Relays.1")).await;

    assert_eq!(device.calls().len(), 1);
    assert_eq!(store.get_state("Relays.1").await.unwrap(), None);
}

#[tokio::test]
async fn test_worker_follows_store_writes() {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = Arc::new(authorized_syncer(&device, &store).await);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let worker = {
        let device = device.clone();
        let store = store.clone();
        let syncer = syncer.clone();
        let changes = store.subscribe();
        tokio::spawn(async move {
            commands::run(
                device.as_ref(),
                store.as_ref(),
                syncer.as_ref(),
                changes,
                Box::pin(async move {
                    let _ = shutdown_rx.await;
                }),
            )
            .await;
        })
    };

    store.set_state("Light", json!(true), false).await.unwrap();

    let mut acked = false;
    for _ in 0..100 {
        if let Some(state) = store.get_state("Light").await.unwrap() {
            if state.ack {
                acked = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(acked);
    assert_eq!(device.calls(), vec![Call::LightOn]);

    let _ = shutdown_tx.send(());
    worker.await.unwrap();
}
