//! Heartbeat worker tests

use std::sync::Arc;
use std::time::Duration;

use doorbridge::models::trigger::CallbackAddress;
use doorbridge::store::memory::MemoryStore;
use doorbridge::sync::syncer::{SyncOptions, Syncer};
use doorbridge::workers::heartbeat::{self, SyncRequests, SyncTrigger};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::fakes::{is_create, is_update, FakeDevice, MARKER};

fn options() -> SyncOptions {
    SyncOptions {
        marker: MARKER.to_string(),
        callback: CallbackAddress::new("192.168.1.5", 8081),
        max_favorite_rounds: 5,
        max_schedule_actions: 20,
    }
}

fn spawn_worker(
    syncer: Arc<Syncer>,
    requests: SyncRequests,
    shutdown_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        heartbeat::run(
            &heartbeat::Options {
                interval: Duration::from_secs(180),
                initial_delay: Duration::ZERO,
            },
            syncer.as_ref(),
            requests,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    })
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_runs_on_interval_and_on_request() {
    let device = Arc::new(FakeDevice::new().with_doorbell("1"));
    let store = Arc::new(MemoryStore::new());
    let syncer = Arc::new(Syncer::new(device.clone(), store, options()));
    let (sync_trigger, requests) = SyncTrigger::new();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let worker = spawn_worker(syncer.clone(), requests, shutdown_rx);

    // Each cycle lists the schedule twice: probe and schedule pass
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(device.schedule_reads(), 2);

    assert!(sync_trigger.request());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(device.schedule_reads(), 4);

    tokio::time::sleep(Duration::from_secs(180)).await;
    assert_eq!(device.schedule_reads(), 6);

    shutdown_tx.send(()).unwrap();
    worker.await.unwrap();
    assert!(syncer.get_state().await.last_synced_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_reloaded_settings_reach_the_requested_cycle() {
    let device = Arc::new(FakeDevice::new());
    let store = Arc::new(MemoryStore::new());
    let syncer = Arc::new(Syncer::new(device.clone(), store, options()));
    let (sync_trigger, requests) = SyncTrigger::new();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let worker = spawn_worker(syncer.clone(), requests, shutdown_rx);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(device.count(is_create), 1);
    device.clear_calls();

    // Only the latest reload is applied
    sync_trigger.reload(SyncOptions {
        max_schedule_actions: 8,
        ..options()
    });
    sync_trigger.reload(SyncOptions {
        callback: CallbackAddress::new("192.168.1.5", 9090),
        ..options()
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(device.count(is_update), 1);
    assert_eq!(device.favorites()[0].target_url, "http://192.168.1.5:9090/motion");
    let applied = syncer.options().await;
    assert_eq!(applied.callback.port, 9090);
    assert_eq!(applied.max_schedule_actions, 20);

    shutdown_tx.send(()).unwrap();
    worker.await.unwrap();
}

#[test]
fn test_pending_requests_collapse() {
    let (sync_trigger, _requests) = SyncTrigger::new();
    assert!(sync_trigger.request());
    assert!(!sync_trigger.request());
}
