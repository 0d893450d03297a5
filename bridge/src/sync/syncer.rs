//! Convergence driver
//!
//! Runs the probe, favorites and schedule steps of one cycle in order and
//! re-fetches favorites until a pass makes no change. Only one cycle runs
//! at a time; overlapping requests are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::errors::BridgeError;
use crate::http::api::DeviceApi;
use crate::models::favorite::FavoriteId;
use crate::models::schedule::known_triggers;
use crate::models::trigger::{CallbackAddress, TriggerKind};
use crate::store::{ObjectSpec, StateStore};
use crate::sync::favorites::{FavoritesReconciler, ReconciliationResult};
use crate::sync::fsm::{CycleEvent, CycleFsm, CycleState};
use crate::sync::schedules::{ScheduleOutcome, ScheduleReconciler};

pub const CONNECTION_STATE: &str = "info.connection";

/// Convergence settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Prefix of every favorite title the bridge owns
    pub marker: String,

    /// Where the device should call back
    pub callback: CallbackAddress,

    /// Favorites passes allowed per cycle
    pub max_favorite_rounds: u32,

    /// Actions a trigger's schedule may hold
    pub max_schedule_actions: usize,
}

/// Sync state
#[derive(Debug, Clone)]
pub struct SyncState {
    pub phase: CycleState,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub known_triggers: Vec<TriggerKind>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            phase: CycleState::Idle,
            last_attempted_at: None,
            last_synced_at: None,
            last_error: None,
            known_triggers: Vec::new(),
        }
    }
}

/// Summary of a completed cycle
#[derive(Debug)]
pub struct CycleReport {
    pub favorite_rounds: u32,
    pub known_triggers: Vec<TriggerKind>,

    /// Result of the final, change-free favorites pass
    pub favorites: ReconciliationResult,

    pub schedules: ScheduleOutcome,
}

/// Per-cycle working set, rebuilt from the device every cycle
struct CycleContext {
    known_triggers: Vec<TriggerKind>,
    owned: std::collections::BTreeMap<TriggerKind, FavoriteId>,
}

/// Convergence driver
pub struct Syncer {
    api: Arc<dyn DeviceApi>,
    store: Arc<dyn StateStore>,
    options: RwLock<SyncOptions>,
    authorized: AtomicBool,
    cycle_guard: Mutex<()>,
    state: RwLock<SyncState>,
}

impl Syncer {
    /// Create a new syncer
    pub fn new(api: Arc<dyn DeviceApi>, store: Arc<dyn StateStore>, options: SyncOptions) -> Self {
        Self {
            api,
            store,
            options: RwLock::new(options),
            authorized: AtomicBool::new(false),
            cycle_guard: Mutex::new(()),
            state: RwLock::new(SyncState::default()),
        }
    }

    /// Whether the last probe succeeded
    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    /// Get sync state
    pub async fn get_state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Settings the next cycle runs with
    pub async fn options(&self) -> SyncOptions {
        self.options.read().await.clone()
    }

    /// Replace the settings; a cycle already in flight keeps the old ones
    pub async fn reconfigure(&self, options: SyncOptions) {
        let mut current = self.options.write().await;
        if *current == options {
            debug!("Sync settings unchanged");
            return;
        }
        if current.callback != options.callback {
            info!(
                "Callback address changed from {} to {}",
                current.callback, options.callback
            );
        }
        if current.marker != options.marker {
            info!("Favorite marker changed from '{}' to '{}'", current.marker, options.marker);
        }
        *current = options;
    }

    /// Whether the last probe listed `trigger`
    pub async fn knows(&self, trigger: &TriggerKind) -> bool {
        self.state.read().await.known_triggers.contains(trigger)
    }

    /// Declare the device-level objects and reset the connection indicator
    pub async fn init_objects(&self) -> Result<(), BridgeError> {
        self.store.ensure_object("info", ObjectSpec::channel("Information")).await?;
        self.store
            .ensure_object(CONNECTION_STATE, ObjectSpec::indicator("Device connected"))
            .await?;
        self.store.ensure_object("info.firmware", ObjectSpec::text("Firmware")).await?;
        self.store.ensure_object("info.build", ObjectSpec::text("Build number")).await?;
        self.store.ensure_object("info.type", ObjectSpec::text("Device type")).await?;
        self.store.ensure_object("Restart", ObjectSpec::button("Restart device")).await?;
        self.store.ensure_object("Light", ObjectSpec::button("Turn on IR light")).await?;
        self.store.set_state(CONNECTION_STATE, json!(false), true).await
    }

    /// Run one cycle unless one is already in flight, in which case `None`
    /// is returned without touching the device.
    pub async fn trigger_sync(&self) -> Result<Option<CycleReport>, BridgeError> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            debug!("Cycle already in flight, skipping...");
            return Ok(None);
        };

        self.state.write().await.last_attempted_at = Some(Utc::now());

        match self.run_cycle().await {
            Ok(report) => {
                let mut state = self.state.write().await;
                state.last_synced_at = Some(Utc::now());
                state.last_error = None;
                info!(
                    "Cycle complete after {} favorites round(s): {} hooked, {} appended",
                    report.favorite_rounds,
                    report.schedules.hooked.len(),
                    report.schedules.appended.len()
                );
                Ok(Some(report))
            }
            Err(e) => {
                self.state.write().await.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<CycleReport, BridgeError> {
        let options = self.options().await;
        let mut fsm = CycleFsm::new();
        self.advance(&mut fsm, CycleEvent::Start).await?;

        // The schedule listing doubles as the health probe
        let listing = match self.api.list_schedule().await {
            Ok(listing) => listing,
            Err(e) => {
                self.advance(&mut fsm, CycleEvent::ProbeFailed).await?;
                self.report_probe_failure(&e).await;
                return Err(e);
            }
        };
        self.set_authorized(true).await;
        self.advance(&mut fsm, CycleEvent::ProbeSucceeded).await?;

        let mut ctx = CycleContext {
            known_triggers: known_triggers(&listing),
            owned: Default::default(),
        };
        self.state.write().await.known_triggers = ctx.known_triggers.clone();
        self.publish_info().await;

        let reconciler =
            FavoritesReconciler::new(self.api.as_ref(), &options.marker, &options.callback);
        let favorites = loop {
            let listing = match self.api.list_favorites().await {
                Ok(listing) => listing,
                Err(e) => return Err(self.abort(&mut fsm, e).await),
            };
            self.advance(&mut fsm, CycleEvent::FavoritesFetched).await?;

            let result = reconciler.reconcile(&listing, &ctx.known_triggers).await;
            if !result.correction_applied {
                self.advance(&mut fsm, CycleEvent::FavoritesStable).await?;
                break result;
            }
            if fsm.favorite_rounds() >= options.max_favorite_rounds {
                let e = BridgeError::ConvergenceBoundExceeded(options.max_favorite_rounds);
                return Err(self.abort(&mut fsm, e).await);
            }
            debug!("Favorites changed, fetching again...");
            self.advance(&mut fsm, CycleEvent::FavoritesCorrected).await?;
        };
        ctx.owned = favorites.owned.clone();

        let entries = match self.api.list_schedule().await {
            Ok(entries) => entries,
            Err(e) => return Err(self.abort(&mut fsm, e).await),
        };
        self.advance(&mut fsm, CycleEvent::SchedulesFetched).await?;

        let schedules = ScheduleReconciler::new(self.api.as_ref(), options.max_schedule_actions)
            .reconcile(&entries, &ctx.known_triggers, &ctx.owned)
            .await;
        for trigger in schedules.active() {
            if let Err(e) = self.ensure_trigger_objects(trigger).await {
                warn!("Failed to declare objects for {}: {}", trigger, e);
            }
        }
        self.advance(&mut fsm, CycleEvent::SchedulesReconciled).await?;

        Ok(CycleReport {
            favorite_rounds: fsm.favorite_rounds(),
            known_triggers: ctx.known_triggers,
            favorites,
            schedules,
        })
    }

    async fn advance(&self, fsm: &mut CycleFsm, event: CycleEvent) -> Result<(), BridgeError> {
        let phase = fsm.process(event).map_err(BridgeError::Internal)?;
        self.state.write().await.phase = phase;
        Ok(())
    }

    async fn abort(&self, fsm: &mut CycleFsm, e: BridgeError) -> BridgeError {
        warn!("Cycle aborted, retrying on the next heartbeat: {}", e);
        if fsm.process(CycleEvent::Abort).is_ok() {
            self.state.write().await.phase = CycleState::Idle;
        }
        e
    }

    async fn report_probe_failure(&self, e: &BridgeError) {
        match e {
            BridgeError::Unauthorized => {
                warn!("Device rejected the configured user");
                warn!("Check user and password and grant the user the API-Operator permission");
            }
            e if e.is_connectivity() => warn!("Device is offline: {}", e),
            _ => warn!("Device probe returned an unexpected response: {}", e),
        }
        self.set_authorized(false).await;
    }

    async fn set_authorized(&self, authorized: bool) {
        let previous = self.authorized.swap(authorized, Ordering::SeqCst);
        if previous != authorized {
            info!("Device authorization changed to {}", authorized);
        }
        if let Err(e) = self
            .store
            .set_state(CONNECTION_STATE, json!(authorized), true)
            .await
        {
            warn!("Failed to publish connection state: {}", e);
        }
    }

    async fn publish_info(&self) {
        let info = match self.api.info().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to fetch device info: {}", e);
                return;
            }
        };
        debug!("Device info: {:?}", info);

        let result: Result<(), BridgeError> = async {
            self.store.set_state("info.firmware", json!(info.firmware), true).await?;
            self.store.set_state("info.build", json!(info.build), true).await?;
            self.store.set_state("info.type", json!(info.device_type), true).await?;
            if !info.relays.is_empty() {
                self.store
                    .ensure_object("Relays", ObjectSpec::channel("Available relays"))
                    .await?;
            }
            for relay in &info.relays {
                self.store
                    .ensure_object(
                        &format!("Relays.{}", relay),
                        ObjectSpec::button("Activate relay").with_desc(format!("ID: {}", relay)),
                    )
                    .await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to publish device info: {}", e);
        }
    }

    async fn ensure_trigger_objects(&self, trigger: &TriggerKind) -> Result<(), BridgeError> {
        let (device, indicator) = match trigger {
            TriggerKind::DoorbellButton(id) => (
                ObjectSpec::device("Doorbell").with_desc(format!("ID: {}", id)),
                ObjectSpec::indicator(format!("Doorbell ID '{}' pressed", id)),
            ),
            TriggerKind::MotionSensor => (
                ObjectSpec::device("Motion sensor"),
                ObjectSpec::indicator("Motion detected"),
            ),
        };
        self.store.ensure_object(&trigger.state_prefix(), device).await?;
        self.store.ensure_object(&trigger.trigger_state(), indicator).await?;
        self.store
            .ensure_object(&trigger.snapshot_state(), ObjectSpec::meta("JPG file"))
            .await?;
        Ok(())
    }
}
