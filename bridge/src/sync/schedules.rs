//! Schedule reconciliation

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::errors::BridgeError;
use crate::http::api::DeviceApi;
use crate::models::favorite::FavoriteId;
use crate::models::schedule::{OutputAction, ScheduleEntry};
use crate::models::trigger::TriggerKind;

/// Entry to submit so that `trigger` calls `favorite`, or `None` when the
/// hook is already there.
pub fn plan_hook(
    entry: &ScheduleEntry,
    trigger: &TriggerKind,
    favorite: &FavoriteId,
    max_actions: usize,
) -> Result<Option<ScheduleEntry>, BridgeError> {
    if entry.has_hook(favorite) {
        return Ok(None);
    }
    if entry.actions.len() >= max_actions {
        return Err(BridgeError::CapacityExceeded {
            trigger: trigger.to_string(),
            count: entry.actions.len(),
            limit: max_actions,
        });
    }
    let mut updated = entry.clone();
    updated.actions.push(OutputAction::http_hook(favorite));
    Ok(Some(updated))
}

/// Per-trigger outcome of a schedule pass
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// Already calling our favorite
    pub hooked: Vec<TriggerKind>,

    /// Hook appended and submitted
    pub appended: Vec<TriggerKind>,

    /// No owned favorite to hook up
    pub skipped: Vec<TriggerKind>,

    pub failed: Vec<(TriggerKind, BridgeError)>,
}

impl ScheduleOutcome {
    /// Triggers whose schedule calls the bridge after this pass
    pub fn active(&self) -> impl Iterator<Item = &TriggerKind> {
        self.hooked.iter().chain(self.appended.iter())
    }
}

pub struct ScheduleReconciler<'a> {
    api: &'a dyn DeviceApi,
    max_actions: usize,
}

impl<'a> ScheduleReconciler<'a> {
    pub fn new(api: &'a dyn DeviceApi, max_actions: usize) -> Self {
        Self { api, max_actions }
    }

    pub async fn reconcile(
        &self,
        entries: &[ScheduleEntry],
        known: &[TriggerKind],
        owned: &BTreeMap<TriggerKind, FavoriteId>,
    ) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();

        for trigger in known {
            let Some(favorite) = owned.get(trigger) else {
                warn!("No favorite owned for {}, not touching its schedule", trigger);
                outcome.skipped.push(trigger.clone());
                continue;
            };

            let empty;
            let entry = match entries.iter().find(|e| e.trigger() == Some(trigger)) {
                Some(entry) => entry,
                None => {
                    empty = ScheduleEntry::empty(trigger.clone());
                    &empty
                }
            };

            match plan_hook(entry, trigger, favorite, self.max_actions) {
                Ok(None) => {
                    debug!("Schedule for {} already calls favorite {}", trigger, favorite);
                    outcome.hooked.push(trigger.clone());
                }
                Ok(Some(updated)) => {
                    debug!("Schedule for {} is missing favorite {}", trigger, favorite);
                    match self.api.replace_schedule(&updated).await {
                        Ok(()) => {
                            info!("Schedule for {} now calls favorite {}", trigger, favorite);
                            outcome.appended.push(trigger.clone());
                        }
                        Err(e) => {
                            warn!("Failed to replace schedule for {}: {}", trigger, e);
                            outcome.failed.push((trigger.clone(), e));
                        }
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    outcome.failed.push((trigger.clone(), e));
                }
            }
        }

        outcome
    }
}
