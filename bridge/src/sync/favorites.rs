//! Favorites reconciliation
//!
//! One pass walks the device's favorites in listing order and sorts each
//! into stale, owned or foreign. A stale favorite is rewritten and ends the
//! pass, since the listing no longer reflects the device. Duplicated owned
//! favorites are deleted, keeping the first one listed. Finally every known
//! trigger without an owned favorite gets one created.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::http::api::DeviceApi;
use crate::models::favorite::{parse_title, FavoriteId, RemoteFavorite};
use crate::models::trigger::{CallbackAddress, TriggerKind};

/// How a single favorite relates to the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Carries our marker but calls another address
    Stale(TriggerKind),

    /// Carries our marker and calls us
    Owned(TriggerKind),

    /// Belongs to someone else, or its title does not parse
    Foreign,
}

/// Classify `favorite` against the bridge's marker and callback address
pub fn classify(
    favorite: &RemoteFavorite,
    marker: &str,
    callback: &CallbackAddress,
) -> Classification {
    let Some(trigger) = parse_title(&favorite.title, marker) else {
        return Classification::Foreign;
    };
    if callback.matches(&favorite.target_url) {
        Classification::Owned(trigger)
    } else {
        Classification::Stale(trigger)
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Remote state changed; the listing must be fetched again
    pub correction_applied: bool,

    pub duplicates_found: Vec<FavoriteId>,

    pub stale_found: Vec<FavoriteId>,

    /// Triggers a favorite was created for
    pub created: Vec<TriggerKind>,

    /// First owned favorite per trigger
    pub owned: BTreeMap<TriggerKind, FavoriteId>,
}

pub struct FavoritesReconciler<'a> {
    api: &'a dyn DeviceApi,
    marker: &'a str,
    callback: &'a CallbackAddress,
}

impl<'a> FavoritesReconciler<'a> {
    pub fn new(api: &'a dyn DeviceApi, marker: &'a str, callback: &'a CallbackAddress) -> Self {
        Self {
            api,
            marker,
            callback,
        }
    }

    /// Run one pass over `favorites` for the `known` triggers.
    ///
    /// Failed writes are logged and skipped; they never abort the pass.
    pub async fn reconcile(
        &self,
        favorites: &[RemoteFavorite],
        known: &[TriggerKind],
    ) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        // Triggers whose stale favorite could not be rewritten; creating
        // another one would only produce a duplicate.
        let mut blocked: BTreeSet<TriggerKind> = BTreeSet::new();

        for favorite in favorites {
            match classify(favorite, self.marker, self.callback) {
                Classification::Stale(trigger) => {
                    result.stale_found.push(favorite.id.clone());
                    let url = self.callback.url_for(&trigger);
                    warn!(
                        "Favorite {} calls '{}' instead of {}, updating it",
                        favorite.id, favorite.target_url, self.callback
                    );
                    match self
                        .api
                        .update_favorite(&favorite.id, &favorite.title, &url)
                        .await
                    {
                        Ok(()) => {
                            info!("Favorite {} now calls {}", favorite.id, url);
                            result.correction_applied = true;
                            return result;
                        }
                        Err(e) => {
                            warn!("Failed to update favorite {}: {}", favorite.id, e);
                            blocked.insert(trigger);
                        }
                    }
                }
                Classification::Owned(trigger) => {
                    if result.owned.contains_key(&trigger) {
                        result.duplicates_found.push(favorite.id.clone());
                        self.delete_duplicate(&favorite.id, &trigger).await;
                    } else {
                        debug!("Favorite {} belongs to {}", favorite.id, trigger);
                        result.owned.insert(trigger, favorite.id.clone());
                    }
                }
                Classification::Foreign => {
                    debug!("Ignoring foreign favorite {} ('{}')", favorite.id, favorite.title);
                }
            }
        }

        for trigger in known {
            if result.owned.contains_key(trigger) || blocked.contains(trigger) {
                continue;
            }
            let title = trigger.favorite_title(self.marker);
            let url = self.callback.url_for(trigger);
            match self.api.create_favorite(&title, &url).await {
                Ok(()) => {
                    info!("Created favorite for {}", trigger);
                    result.created.push(trigger.clone());
                    result.correction_applied = true;
                }
                Err(e) => warn!("Failed to create favorite for {}: {}", trigger, e),
            }
        }

        result
    }

    async fn delete_duplicate(&self, id: &FavoriteId, trigger: &TriggerKind) {
        warn!("Favorite {} duplicates the one for {}, deleting it", id, trigger);
        match self.api.delete_favorite(id).await {
            Ok(()) => info!("Deleted duplicate favorite {}", id),
            Err(e) => warn!("Failed to delete duplicate favorite {}: {}", id, e),
        }
    }
}
