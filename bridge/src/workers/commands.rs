//! Command worker
//!
//! Turns user writes on the command states into device calls.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::errors::BridgeError;
use crate::http::api::DeviceApi;
use crate::store::{StateChange, StateStore};
use crate::sync::syncer::Syncer;

/// A device command requested through a state write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenDoor(String),
    Restart,
    LightOn,
}

impl Command {
    /// Command for a state path, if it is a command state
    pub fn from_path(path: &str) -> Option<Self> {
        match path.split('.').collect::<Vec<_>>().as_slice() {
            ["Relays", relay] if !relay.is_empty() => Some(Command::OpenDoor(relay.to_string())),
            ["Restart"] => Some(Command::Restart),
            ["Light"] => Some(Command::LightOn),
            _ => None,
        }
    }

    async fn execute(&self, api: &dyn DeviceApi) -> Result<(), BridgeError> {
        match self {
            Command::OpenDoor(relay) => api.open_door(relay).await,
            Command::Restart => api.restart().await,
            Command::LightOn => api.light_on().await,
        }
    }
}

/// Execute the command behind `change`, acknowledging the state on success.
/// Acknowledged writes and non-command states are ignored.
pub async fn handle_change(
    api: &dyn DeviceApi,
    store: &dyn StateStore,
    syncer: &Syncer,
    change: &StateChange,
) {
    if change.value.ack {
        return;
    }
    let Some(command) = Command::from_path(&change.path) else {
        return;
    };
    if !syncer.is_authorized() {
        warn!("Cannot run {:?}, device not authorized", command);
        return;
    }

    debug!("Running {:?}...", command);
    match (command.execute(api).await, &command) {
        (Ok(()), _) => {
            info!("{:?} succeeded", command);
            if let Err(e) = store
                .set_state(&change.path, change.value.val.clone(), true)
                .await
            {
                warn!("Failed to acknowledge {}: {}", change.path, e);
            }
        }
        (Err(BridgeError::UnexpectedStatus(204)), Command::OpenDoor(relay)) => {
            warn!("Could not trigger relay {} (insufficient permissions)", relay);
        }
        (Err(BridgeError::UnexpectedStatus(503)), Command::Restart) => {
            warn!("Device denied restart (device is busy)");
        }
        (Err(e), _) => warn!("{:?} failed: {}", command, e),
    }
}

/// Run the command worker
pub async fn run(
    api: &dyn DeviceApi,
    store: &dyn StateStore,
    syncer: &Syncer,
    mut changes: broadcast::Receiver<StateChange>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Command worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Command worker shutting down...");
                return;
            }
            change = changes.recv() => match change {
                Ok(change) => handle_change(api, store, syncer, &change).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Command worker skipped {} state changes", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("State store closed, command worker exiting...");
                    return;
                }
            },
        }
    }
}
