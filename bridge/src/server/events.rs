//! Ring and motion callbacks

use std::sync::Arc;

use http::Uri;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::BridgeError;
use crate::models::trigger::{ButtonId, TriggerKind};
use crate::server::state::ServerState;

/// Name of the snapshot blob under each trigger's snapshot object
pub const SNAPSHOT_BLOB: &str = "snapshot.jpg";

/// Trigger named by a callback request, `None` for unrelated paths.
///
/// `/motion` is the motion sensor; any path containing `ring` carries the
/// button id as its query string.
pub fn parse_callback(uri: &Uri) -> Result<Option<TriggerKind>, BridgeError> {
    if uri.path() == "/motion" && uri.query().is_none() {
        return Ok(Some(TriggerKind::MotionSensor));
    }
    if !uri.path().contains("ring") {
        return Ok(None);
    }
    let id = uri
        .query()
        .ok_or_else(|| BridgeError::InvalidTrigger(uri.path().to_string()))?;
    Ok(Some(TriggerKind::DoorbellButton(ButtonId::parse(id)?)))
}

/// Raise the trigger, relay a snapshot and lower the trigger after its
/// reset delay. Returns once the trigger is raised.
pub async fn dispatch(state: &Arc<ServerState>, trigger: TriggerKind) {
    info!("Received {} event", trigger);
    if !state.syncer.knows(&trigger).await {
        debug!("{} is not provisioned yet", trigger);
    }

    if let Err(e) = state
        .store
        .set_state(&trigger.trigger_state(), json!(true), true)
        .await
    {
        warn!("Failed to raise {}: {}", trigger.trigger_state(), e);
    }

    let snapshot_state = Arc::clone(state);
    let snapshot_trigger = trigger.clone();
    tokio::spawn(async move {
        if let Err(e) = relay_snapshot(&snapshot_state, &snapshot_trigger).await {
            warn!("Failed to relay snapshot for {}: {}", snapshot_trigger, e);
        }
    });

    let reset_state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(trigger.reset_delay()).await;
        if let Err(e) = reset_state
            .store
            .set_state(&trigger.trigger_state(), json!(false), true)
            .await
        {
            warn!("Failed to reset {}: {}", trigger.trigger_state(), e);
        }
    });
}

async fn relay_snapshot(state: &ServerState, trigger: &TriggerKind) -> Result<(), BridgeError> {
    let image = state.api.snapshot().await?;
    if let Some(file) = &state.snapshot_file {
        file.write_atomic(&image).await?;
    }
    state
        .store
        .write_blob(&trigger.snapshot_state(), SNAPSHOT_BLOB, &image)
        .await?;
    debug!("Stored {} byte snapshot for {}", image.len(), trigger);
    Ok(())
}
