//! Application state management

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::errors::BridgeError;
use crate::filesys::file::File;
use crate::http::api::DeviceApi;
use crate::http::client::DeviceClient;
use crate::store::memory::MemoryStore;
use crate::store::StateStore;
use crate::sync::syncer::{Syncer, CONNECTION_STATE};

/// Main application state
pub struct AppState {
    /// Device API
    pub api: Arc<dyn DeviceApi>,

    /// Host state store
    pub store: Arc<dyn StateStore>,

    /// Convergence driver
    pub syncer: Arc<Syncer>,

    /// Latest snapshot on disk
    pub snapshot_file: File,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, BridgeError> {
        info!("Initializing application state...");

        options.storage.setup().await?;

        let client = DeviceClient::new(
            options.device.credentials.clone(),
            options.device.request_timeout,
        )?;
        let store = MemoryStore::with_files_dir(options.storage.files_dir());

        Self::with_parts(
            options,
            Arc::new(client),
            Arc::new(store),
            options.storage.snapshot_file(),
        )
        .await
    }

    /// Assemble state around the given device and store
    pub async fn with_parts(
        options: &AppOptions,
        api: Arc<dyn DeviceApi>,
        store: Arc<dyn StateStore>,
        snapshot_file: File,
    ) -> Result<Self, BridgeError> {
        let syncer = Arc::new(Syncer::new(api.clone(), store.clone(), options.sync.clone()));
        syncer.init_objects().await?;

        Ok(Self {
            api,
            store,
            syncer,
            snapshot_file,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        info!("Shutting down application state...");
        if let Err(e) = self
            .store
            .set_state(CONNECTION_STATE, serde_json::json!(false), true)
            .await
        {
            warn!("Failed to clear connection state: {}", e);
        }
        Ok(())
    }
}
