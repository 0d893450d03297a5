//! Main application run loop

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::BridgeError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::heartbeat::SyncRequests;
use crate::workers::{commands, heartbeat};

/// Run the bridge until `shutdown_signal` resolves. Every request on
/// `sync_requests` starts an extra cycle.
pub async fn run(
    bridge_version: String,
    options: AppOptions,
    sync_requests: SyncRequests,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BridgeError> {
    info!("Initializing doorbridge {}...", bridge_version);

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let app_state = match AppState::init(&options).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to start bridge: {}", e);
            return Err(e);
        }
    };
    shutdown_manager.with_app_state(app_state.clone())?;

    if let Err(e) = init(
        &options,
        app_state,
        sync_requests,
        &shutdown_tx,
        &mut shutdown_manager,
    )
    .await
    {
        error!("Failed to start bridge: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    app_state: Arc<AppState>,
    sync_requests: SyncRequests,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), BridgeError> {
    // Listener first, so the device can call back as soon as favorites exist
    init_callback_server(
        options,
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await?;

    init_commands_worker(app_state.clone(), shutdown_manager, shutdown_tx.subscribe())?;

    init_heartbeat_worker(
        options.heartbeat.clone(),
        app_state,
        sync_requests,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
}

fn init_heartbeat_worker(
    options: heartbeat::Options,
    app_state: Arc<AppState>,
    sync_requests: SyncRequests,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BridgeError> {
    info!("Initializing heartbeat worker...");

    let syncer = app_state.syncer.clone();

    let heartbeat_handle = tokio::spawn(async move {
        heartbeat::run(
            &options,
            syncer.as_ref(),
            sync_requests,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_heartbeat_worker_handle(heartbeat_handle)
}

fn init_commands_worker(
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BridgeError> {
    info!("Initializing command worker...");

    let changes = app_state.store.subscribe();

    let commands_handle = tokio::spawn(async move {
        commands::run(
            app_state.api.as_ref(),
            app_state.store.as_ref(),
            app_state.syncer.as_ref(),
            changes,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_commands_worker_handle(commands_handle)
}

async fn init_callback_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BridgeError> {
    info!("Initializing callback server...");

    let server_state = ServerState::new(
        app_state.store.clone(),
        app_state.api.clone(),
        app_state.syncer.clone(),
        options.device.credentials.address.clone(),
        options.server.listen_all,
    )
    .with_snapshot_file(app_state.snapshot_file.clone());

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_callback_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    callback_server_handle: Option<JoinHandle<Result<(), BridgeError>>>,
    heartbeat_worker_handle: Option<JoinHandle<()>>,
    commands_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            callback_server_handle: None,
            heartbeat_worker_handle: None,
            commands_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), BridgeError> {
        if self.app_state.is_some() {
            return Err(BridgeError::Shutdown("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_heartbeat_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), BridgeError> {
        if self.heartbeat_worker_handle.is_some() {
            return Err(BridgeError::Shutdown("heartbeat_handle already set".to_string()));
        }
        self.heartbeat_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_commands_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), BridgeError> {
        if self.commands_worker_handle.is_some() {
            return Err(BridgeError::Shutdown("commands_handle already set".to_string()));
        }
        self.commands_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_callback_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), BridgeError>>,
    ) -> Result<(), BridgeError> {
        if self.callback_server_handle.is_some() {
            return Err(BridgeError::Shutdown("server_handle already set".to_string()));
        }
        self.callback_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), BridgeError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), BridgeError> {
        info!("Shutting down doorbridge...");

        // 1. Workers; an in-flight cycle finishes first
        let workers: Vec<JoinHandle<()>> = [
            self.heartbeat_worker_handle.take(),
            self.commands_worker_handle.take(),
        ]
        .into_iter()
        .flatten()
        .collect();
        for result in join_all(workers).await {
            result.map_err(|e| BridgeError::Shutdown(e.to_string()))?;
        }

        // 2. Callback server
        if let Some(handle) = self.callback_server_handle.take() {
            handle.await.map_err(|e| BridgeError::Shutdown(e.to_string()))??;
        }

        // 3. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
