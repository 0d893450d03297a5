//! Heartbeat worker for periodic convergence cycles

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::sync::syncer::{SyncOptions, Syncer};

/// Heartbeat worker options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Time between cycles
    pub interval: Duration,

    /// Delay before the first cycle
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(180),
            initial_delay: Duration::ZERO,
        }
    }
}

/// Requests an out-of-band cycle. Requests made while one is already
/// pending collapse into it.
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    tx: mpsc::Sender<()>,
    reloads: Arc<watch::Sender<Option<SyncOptions>>>,
}

/// Receiving end of a [`SyncTrigger`]
#[derive(Debug)]
pub struct SyncRequests {
    requests: mpsc::Receiver<()>,
    reloads: watch::Receiver<Option<SyncOptions>>,
}

impl SyncTrigger {
    pub fn new() -> (Self, SyncRequests) {
        let (tx, requests) = mpsc::channel(1);
        let (reloads_tx, reloads) = watch::channel(None);
        let trigger = Self {
            tx,
            reloads: Arc::new(reloads_tx),
        };
        (trigger, SyncRequests { requests, reloads })
    }

    /// Returns false when a request was already pending
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }

    /// Hand reloaded settings to the next cycle and request it. Only the
    /// latest settings are kept when several reloads arrive in between.
    pub fn reload(&self, options: SyncOptions) -> bool {
        self.reloads.send_replace(Some(options));
        self.request()
    }
}

impl SyncRequests {
    /// Settings reloaded since the last call
    fn take_reload(&mut self) -> Option<SyncOptions> {
        if !self.reloads.has_changed().unwrap_or(false) {
            return None;
        }
        self.reloads.borrow_and_update().clone()
    }
}

/// Run the heartbeat worker
pub async fn run<S, F>(
    options: &Options,
    syncer: &Syncer,
    mut requests: SyncRequests,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Heartbeat worker starting...");

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Heartbeat worker shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        if let Some(reloaded) = requests.take_reload() {
            syncer.reconfigure(reloaded).await;
        }

        match syncer.trigger_sync().await {
            Ok(Some(_)) => debug!("Cycle completed"),
            Ok(None) => debug!("Cycle skipped"),
            Err(e) => error!("Cycle failed: {}", e),
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Heartbeat worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
            Some(()) = requests.requests.recv() => {
                info!("Cycle requested");
            }
        }
    }
}
