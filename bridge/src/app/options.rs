//! Application configuration options

use std::time::Duration;

use secrecy::ExposeSecret;

use crate::errors::BridgeError;
use crate::http::client::DeviceCredentials;
use crate::models::trigger::CallbackAddress;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::sync::syncer::SyncOptions;
use crate::workers::heartbeat;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub storage: StorageLayout,

    /// Device connection
    pub device: DeviceOptions,

    /// Callback server configuration
    pub server: ServerOptions,

    /// Convergence settings
    pub sync: SyncOptions,

    /// Heartbeat worker options
    pub heartbeat: heartbeat::Options,
}

impl AppOptions {
    /// Build options from settings. Fails unless the device and the callback
    /// address are configured.
    pub fn from_settings(settings: &Settings, storage: StorageLayout) -> Result<Self, BridgeError> {
        if !settings.device.is_configured() {
            return Err(BridgeError::Config(
                "device address, user and password must be set".to_string(),
            ));
        }
        if settings.callback.address.is_empty() {
            return Err(BridgeError::Config("callback address must be set".to_string()));
        }

        let callback = CallbackAddress::new(settings.callback.address.clone(), settings.callback.port);

        Ok(Self {
            lifecycle: LifecycleOptions::default(),
            storage,
            device: DeviceOptions {
                credentials: DeviceCredentials {
                    address: settings.device.address.clone(),
                    user: settings.device.user.clone(),
                    password: settings.device.password()?,
                },
                request_timeout: Duration::from_secs(settings.device.request_timeout_secs),
            },
            server: ServerOptions {
                host: callback.host.clone(),
                port: settings.callback.port,
                listen_all: settings.callback.listen_all,
            },
            sync: SyncOptions {
                marker: settings.marker(),
                callback,
                max_favorite_rounds: settings.sync.max_favorite_rounds,
                max_schedule_actions: settings.sync.max_schedule_actions,
            },
            heartbeat: heartbeat::Options {
                interval: Duration::from_secs(settings.sync.heartbeat_interval_secs),
                initial_delay: Duration::from_secs(settings.sync.initial_delay_secs),
            },
        })
    }
}

impl AppOptions {
    /// Whether moving to `other` needs a new listener or device client.
    /// Everything else is applied to the running bridge.
    pub fn requires_restart(&self, other: &AppOptions) -> bool {
        self.server != other.server
            || !self.device.same_connection(&other.device)
            || self.heartbeat != other.heartbeat
    }
}

/// Lifecycle options for the bridge
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Device connection options
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub credentials: DeviceCredentials,

    /// Bound on every device request
    pub request_timeout: Duration,
}

impl DeviceOptions {
    fn same_connection(&self, other: &DeviceOptions) -> bool {
        self.credentials.address == other.credentials.address
            && self.credentials.user == other.credentials.user
            && self.credentials.password.expose_secret() == other.credentials.password.expose_secret()
            && self.request_timeout == other.request_timeout
    }
}

/// Callback server options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Bind every interface and accept any source
    pub listen_all: bool,
}

impl ServerOptions {
    pub fn bind_host(&self) -> &str {
        if self.listen_all {
            "0.0.0.0"
        } else {
            &self.host
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            listen_all: false,
        }
    }
}
