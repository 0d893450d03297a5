//! Settings file management

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::BridgeError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::storage::secret::deobfuscate;

/// Bridge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Enables daily-rolling log files in this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Instance name
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Overrides the marker derived from `namespace`
    #[serde(default)]
    pub favorite_marker: Option<String>,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub callback: CallbackSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

fn default_namespace() -> String {
    "doorbird.0".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            namespace: default_namespace(),
            favorite_marker: None,
            device: DeviceSettings::default(),
            callback: CallbackSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Settings {
    /// Title prefix of every favorite this instance owns
    pub fn marker(&self) -> String {
        match &self.favorite_marker {
            Some(marker) => marker.clone(),
            None => format!("ioBroker {}", self.namespace),
        }
    }
}

/// Device connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub user: String,

    /// Plain, or obfuscated when `password_key` is set
    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub password_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    5
}

impl DeviceSettings {
    /// Address, user and password are all set
    pub fn is_configured(&self) -> bool {
        !self.address.is_empty() && !self.user.is_empty() && !self.password.is_empty()
    }

    /// Plain password
    pub fn password(&self) -> Result<SecretString, BridgeError> {
        match &self.password_key {
            Some(key) => deobfuscate(key, &self.password),
            None => Ok(SecretString::from(self.password.clone())),
        }
    }
}

/// Callback listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackSettings {
    /// Address the device calls back on
    #[serde(default)]
    pub address: String,

    #[serde(default = "default_callback_port")]
    pub port: u16,

    /// Bind every interface and accept callbacks from any source
    #[serde(default)]
    pub listen_all: bool,
}

fn default_callback_port() -> u16 {
    8081
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: default_callback_port(),
            listen_all: false,
        }
    }
}

/// Convergence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default)]
    pub initial_delay_secs: u64,

    #[serde(default = "default_max_favorite_rounds")]
    pub max_favorite_rounds: u32,

    #[serde(default = "default_max_schedule_actions")]
    pub max_schedule_actions: usize,
}

fn default_heartbeat_interval() -> u64 {
    180
}

fn default_max_favorite_rounds() -> u32 {
    5
}

fn default_max_schedule_actions() -> usize {
    20
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            initial_delay_secs: 0,
            max_favorite_rounds: default_max_favorite_rounds(),
            max_schedule_actions: default_max_schedule_actions(),
        }
    }
}

/// Load settings, falling back to defaults when the file does not exist
pub async fn load_settings(file: &File) -> Result<Settings, BridgeError> {
    if !file.exists().await {
        return Ok(Settings::default());
    }
    file.read_json().await
}
