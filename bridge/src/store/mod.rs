//! Home-automation state store contract
//!
//! The host platform owns state persistence. The bridge only needs to
//! write and read state values, watch for writes made by others, declare
//! the objects it publishes, and store snapshot images.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::errors::BridgeError;

/// A stored state value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValue {
    pub val: Value,

    /// `true` when written by the bridge, `false` for commands from users
    pub ack: bool,

    pub ts: DateTime<Utc>,
}

/// Notification for every state write
#[derive(Debug, Clone)]
pub struct StateChange {
    pub path: String,
    pub value: StateValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Device,
    Channel,
    State,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    String,
}

/// Declaration of a typed state point or container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub kind: ObjectKind,
    pub name: String,
    pub role: Option<String>,
    pub value_type: Option<ValueType>,
    pub read: bool,
    pub write: bool,
    pub desc: Option<String>,
}

impl ObjectSpec {
    fn container(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            role: None,
            value_type: None,
            read: true,
            write: false,
            desc: None,
        }
    }

    pub fn device(name: impl Into<String>) -> Self {
        Self::container(ObjectKind::Device, name)
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self::container(ObjectKind::Channel, name)
    }

    /// Storage slot for binary files
    pub fn meta(name: impl Into<String>) -> Self {
        Self::container(ObjectKind::Meta, name)
    }

    /// Read-only boolean
    pub fn indicator(name: impl Into<String>) -> Self {
        Self {
            role: Some("indicator".to_string()),
            value_type: Some(ValueType::Boolean),
            ..Self::container(ObjectKind::State, name)
        }
    }

    /// Write-only boolean command
    pub fn button(name: impl Into<String>) -> Self {
        Self {
            role: Some("button".to_string()),
            value_type: Some(ValueType::Boolean),
            read: false,
            write: true,
            ..Self::container(ObjectKind::State, name)
        }
    }

    /// Read-only text
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            role: Some("text".to_string()),
            value_type: Some(ValueType::String),
            ..Self::container(ObjectKind::State, name)
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Write a state value and notify subscribers
    async fn set_state(&self, path: &str, val: Value, ack: bool) -> Result<(), BridgeError>;

    async fn get_state(&self, path: &str) -> Result<Option<StateValue>, BridgeError>;

    /// Receive every subsequent state write
    fn subscribe(&self) -> broadcast::Receiver<StateChange>;

    /// Create the object, or update it when `spec` differs. Returns whether
    /// anything was written.
    async fn ensure_object(&self, path: &str, spec: ObjectSpec) -> Result<bool, BridgeError>;

    /// Store a binary file under a meta object
    async fn write_blob(&self, path: &str, name: &str, data: &[u8]) -> Result<(), BridgeError>;
}
