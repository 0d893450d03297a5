//! Physical triggers on the device and the bridge's callback address

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::errors::BridgeError;

/// Identifier the device assigns to a doorbell button
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ButtonId(String);

impl ButtonId {
    /// Accepts non-empty ASCII alphanumerics plus `-` and `_`, so the id is
    /// safe inside state paths, favorite titles and callback URLs.
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(BridgeError::InvalidTrigger(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A device input that can fire actions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerKind {
    DoorbellButton(ButtonId),
    MotionSensor,
}

impl TriggerKind {
    /// Token used in favorite titles
    pub fn identifier(&self) -> &str {
        match self {
            TriggerKind::DoorbellButton(id) => id.as_str(),
            TriggerKind::MotionSensor => "Motion",
        }
    }

    /// State path prefix for this trigger's objects
    pub fn state_prefix(&self) -> String {
        match self {
            TriggerKind::DoorbellButton(id) => format!("Doorbell.{}", id),
            TriggerKind::MotionSensor => "Motion".to_string(),
        }
    }

    pub fn trigger_state(&self) -> String {
        format!("{}.trigger", self.state_prefix())
    }

    pub fn snapshot_state(&self) -> String {
        format!("{}.snapshot", self.state_prefix())
    }

    /// Title of the favorite the bridge owns for this trigger
    pub fn favorite_title(&self, marker: &str) -> String {
        match self {
            TriggerKind::DoorbellButton(id) => format!("{} {} Ring", marker, id),
            TriggerKind::MotionSensor => format!("{} Motion", marker),
        }
    }

    /// How long the trigger state stays true after a callback
    pub fn reset_delay(&self) -> Duration {
        match self {
            TriggerKind::DoorbellButton(_) => Duration::from_millis(2000),
            TriggerKind::MotionSensor => Duration::from_millis(2500),
        }
    }

    fn callback_path(&self) -> (&'static str, Option<&str>) {
        match self {
            TriggerKind::DoorbellButton(id) => ("/ring", Some(id.as_str())),
            TriggerKind::MotionSensor => ("/motion", None),
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::DoorbellButton(id) => write!(f, "doorbell {}", id),
            TriggerKind::MotionSensor => f.write_str("motion sensor"),
        }
    }
}

/// Address the device calls back on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAddress {
    /// Host name or IP literal, without brackets
    pub host: String,
    pub port: u16,
}

impl CallbackAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        Self { host, port }
    }

    /// Host as it appears in a URL; IPv6 literals are bracketed
    fn url_host(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(addr)) => format!("[{}]", addr),
            _ => self.host.clone(),
        }
    }

    /// Callback URL the device should invoke for `trigger`
    pub fn url_for(&self, trigger: &TriggerKind) -> String {
        let (path, query) = trigger.callback_path();
        let authority = format!("{}:{}", self.url_host(), self.port);
        match query {
            Some(query) => format!("http://{}{}?{}", authority, path, query),
            None => format!("http://{}{}", authority, path),
        }
    }

    /// Whether `target` is addressed to this host and port
    pub fn matches(&self, target: &str) -> bool {
        let Ok(url) = Url::parse(target) else {
            return false;
        };
        let host_matches = match (url.host(), self.host.parse::<IpAddr>()) {
            (Some(Host::Ipv4(host)), Ok(IpAddr::V4(ours))) => host == ours,
            (Some(Host::Ipv6(host)), Ok(IpAddr::V6(ours))) => host == ours,
            (Some(Host::Domain(host)), Err(_)) => host.eq_ignore_ascii_case(&self.host),
            _ => false,
        };
        host_matches && url.port_or_known_default() == Some(self.port)
    }
}

impl fmt::Display for CallbackAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.url_host(), self.port)
    }
}
