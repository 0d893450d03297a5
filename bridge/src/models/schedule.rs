//! Per-trigger schedule entries

use bha_models::{ScheduleWindow, WeekdayRange};
use serde_json::{Map, Value};

use crate::errors::BridgeError;
use crate::models::favorite::FavoriteId;
use crate::models::trigger::{ButtonId, TriggerKind};

/// Window during which an action fires
pub type ActiveWindow = ScheduleWindow;

/// Seconds-of-week bounds the device uses for "always".
const ALWAYS_FROM: &str = "79200";
const ALWAYS_TO: &str = "79199";

/// Full-week, always-on window
pub fn always_on() -> ActiveWindow {
    ActiveWindow {
        weekdays: Some(vec![WeekdayRange {
            from: ALWAYS_FROM.to_string(),
            to: ALWAYS_TO.to_string(),
        }]),
        extra: Map::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Http,
    Other(String),
}

impl ActionKind {
    fn parse(raw: &str) -> Self {
        match raw {
            "http" => ActionKind::Http,
            other => ActionKind::Other(other.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            ActionKind::Http => "http",
            ActionKind::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputAction {
    pub kind: ActionKind,
    pub param: String,
    pub enabled: bool,
    pub window: ActiveWindow,
    extra: Map<String, Value>,
}

impl OutputAction {
    /// Enabled, always-on HTTP action calling `favorite`
    pub fn http_hook(favorite: &FavoriteId) -> Self {
        Self {
            kind: ActionKind::Http,
            param: favorite.as_str().to_string(),
            enabled: true,
            window: always_on(),
            extra: Map::new(),
        }
    }

    /// Whether this action calls `favorite`. A disabled hook still counts;
    /// the user turned it off on purpose.
    pub fn calls(&self, favorite: &FavoriteId) -> bool {
        self.kind == ActionKind::Http && self.param == favorite.as_str()
    }
}

/// What a schedule entry is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleInput {
    Trigger(TriggerKind),
    Other { input: String, param: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub input: ScheduleInput,
    pub actions: Vec<OutputAction>,
    extra: Map<String, Value>,
}

impl ScheduleEntry {
    /// Entry with no actions, used when the device lists none for `trigger`
    pub fn empty(trigger: TriggerKind) -> Self {
        Self {
            input: ScheduleInput::Trigger(trigger),
            actions: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn trigger(&self) -> Option<&TriggerKind> {
        match &self.input {
            ScheduleInput::Trigger(trigger) => Some(trigger),
            ScheduleInput::Other { .. } => None,
        }
    }

    pub fn has_hook(&self, favorite: &FavoriteId) -> bool {
        self.actions.iter().any(|action| action.calls(favorite))
    }
}

impl TryFrom<bha_models::ScheduleOutput> for OutputAction {
    type Error = BridgeError;

    fn try_from(raw: bha_models::ScheduleOutput) -> Result<Self, Self::Error> {
        let enabled = match raw.enabled.as_str() {
            "1" => true,
            "0" | "" => false,
            other => {
                return Err(BridgeError::MalformedResponse(format!(
                    "action enabled flag '{}'",
                    other
                )))
            }
        };
        Ok(Self {
            kind: ActionKind::parse(&raw.event),
            param: raw.param,
            enabled,
            window: raw.schedule,
            extra: raw.extra,
        })
    }
}

impl From<&OutputAction> for bha_models::ScheduleOutput {
    fn from(action: &OutputAction) -> Self {
        Self {
            event: action.kind.as_str().to_string(),
            param: action.param.clone(),
            enabled: if action.enabled { "1" } else { "0" }.to_string(),
            schedule: action.window.clone(),
            extra: action.extra.clone(),
        }
    }
}

impl TryFrom<bha_models::ScheduleEntry> for ScheduleEntry {
    type Error = BridgeError;

    fn try_from(raw: bha_models::ScheduleEntry) -> Result<Self, Self::Error> {
        let input = match raw.input.as_str() {
            "doorbell" => {
                let id = ButtonId::parse(&raw.param).map_err(|_| {
                    BridgeError::MalformedResponse(format!("doorbell param '{}'", raw.param))
                })?;
                ScheduleInput::Trigger(TriggerKind::DoorbellButton(id))
            }
            "motion" => ScheduleInput::Trigger(TriggerKind::MotionSensor),
            other => ScheduleInput::Other {
                input: other.to_string(),
                param: raw.param.clone(),
            },
        };
        let actions = raw
            .output
            .into_iter()
            .map(OutputAction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            input,
            actions,
            extra: raw.extra,
        })
    }
}

impl From<&ScheduleEntry> for bha_models::ScheduleEntry {
    fn from(entry: &ScheduleEntry) -> Self {
        let (input, param) = match &entry.input {
            ScheduleInput::Trigger(TriggerKind::DoorbellButton(id)) => {
                ("doorbell".to_string(), id.as_str().to_string())
            }
            ScheduleInput::Trigger(TriggerKind::MotionSensor) => {
                ("motion".to_string(), String::new())
            }
            ScheduleInput::Other { input, param } => (input.clone(), param.clone()),
        };
        Self {
            input,
            param,
            output: entry.actions.iter().map(Into::into).collect(),
            extra: entry.extra.clone(),
        }
    }
}

/// Known triggers in creation order: doorbells as listed, motion last.
pub fn known_triggers(entries: &[ScheduleEntry]) -> Vec<TriggerKind> {
    let mut triggers: Vec<TriggerKind> = Vec::new();
    for entry in entries {
        if let Some(trigger @ TriggerKind::DoorbellButton(_)) = entry.trigger() {
            if !triggers.contains(trigger) {
                triggers.push(trigger.clone());
            }
        }
    }
    triggers.push(TriggerKind::MotionSensor);
    triggers
}
