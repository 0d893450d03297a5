//! BHA API wire models
//!
//! These mirror the JSON the device sends and accepts. Fields the bridge
//! does not interpret are kept in `extra` maps so that an entry read from
//! the device can be written back without losing anything.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of `favorites.cgi` without an action
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FavoritesListing {
    /// HTTP favorites in the order the device listed them
    #[serde(default, deserialize_with = "ordered_entries")]
    pub http: Vec<(String, FavoriteEntry)>,
}

/// A single stored favorite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub title: String,
    pub value: String,
}

/// One element of the `schedule.cgi` listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Input kind, e.g. `doorbell`, `motion`, `rfid`
    pub input: String,

    /// Input parameter; the button id for doorbell inputs
    #[serde(default)]
    pub param: String,

    #[serde(default)]
    pub output: Vec<ScheduleOutput>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An action fired by a schedule entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutput {
    /// Action kind, e.g. `http`, `notify`, `relay`
    pub event: String,

    /// Action parameter; the favorite id for `http` actions
    #[serde(default)]
    pub param: String,

    /// `"1"` when enabled
    #[serde(default)]
    pub enabled: String,

    #[serde(default)]
    pub schedule: ScheduleWindow,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Time window during which an action is active
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<Vec<WeekdayRange>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Seconds-of-week range; `from > to` wraps around the week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayRange {
    pub from: String,
    pub to: String,
}

/// Response of `info.cgi`
#[derive(Debug, Clone, Deserialize)]
pub struct InfoDocument {
    #[serde(rename = "BHA")]
    pub bha: InfoBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfoBody {
    #[serde(rename = "RETURNCODE", default)]
    pub return_code: String,

    #[serde(rename = "VERSION", default)]
    pub version: Vec<InfoVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfoVersion {
    #[serde(rename = "FIRMWARE", default)]
    pub firmware: Option<String>,

    #[serde(rename = "BUILD_NUMBER", default)]
    pub build_number: Option<String>,

    #[serde(rename = "DEVICE-TYPE", default)]
    pub device_type: Option<String>,

    #[serde(rename = "RELAYS", default)]
    pub relays: Vec<String>,
}

fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, FavoriteEntry)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, FavoriteEntry)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a map of favorite id to favorite, or an empty list")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, entry)) = map.next_entry::<String, FavoriteEntry>()? {
                entries.push((id, entry));
            }
            Ok(entries)
        }

        // A group without favorites may come back as `[]`
        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            match seq.next_element::<IgnoredAny>()? {
                None => Ok(Vec::new()),
                Some(_) => Err(de::Error::invalid_type(de::Unexpected::Seq, &self)),
            }
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(EntriesVisitor)
}
