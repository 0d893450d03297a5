//! Favorites stored on the device

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::trigger::{ButtonId, TriggerKind};

/// Key the device assigns to a favorite
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteId(pub String);

impl FavoriteId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FavoriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FavoriteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An HTTP favorite as listed by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFavorite {
    pub id: FavoriteId,
    pub title: String,
    pub target_url: String,
}

impl From<(String, bha_models::FavoriteEntry)> for RemoteFavorite {
    fn from((id, entry): (String, bha_models::FavoriteEntry)) -> Self {
        Self {
            id: FavoriteId(id),
            title: entry.title,
            target_url: entry.value,
        }
    }
}

/// Parses a favorite title of the form `<marker> <id> [Ring]` or
/// `<marker> Motion`.
///
/// Tokens are separated by exactly one space. Anything else, including a
/// missing marker, returns `None` and the favorite is treated as foreign.
pub fn parse_title(title: &str, marker: &str) -> Option<TriggerKind> {
    if marker.is_empty() {
        return None;
    }
    let rest = title.strip_prefix(marker)?.strip_prefix(' ')?;
    let tokens: Vec<&str> = rest.split(' ').collect();
    match tokens.as_slice() {
        ["Motion"] => Some(TriggerKind::MotionSensor),
        [id] | [id, "Ring"] => ButtonId::parse(id).ok().map(TriggerKind::DoorbellButton),
        _ => None,
    }
}
