use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Catalog identifier of a reportable item. Stable across catalog sources,
/// which is what the scheduler de-duplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which catalog an item was registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Banquet,
    Addon,
    Catalog,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Banquet => write!(f, "banquet"),
            ItemKind::Addon => write!(f, "addon"),
            ItemKind::Catalog => write!(f, "catalog"),
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "banquet" => Ok(ItemKind::Banquet),
            "addon" => Ok(ItemKind::Addon),
            "catalog" => Ok(ItemKind::Catalog),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

/// One record as yielded by a catalog provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub label: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub archived: bool,
}

impl CatalogItem {
    /// Archived or inactive items never reach window computation.
    pub fn is_reportable(&self) -> bool {
        self.active && !self.archived
    }
}

/// Per-item report settings, loaded from the config store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemConfig {
    pub publish_start: Option<DateTime<Utc>>,
    pub publish_end: Option<DateTime<Utc>>,
    /// Raw frequency label as entered by an admin; normalized by the scheduler.
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub chair_emails: Vec<String>,
    /// Overrides the catalog label in report subjects when set.
    pub label: Option<String>,
}

fn default_true() -> bool {
    true
}
