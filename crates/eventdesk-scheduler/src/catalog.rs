use async_trait::async_trait;
use eventdesk_core::{CatalogItem, ItemConfig, ItemId};

use crate::error::Result;

/// A source of reportable items (banquets, add-ons, catalog products).
///
/// The scheduler may hold several sources; an id yielded by more than one
/// is processed once, from the first source that listed it.
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    /// Short name used in logs.
    fn source_name(&self) -> &str;

    async fn list_items(&self) -> Result<Vec<CatalogItem>>;
}

/// Per-item report settings: publish window, frequency label, recipients.
#[async_trait]
pub trait ItemConfigStore: Send + Sync {
    /// Items with no stored settings get `ItemConfig::default()`.
    async fn load_config(&self, id: &ItemId) -> Result<ItemConfig>;
}
