use eventdesk_core::{CatalogItem, EventdeskConfig, ItemConfig, ItemId};
use eventdesk_scheduler::{normalize_frequency, Cursor, SqliteCatalog, SqliteCursorStore};
use tracing::info;

use crate::{open_db, UpsertItem};

pub async fn show_cursor(config: &EventdeskConfig, item_id: &str) -> anyhow::Result<()> {
    let store = SqliteCursorStore::new(open_db(config)?)?;
    let id = ItemId::from(item_id);
    let cursor = Cursor::load(&store, &id).await?;
    println!("{}", serde_json::to_string_pretty(&cursor)?);
    Ok(())
}

pub fn upsert(config: &EventdeskConfig, args: UpsertItem) -> anyhow::Result<()> {
    let catalog = SqliteCatalog::new(open_db(config)?)?;
    let item = CatalogItem {
        id: ItemId(args.id),
        kind: args.kind,
        label: args.label,
        active: !args.inactive,
        archived: args.archived,
    };
    let item_config = ItemConfig {
        publish_start: args.publish_start,
        publish_end: args.publish_end,
        frequency: args.frequency,
        chair_emails: args.chair_emails,
        label: args.report_label,
    };
    catalog.upsert_item(&item, &item_config)?;
    info!(
        item_id = %item.id,
        kind = %item.kind,
        frequency = normalize_frequency(&item_config.frequency).as_str(),
        "item saved"
    );
    Ok(())
}
