use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, Utc};
use eventdesk_core::EventdeskConfig;
use eventdesk_scheduler::{Scheduler, SchedulerMode, SqliteCatalog, SqliteCursorStore, WebhookSender};
use tracing::info;

use crate::open_db;

/// One cron-triggered pass. Prints the run summary as JSON and fails the
/// process when any item errored, so cron mail picks it up.
pub async fn run_pass(
    config: &EventdeskConfig,
    now: Option<DateTime<Utc>>,
    force_replay: bool,
) -> anyhow::Result<()> {
    let mode = if force_replay {
        SchedulerMode::ForceReplay
    } else {
        SchedulerMode::Normal
    };

    // each store gets its own connection
    let catalog = Arc::new(SqliteCatalog::new(open_db(config)?)?);
    let cursors = Arc::new(SqliteCursorStore::new(open_db(config)?)?);

    let mut builder = Scheduler::builder()
        .with_config(&config.scheduler)
        .catalog(catalog.clone())
        .config_store(catalog)
        .cursor_store(cursors);
    if let Some(sender) = WebhookSender::from_config(&config.delivery)? {
        builder = builder.sender(Arc::new(sender));
    }
    // No webhook configured means no sender: refuse to start.
    let scheduler = builder.build()?;

    let summary = match now {
        Some(now) => scheduler.run(now, mode).await,
        None => scheduler.run_now(mode).await,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.errors > 0 {
        bail!("report pass finished with {} error(s)", summary.errors);
    }
    info!(sent = summary.sent, skipped = summary.skipped, "report pass clean");
    Ok(())
}
