use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventdesk_core::{CatalogItem, ItemConfig, ItemId, ItemKind};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, instrument, warn};

use crate::catalog::{ItemCatalog, ItemConfigStore};
use crate::cursor::CursorStore;
use crate::db::init_db;
use crate::error::{Result, SchedulerError};

fn lock<'a>(conn: &'a Mutex<Connection>, what: &str) -> Result<MutexGuard<'a, Connection>> {
    conn.lock()
        .map_err(|_| SchedulerError::Store(format!("{what} connection lock poisoned")))
}

/// SQLite-backed [`CursorStore`].
///
/// Wraps one connection in a `Mutex`; lease acquisition runs in an
/// IMMEDIATE transaction so it is also atomic against other processes
/// sharing the database file.
pub struct SqliteCursorStore {
    db: Mutex<Connection>,
}

impl SqliteCursorStore {
    /// Wrap an open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now_ms = Utc::now().timestamp_millis();
        let db = lock(&self.db, "cursor store")?;
        let value = db
            .query_row(
                "SELECT value FROM kv_store
                 WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                rusqlite::params![key, now_ms],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = lock(&self.db, "cursor store")?;
        db.execute(
            "INSERT INTO kv_store (key, value, expires_at, updated_at)
             VALUES (?1, ?2, NULL, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value, expires_at = NULL, updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let expires_ms = now_ms.saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);

        let mut db = lock(&self.db, "cursor store")?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Expired leases are cleared first so they can be re-acquired.
        tx.execute(
            "DELETE FROM kv_store
             WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
            rusqlite::params![key, now_ms],
        )?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO kv_store (key, value, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![key, value, expires_ms, now.to_rfc3339()],
        )?;
        tx.commit()?;
        debug!(acquired = inserted == 1, "set_if_absent");
        Ok(inserted == 1)
    }

    #[instrument(skip(self))]
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        let db = lock(&self.db, "cursor store")?;
        let n = db.execute(
            "DELETE FROM kv_store WHERE key = ?1 AND value = ?2",
            rusqlite::params![key, expected],
        )?;
        Ok(n > 0)
    }
}

/// SQLite-backed item catalog that also serves per-item report settings.
pub struct SqliteCatalog {
    db: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert or replace an item together with its report settings.
    #[instrument(skip(self, item, config), fields(item_id = %item.id))]
    pub fn upsert_item(&self, item: &CatalogItem, config: &ItemConfig) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let chair_emails = serde_json::to_string(&config.chair_emails)?;
        let db = lock(&self.db, "catalog")?;
        db.execute(
            "INSERT INTO report_items
             (id, kind, label, active, archived, publish_start, publish_end,
              frequency, chair_emails, label_override, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?11)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind, label = excluded.label,
                active = excluded.active, archived = excluded.archived,
                publish_start = excluded.publish_start, publish_end = excluded.publish_end,
                frequency = excluded.frequency, chair_emails = excluded.chair_emails,
                label_override = excluded.label_override, updated_at = excluded.updated_at",
            rusqlite::params![
                item.id.as_str(),
                item.kind.to_string(),
                item.label,
                item.active,
                item.archived,
                config.publish_start.map(|dt| dt.to_rfc3339()),
                config.publish_end.map(|dt| dt.to_rfc3339()),
                config.frequency,
                chair_emails,
                config.label,
                now,
            ],
        )?;
        debug!("report item upserted");
        Ok(())
    }
}

#[async_trait]
impl ItemCatalog for SqliteCatalog {
    fn source_name(&self) -> &str {
        "sqlite"
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>> {
        let db = lock(&self.db, "catalog")?;
        let mut stmt = db.prepare(
            "SELECT id, kind, label, active, archived
             FROM report_items ORDER BY kind, id",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?, // id
                    row.get::<_, String>(1)?, // kind
                    row.get::<_, String>(2)?, // label
                    row.get::<_, bool>(3)?,   // active
                    row.get::<_, bool>(4)?,   // archived
                ))
            })?
            .filter_map(|r| {
                let (id, kind, label, active, archived) = r.ok()?;
                let kind: ItemKind = match kind.parse() {
                    Ok(k) => k,
                    Err(e) => {
                        warn!(item_id = %id, "skipping catalog row: {e}");
                        return None;
                    }
                };
                Some(CatalogItem {
                    id: ItemId(id),
                    kind,
                    label,
                    active,
                    archived,
                })
            })
            .collect();
        Ok(items)
    }
}

#[async_trait]
impl ItemConfigStore for SqliteCatalog {
    async fn load_config(&self, id: &ItemId) -> Result<ItemConfig> {
        let db = lock(&self.db, "catalog")?;
        let row = db
            .query_row(
                "SELECT publish_start, publish_end, frequency, chair_emails, label_override
                 FROM report_items WHERE id = ?1",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((start, end, frequency, chair_emails, label)) = row else {
            return Ok(ItemConfig::default());
        };
        Ok(ItemConfig {
            publish_start: parse_ts(id, start)?,
            publish_end: parse_ts(id, end)?,
            frequency,
            chair_emails: serde_json::from_str(&chair_emails)?,
            label,
        })
    }
}

fn parse_ts(id: &ItemId, raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SchedulerError::Catalog(format!("item {id}: bad publish timestamp {s:?}: {e}")))
    })
    .transpose()
}
