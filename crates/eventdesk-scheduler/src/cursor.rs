use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use eventdesk_core::ItemId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Durable key/value store holding per-item cursors and leases.
///
/// Keys are scoped per item (`<itemId>:...`), so items never contend.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically store `value` unless a live (unexpired) value exists.
    /// Returns `true` when this call wrote the value.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key` only while it still holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool>;
}

pub fn window_end_key(id: &ItemId) -> String {
    format!("{id}:last_window_end_ms")
}

pub fn sent_at_key(id: &ItemId) -> String {
    format!("{id}:last_sent_at")
}

pub fn lease_key(id: &ItemId) -> String {
    format!("{id}:lease")
}

/// Persisted boundary of the last successfully reported period for one item.
///
/// An absent cursor means "never sent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub last_window_end_ms: Option<i64>,
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl Cursor {
    /// Read both cursor facts for `id`. Unparseable values are treated as absent.
    pub async fn load(store: &dyn CursorStore, id: &ItemId) -> Result<Self> {
        let end_raw = store.get(&window_end_key(id)).await?;
        let sent_raw = store.get(&sent_at_key(id)).await?;

        let last_window_end_ms = end_raw.and_then(|raw| match raw.trim().parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(item_id = %id, raw, "ignoring malformed last_window_end_ms");
                None
            }
        });
        let last_sent_at = sent_raw.and_then(|raw| match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(_) => {
                warn!(item_id = %id, raw, "ignoring malformed last_sent_at");
                None
            }
        });

        Ok(Self {
            last_window_end_ms,
            last_sent_at,
        })
    }

    /// Record a successful delivery of a window ending at `window_end_ms`.
    ///
    /// `last_window_end_ms` never moves backwards: an older end leaves the
    /// stored value in place. `last_sent_at` is always refreshed, and is
    /// written first so a failed commit never leaves the end advanced.
    pub async fn commit(
        store: &dyn CursorStore,
        id: &ItemId,
        window_end_ms: i64,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let current = Self::load(store, id).await?;
        store
            .set(
                &sent_at_key(id),
                &sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .await?;
        match current.last_window_end_ms {
            Some(existing) if existing > window_end_ms => {
                warn!(
                    item_id = %id,
                    existing,
                    window_end_ms,
                    "cursor already ahead of delivered window; keeping it"
                );
            }
            _ => {
                store
                    .set(&window_end_key(id), &window_end_ms.to_string())
                    .await?;
            }
        }
        debug!(item_id = %id, window_end_ms, "cursor committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCursorStore;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn absent_cursor_means_never_sent() {
        let store = MemoryCursorStore::new();
        let cursor = Cursor::load(&store, &"x".into()).await.unwrap();
        assert_eq!(cursor, Cursor::default());
    }

    #[tokio::test]
    async fn commit_then_load_round_trips() {
        let store = MemoryCursorStore::new();
        let id: ItemId = "x".into();
        let sent = at("2025-03-10T00:00:00Z");
        Cursor::commit(&store, &id, 1_740_787_200_000, sent).await.unwrap();

        assert_eq!(
            store.get("x:last_window_end_ms").await.unwrap().as_deref(),
            Some("1740787200000")
        );
        let cursor = Cursor::load(&store, &id).await.unwrap();
        assert_eq!(cursor.last_window_end_ms, Some(1_740_787_200_000));
        assert_eq!(cursor.last_sent_at, Some(sent));
    }

    #[tokio::test]
    async fn commit_never_moves_window_end_backwards() {
        let store = MemoryCursorStore::new();
        let id: ItemId = "x".into();
        Cursor::commit(&store, &id, 2_000, at("2025-03-10T00:00:00Z")).await.unwrap();
        Cursor::commit(&store, &id, 1_000, at("2025-03-11T00:00:00Z")).await.unwrap();

        let cursor = Cursor::load(&store, &id).await.unwrap();
        assert_eq!(cursor.last_window_end_ms, Some(2_000));
        assert_eq!(cursor.last_sent_at, Some(at("2025-03-11T00:00:00Z")));
    }

    /// Fails every write to a window-end key.
    struct EndWriteFails(MemoryCursorStore);

    #[async_trait]
    impl CursorStore for EndWriteFails {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if key.ends_with(":last_window_end_ms") {
                return Err(crate::error::SchedulerError::Store("disk full".into()));
            }
            self.0.set(key, value).await
        }

        async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
            self.0.set_if_absent(key, value, ttl).await
        }

        async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
            self.0.delete_if_equals(key, expected).await
        }
    }

    #[tokio::test]
    async fn failed_commit_leaves_window_end_in_place() {
        let store = EndWriteFails(MemoryCursorStore::new());
        let id: ItemId = "x".into();
        store.0.set("x:last_window_end_ms", "1000").await.unwrap();

        let err = Cursor::commit(&store, &id, 2_000, at("2025-03-10T00:00:00Z")).await;
        assert!(err.is_err());

        let cursor = Cursor::load(&store, &id).await.unwrap();
        assert_eq!(cursor.last_window_end_ms, Some(1_000));
    }

    #[tokio::test]
    async fn malformed_values_are_ignored() {
        let store = MemoryCursorStore::new();
        store.set("x:last_window_end_ms", "soon").await.unwrap();
        store.set("x:last_sent_at", "yesterday").await.unwrap();
        let cursor = Cursor::load(&store, &"x".into()).await.unwrap();
        assert_eq!(cursor, Cursor::default());
    }
}
