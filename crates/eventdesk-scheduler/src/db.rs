use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the cursor/lease key-value table and the report item catalog.
/// Idempotent; safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            key         TEXT    NOT NULL PRIMARY KEY,
            value       TEXT    NOT NULL,
            expires_at  INTEGER,            -- epoch ms, NULL means no expiry
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS report_items (
            id             TEXT    NOT NULL PRIMARY KEY,
            kind           TEXT    NOT NULL,   -- banquet | addon | catalog
            label          TEXT    NOT NULL,
            active         INTEGER NOT NULL DEFAULT 1,
            archived       INTEGER NOT NULL DEFAULT 0,
            publish_start  TEXT,               -- ISO-8601 or NULL
            publish_end    TEXT,               -- ISO-8601 or NULL
            frequency      TEXT    NOT NULL DEFAULT '',
            chair_emails   TEXT    NOT NULL DEFAULT '[]',  -- JSON array
            label_override TEXT,
            created_at     TEXT    NOT NULL,
            updated_at     TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_report_items_kind ON report_items (kind, id);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('kv_store', 'report_items')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 2);
    }
}
