use rusqlite::Connection;

use crate::error::Result;

/// Initialise the items schema in `conn`.
///
/// Creates the `items` table (idempotent) and an index on `next_due_at` so
/// the due query stays efficient as the collection grows. Timestamps are
/// stored as RFC 3339 TEXT in UTC, which compares correctly as strings.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS items (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            prompt           TEXT    NOT NULL,
            answer           TEXT    NOT NULL,
            example          TEXT,
            tag              TEXT,
            stage            INTEGER NOT NULL DEFAULT 1
                             CHECK (stage BETWEEN 1 AND 5),
            last_outcome     TEXT,               -- 'correct' | 'wrong' | NULL
            interval_mins    INTEGER NOT NULL CHECK (interval_mins > 0),
            created_at       TEXT    NOT NULL,   -- RFC 3339 UTC
            last_reviewed_at TEXT,
            next_due_at      TEXT    NOT NULL,
            review_count     INTEGER NOT NULL DEFAULT 0,
            correct_count    INTEGER NOT NULL DEFAULT 0,
            wrong_count      INTEGER NOT NULL DEFAULT 0
        ) STRICT;

        -- Due polling: SELECT … WHERE next_due_at <= ?
        CREATE INDEX IF NOT EXISTS idx_items_next_due ON items (next_due_at);
        ",
    )?;
    Ok(())
}
