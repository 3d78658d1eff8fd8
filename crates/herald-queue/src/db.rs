use rusqlite::Connection;

use crate::error::Result;

/// Initialise the queue schema in `conn`.
///
/// A published message is copied into one `queue_deliveries` row per
/// subscription bound to its topic. Deleting the delivery row is the ack; the
/// message row goes once no delivery references it.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS queue_subscriptions (
            name        TEXT    NOT NULL PRIMARY KEY,
            topic       TEXT    NOT NULL,
            created_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS queue_messages (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            topic         TEXT    NOT NULL,
            payload       BLOB    NOT NULL,
            published_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS queue_deliveries (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            subscription  TEXT    NOT NULL,
            message_id    INTEGER NOT NULL,
            attempts      INTEGER NOT NULL DEFAULT 0,
            lease_until   INTEGER,            -- unix millis, NULL when never claimed
            UNIQUE (subscription, message_id)
        ) STRICT;

        -- Claim query: WHERE subscription = ? AND (lease_until IS NULL OR lease_until <= ?)
        CREATE INDEX IF NOT EXISTS idx_deliveries_claim
            ON queue_deliveries (subscription, lease_until);
        ",
    )?;
    Ok(())
}
