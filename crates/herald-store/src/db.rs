use rusqlite::Connection;

use crate::error::Result;

/// Initialise the document store schema in `conn`.
///
/// Documents are stored as JSON text keyed by their full path. The
/// `collection` column (the path minus the last segment) is indexed so a
/// query only scans the children of one collection.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            path        TEXT NOT NULL PRIMARY KEY,
            collection  TEXT NOT NULL,
            body        TEXT NOT NULL,   -- JSON object
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection);
        ",
    )?;
    Ok(())
}
