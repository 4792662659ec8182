use log::info;
use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

use crate::error::StoreResult;

/// Schema history for the blob store. Append only; never edit a shipped step.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        ),
        M::up("ALTER TABLE blobs ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0;"),
    ])
}

/// Bring the schema up to date.
pub fn migrate(conn: &mut Connection) -> StoreResult<()> {
    migrations().to_latest(conn)?;
    info!("[Store] Schema up to date");
    Ok(())
}
