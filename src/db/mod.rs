pub mod migrations;
pub mod repository;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::config::settings::StorageConfig;

/// Open a connection with the pragmas every caller relies on.
///
/// The busy timeout matters for the mark ledger: concurrent writers wait on
/// the database lock instead of failing with `SQLITE_BUSY`.
pub fn open(path: &Path, storage: &StorageConfig) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Opening database at {:?}", path))?;
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))?;

    // WAL lets readers proceed while a mark is being written
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}
