//! SQLite ledger storage.
//!
//! On-disk ledgers run with `journal_mode = WAL` and a busy timeout so a
//! reminder sweep can read while an allocation run appends. Foreign keys
//! are always on to keep assignee and confirmation rows attached to their
//! record.

pub mod import;
pub mod migrations;
pub mod records;
pub mod schema;

pub use records::SqliteStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used for ledger DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the ledger at `path` and bring its schema up to date.
///
/// # Errors
///
/// Returns an error if the directory, the database, or a migration fails.
pub fn open_ledger(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create ledger directory {}", parent.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("open ledger database {}", path.display()))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    prepare(conn).with_context(|| format!("prepare ledger {}", path.display()))
}

/// In-memory ledger with the full schema, for tests and simulations.
///
/// # Errors
///
/// Returns an error if migrating the fresh database fails.
pub fn open_in_memory() -> Result<Connection> {
    prepare(Connection::open_in_memory().context("open in-memory ledger")?)
}

fn prepare(mut conn: Connection) -> Result<Connection> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

    let upgrade = migrations::migrate(&mut conn).context("apply ledger migrations")?;
    if upgrade.changed() {
        tracing::info!(from = upgrade.from, to = upgrade.to, "ledger schema upgraded");
    }
    if upgrade.set_aside > 0 {
        tracing::warn!(
            rows = upgrade.set_aside,
            "legacy records without an assignee were moved to legacy_skipped"
        );
    }
    Ok(conn)
}
