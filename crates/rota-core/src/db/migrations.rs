//! SQLite schema migrations for the assignment ledger.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL), (2, schema::MIGRATION_V2_SQL)];

/// Read `PRAGMA user_version` and convert it to a Rust `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the version value cannot be
/// represented as `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// What one [`migrate`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upgrade {
    pub from: u32,
    pub to: u32,
    /// Rows moved to `legacy_skipped` because they had no assignee.
    pub set_aside: usize,
}

impl Upgrade {
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.to > self.from
    }
}

/// Bring the ledger up to [`LATEST_SCHEMA_VERSION`].
///
/// Each pending step commits on its own together with `user_version` and
/// `store_meta.schema_version`, so a failed step leaves the ledger at the
/// last good version and the next open retries from there.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<Upgrade> {
    let from = current_schema_version(conn)?;
    let mut to = from;

    for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > from) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(version)],
        )?;
        tx.commit()?;
        to = version;
    }

    // Only an upgrade from the single-assignee layout can set rows aside.
    let set_aside = if from == 1 && to >= 2 {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM legacy_skipped", [], |row| row.get(0))?;
        usize::try_from(n).unwrap_or(0)
    } else {
        0
    };

    Ok(Upgrade { from, to, set_aside })
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use crate::db::{SqliteStore, schema};
    use crate::model::PersonId;
    use crate::store::{RecordQuery, RecordStore};
    use rusqlite::{Connection, params};

    fn v1_ledger() -> rusqlite::Result<Connection> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::MIGRATION_V1_SQL)?;
        conn.pragma_update(None, "user_version", 1_i64)?;
        Ok(conn)
    }

    fn sqlite_object_exists(
        conn: &Connection,
        object_type: &str,
        object_name: &str,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            )",
            params![object_type, object_name],
            |row| row.get(0),
        )
    }

    #[test]
    fn migrate_empty_db_to_latest() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        let upgrade = migrate(&mut conn)?;
        assert_eq!((upgrade.from, upgrade.to), (0, LATEST_SCHEMA_VERSION));
        assert_eq!(upgrade.set_aside, 0);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        assert!(sqlite_object_exists(&conn, "table", "assignments")?);
        assert!(sqlite_object_exists(&conn, "table", "legacy_skipped")?);
        assert!(sqlite_object_exists(&conn, "table", "assignment_assignees")?);
        assert!(sqlite_object_exists(&conn, "table", "assignment_completions")?);
        assert!(sqlite_object_exists(&conn, "table", "store_meta")?);

        for index in schema::REQUIRED_INDEXES {
            assert!(
                sqlite_object_exists(&conn, "index", index)?,
                "missing expected index {index}"
            );
        }

        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        assert!(migrate(&mut conn)?.changed());
        let again = migrate(&mut conn)?;
        assert!(!again.changed());
        assert_eq!(again.to, LATEST_SCHEMA_VERSION);

        let meta_rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM store_meta", [], |row| row.get(0))?;
        assert_eq!(meta_rows, 1);

        let schema_version: i64 = conn.query_row(
            "SELECT schema_version FROM store_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(schema_version, i64::from(LATEST_SCHEMA_VERSION));

        Ok(())
    }

    #[test]
    fn migrate_upgrades_from_v1_and_backfills_assignees() -> rusqlite::Result<()> {
        let mut conn = v1_ledger()?;
        conn.execute(
            "INSERT INTO assignments (
                cycle, chore_title, assignee, created_at_us, due_at_us, completed, completed_at_us
            ) VALUES
                ('2026-W40', 'Take out trash', 'ana', 1, 2, 1, 3),
                ('2026-W41', 'Wash dishes', ' bo ', 4, 5, 0, NULL)",
            [],
        )?;

        let upgrade = migrate(&mut conn)?;
        assert_eq!((upgrade.from, upgrade.to), (1, LATEST_SCHEMA_VERSION));

        let assignees: Vec<String> = conn
            .prepare("SELECT person_id FROM assignment_assignees ORDER BY record_id")?
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        assert_eq!(assignees, vec!["ana".to_string(), "bo".to_string()]);

        let confirmations: Vec<String> = conn
            .prepare("SELECT person_id FROM assignment_completions")?
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        assert_eq!(confirmations, vec!["ana".to_string()]);

        let legacy_column: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('assignments') WHERE name = 'assignee'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(legacy_column, 0);

        Ok(())
    }

    #[test]
    fn upgrade_sets_aside_rows_without_assignee() -> rusqlite::Result<()> {
        let mut conn = v1_ledger()?;
        conn.execute(
            "INSERT INTO assignments (cycle, chore_title, assignee, created_at_us) VALUES
                ('2026-W40', 'Take out trash', 'ana', 1),
                ('2026-W40', 'Clean bathroom', NULL, 2),
                ('2026-W41', 'Mop floors', '   ', 3)",
            [],
        )?;

        let upgrade = migrate(&mut conn)?;
        assert_eq!(upgrade.set_aside, 2);

        let skipped: Vec<(i64, String)> = conn
            .prepare("SELECT record_id, chore_title FROM legacy_skipped ORDER BY record_id")?
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        assert_eq!(
            skipped,
            vec![(2, "Clean bathroom".to_string()), (3, "Mop floors".to_string())]
        );

        let store = SqliteStore::from_connection(conn);
        let records = store.query(&RecordQuery::all()).expect("ledger stays readable");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chore_title, "Take out trash");
        assert_eq!(records[0].assignees, vec![PersonId::from("ana")]);
        Ok(())
    }
}
