//! [`RecordStore`] backed by the SQLite ledger.
//!
//! Appends and read-modify-write updates each run inside an `IMMEDIATE`
//! transaction, so two handlers touching the same record are serialized by
//! SQLite's write lock rather than interleaving their reads and writes.

use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Result, RotaError};
use crate::model::{AssignmentRecord, NewAssignment, PersonId, RecordId};
use crate::store::{RecordMutation, RecordQuery, RecordStore, check_update};

const RECORD_COLUMNS: &str = "a.record_id, a.cycle, a.chore_title, a.created_at_us, a.due_at_us, \
     a.completed, a.completed_at_us, a.triggered_by";

/// Ledger stored in a migrated SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the ledger at `path`, creating and migrating it as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(super::open_ledger(path)?))
    }

    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(super::open_in_memory()?))
    }

    /// Wrap an already-migrated connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Total number of records in the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM assignments", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

impl RecordStore for SqliteStore {
    fn append(&mut self, record: NewAssignment) -> Result<RecordId> {
        record.validate()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO assignments (
                cycle, chore_title, created_at_us, due_at_us, completed, completed_at_us, triggered_by
             ) VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5)",
            params![
                record.cycle,
                record.chore_title,
                record.created_at_us,
                record.due_at_us,
                record.triggered_by.as_ref().map(PersonId::as_str),
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut insert = tx.prepare(
                "INSERT INTO assignment_assignees (record_id, position, person_id)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (position, person) in record.assignees.iter().enumerate() {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                insert.execute(params![id, position, person.as_str()])?;
            }
        }

        tx.commit()?;

        tracing::debug!(record = id, chore = %record.chore_title, "appended assignment");
        Ok(RecordId(id))
    }

    fn query(&self, query: &RecordQuery) -> Result<Vec<AssignmentRecord>> {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref cycle) = query.cycle {
            param_values.push(Box::new(cycle.clone()));
            conditions.push(format!("a.cycle = ?{}", param_values.len()));
        }

        if let Some((ref first, ref last)) = query.cycle_range {
            param_values.push(Box::new(first.clone()));
            let first_idx = param_values.len();
            param_values.push(Box::new(last.clone()));
            conditions.push(format!(
                "a.cycle BETWEEN ?{first_idx} AND ?{}",
                param_values.len()
            ));
        }

        if let Some(ref title) = query.chore_title {
            param_values.push(Box::new(title.clone()));
            conditions.push(format!("a.chore_title = ?{}", param_values.len()));
        }

        if let Some(ref person) = query.assignee {
            param_values.push(Box::new(person.as_str().to_string()));
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM assignment_assignees x \
                 WHERE x.record_id = a.record_id AND x.person_id = ?{})",
                param_values.len()
            ));
        }

        if let Some(completed) = query.completed {
            param_values.push(Box::new(completed));
            conditions.push(format!("a.completed = ?{}", param_values.len()));
        }

        if query.scheduled_only {
            conditions.push("a.triggered_by IS NULL".to_string());
        }

        if let Some(since) = query.created_since_us {
            param_values.push(Box::new(since));
            conditions.push(format!("a.created_at_us >= ?{}", param_values.len()));
        }

        if let Some((from, to)) = query.due_between_us {
            param_values.push(Box::new(from));
            let from_idx = param_values.len();
            param_values.push(Box::new(to));
            conditions.push(format!(
                "a.due_at_us BETWEEN ?{from_idx} AND ?{}",
                param_values.len()
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM assignments a{where_clause} \
             ORDER BY a.created_at_us ASC, a.record_id ASC"
        );

        // One read transaction so rows and their assignee sets agree.
        let tx = self.conn.unchecked_transaction()?;
        let rows: Vec<RecordRow> = {
            let mut stmt = tx.prepare(&sql)?;
            let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
            let rows = stmt
                .query_map(params_from_iter(params_ref), RecordRow::from_row)?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(hydrate(&tx, row)?);
        }
        tx.commit()?;
        Ok(records)
    }

    fn get(&self, id: RecordId) -> Result<Option<AssignmentRecord>> {
        let tx = self.conn.unchecked_transaction()?;
        let record = load_record(&tx, id)?;
        tx.commit()?;
        Ok(record)
    }

    fn update(
        &mut self,
        id: RecordId,
        mutation: &mut RecordMutation<'_>,
    ) -> Result<AssignmentRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let before = load_record(&tx, id)?.ok_or(RotaError::RecordNotFound(id))?;
        let mut after = before.clone();
        mutation(&mut after)?;
        check_update(&before, &after)?;

        {
            let mut confirm = tx.prepare(
                "INSERT OR IGNORE INTO assignment_completions (record_id, person_id)
                 VALUES (?1, ?2)",
            )?;
            for person in after.completed_by.difference(&before.completed_by) {
                confirm.execute(params![id.0, person.as_str()])?;
            }
        }

        tx.execute(
            "UPDATE assignments
             SET completed = ?1, completed_at_us = ?2, due_at_us = ?3
             WHERE record_id = ?4",
            params![after.completed, after.completed_at_us, after.due_at_us, id.0],
        )?;
        tx.commit()?;

        Ok(after)
    }
}

struct RecordRow {
    id: i64,
    cycle: String,
    chore_title: String,
    created_at_us: i64,
    due_at_us: Option<i64>,
    completed: bool,
    completed_at_us: Option<i64>,
    triggered_by: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            cycle: row.get(1)?,
            chore_title: row.get(2)?,
            created_at_us: row.get(3)?,
            due_at_us: row.get(4)?,
            completed: row.get(5)?,
            completed_at_us: row.get(6)?,
            triggered_by: row.get(7)?,
        })
    }
}

fn load_record(conn: &Connection, id: RecordId) -> Result<Option<AssignmentRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM assignments a WHERE a.record_id = ?1"),
            [id.0],
            RecordRow::from_row,
        )
        .optional()?;
    row.map(|row| hydrate(conn, row)).transpose()
}

fn hydrate(conn: &Connection, row: RecordRow) -> Result<AssignmentRecord> {
    let assignees: Vec<PersonId> = conn
        .prepare_cached(
            "SELECT person_id FROM assignment_assignees WHERE record_id = ?1 ORDER BY position",
        )?
        .query_map([row.id], |r| r.get::<_, String>(0))?
        .map(|id| id.map(PersonId::from))
        .collect::<rusqlite::Result<_>>()?;

    let completed_by: BTreeSet<PersonId> = conn
        .prepare_cached("SELECT person_id FROM assignment_completions WHERE record_id = ?1")?
        .query_map([row.id], |r| r.get::<_, String>(0))?
        .map(|id| id.map(PersonId::from))
        .collect::<rusqlite::Result<_>>()?;

    let record = AssignmentRecord {
        id: RecordId(row.id),
        cycle: row.cycle,
        chore_title: row.chore_title,
        assignees,
        created_at_us: row.created_at_us,
        due_at_us: row.due_at_us,
        completed_by,
        completed: row.completed,
        completed_at_us: row.completed_at_us,
        triggered_by: row.triggered_by.map(PersonId::from),
    };
    record.validate()?;
    Ok(record)
}
