//! The assignment ledger interface and an in-memory implementation.
//!
//! The SQLite-backed store lives in [`crate::db`]. Both implementations
//! enforce the same rules on every write:
//! - a record must have at least one assignee
//! - `completed_by` only grows and stays within `assignees`
//! - `completed` is set exactly when every assignee has confirmed
//! - assignees, chore, cycle and creation time never change after append

use std::collections::BTreeMap;

use crate::error::{Result, RotaError};
use crate::model::{AssignmentRecord, NewAssignment, PersonId, RecordId};

/// Filter criteria for ledger queries. Set fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub cycle: Option<String>,
    /// Inclusive range of cycle keys, compared as text.
    pub cycle_range: Option<(String, String)>,
    pub chore_title: Option<String>,
    /// Record must list this person among its assignees.
    pub assignee: Option<PersonId>,
    pub completed: Option<bool>,
    /// Only records created by the periodic run (no ad-hoc triggers).
    pub scheduled_only: bool,
    pub created_since_us: Option<i64>,
    /// Inclusive `[from, to]` range on `due_at_us`.
    pub due_between_us: Option<(i64, i64)>,
}

impl RecordQuery {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_cycle(cycle: impl Into<String>) -> Self {
        Self {
            cycle: Some(cycle.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cycles_between(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.cycle_range = Some((first.into(), last.into()));
        self
    }

    #[must_use]
    pub fn assignee(mut self, person: PersonId) -> Self {
        self.assignee = Some(person);
        self
    }

    #[must_use]
    pub fn chore(mut self, title: impl Into<String>) -> Self {
        self.chore_title = Some(title.into());
        self
    }

    #[must_use]
    pub const fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    #[must_use]
    pub const fn scheduled_only(mut self) -> Self {
        self.scheduled_only = true;
        self
    }

    #[must_use]
    pub const fn created_since(mut self, since_us: i64) -> Self {
        self.created_since_us = Some(since_us);
        self
    }

    #[must_use]
    pub const fn due_between(mut self, from_us: i64, to_us: i64) -> Self {
        self.due_between_us = Some((from_us, to_us));
        self
    }

    #[must_use]
    pub fn matches(&self, record: &AssignmentRecord) -> bool {
        self.cycle.as_ref().is_none_or(|c| &record.cycle == c)
            && self
                .cycle_range
                .as_ref()
                .is_none_or(|(first, last)| (first..=last).contains(&&record.cycle))
            && self
                .chore_title
                .as_ref()
                .is_none_or(|t| &record.chore_title == t)
            && self.assignee.as_ref().is_none_or(|p| record.is_assigned(p))
            && self.completed.is_none_or(|c| record.completed == c)
            && (!self.scheduled_only || !record.is_adhoc())
            && self
                .created_since_us
                .is_none_or(|since| record.created_at_us >= since)
            && self.due_between_us.is_none_or(|(from, to)| {
                record.due_at_us.is_some_and(|due| due >= from && due <= to)
            })
    }
}

/// Read-modify-write callback applied by [`RecordStore::update`].
pub type RecordMutation<'a> = dyn FnMut(&mut AssignmentRecord) -> Result<()> + 'a;

/// Append/query/update access to the fairness ledger.
///
/// Records are never deleted. Implementations must apply each `append` and
/// each `update` atomically with respect to other mutations.
pub trait RecordStore {
    /// Persist a new record and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is invalid or the write fails.
    fn append(&mut self, record: NewAssignment) -> Result<RecordId>;

    /// Records matching `query`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn query(&self, query: &RecordQuery) -> Result<Vec<AssignmentRecord>>;

    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, id: RecordId) -> Result<Option<AssignmentRecord>>;

    /// Load a record, apply `mutation`, check invariants, and write it back
    /// as one atomic step.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::RecordNotFound`] for unknown ids, whatever error
    /// `mutation` returns, or [`RotaError::InvalidRecord`] when the mutated
    /// record breaks a ledger rule. Nothing is written on error.
    fn update(&mut self, id: RecordId, mutation: &mut RecordMutation<'_>)
    -> Result<AssignmentRecord>;

    /// Append several records, returning them as persisted.
    ///
    /// # Errors
    ///
    /// Returns the first append or read failure.
    fn append_all(&mut self, records: Vec<NewAssignment>) -> Result<Vec<AssignmentRecord>> {
        let mut persisted = Vec::with_capacity(records.len());
        for record in records {
            let id = self.append(record)?;
            let stored = self.get(id)?.ok_or(RotaError::RecordNotFound(id))?;
            persisted.push(stored);
        }
        Ok(persisted)
    }
}

/// Verify that `after` is a legal successor of `before`.
///
/// # Errors
///
/// Returns [`RotaError::InvalidRecord`] describing the violation.
pub fn check_update(before: &AssignmentRecord, after: &AssignmentRecord) -> Result<()> {
    let frozen_changed = before.id != after.id
        || before.cycle != after.cycle
        || before.chore_title != after.chore_title
        || before.assignees != after.assignees
        || before.created_at_us != after.created_at_us
        || before.triggered_by != after.triggered_by;
    if frozen_changed {
        return Err(RotaError::InvalidRecord(format!(
            "{} identity fields are immutable",
            before.id
        )));
    }
    if !before.completed_by.is_subset(&after.completed_by) {
        return Err(RotaError::InvalidRecord(format!(
            "{} confirmations cannot be withdrawn",
            before.id
        )));
    }
    if before.completed && !after.completed {
        return Err(RotaError::InvalidRecord(format!(
            "{} cannot be reopened",
            before.id
        )));
    }
    after.validate()
}

/// Ledger kept in process memory. Used by tests and the fairness simulator.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<RecordId, AssignmentRecord>,
    next_id: i64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn append(&mut self, record: NewAssignment) -> Result<RecordId> {
        record.validate()?;
        self.next_id += 1;
        let id = RecordId(self.next_id);
        self.records.insert(id, AssignmentRecord::from_new(id, record));
        Ok(id)
    }

    fn query(&self, query: &RecordQuery) -> Result<Vec<AssignmentRecord>> {
        Ok(self
            .records
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }

    fn get(&self, id: RecordId) -> Result<Option<AssignmentRecord>> {
        Ok(self.records.get(&id).cloned())
    }

    fn update(
        &mut self,
        id: RecordId,
        mutation: &mut RecordMutation<'_>,
    ) -> Result<AssignmentRecord> {
        let before = self.records.get(&id).ok_or(RotaError::RecordNotFound(id))?;
        let mut after = before.clone();
        mutation(&mut after)?;
        check_update(before, &after)?;
        self.records.insert(id, after.clone());
        Ok(after)
    }
}
