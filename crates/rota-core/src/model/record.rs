use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::person::PersonId;
use crate::error::{Result, RotaError};

/// Store-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of an assignment. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Pending,
    PartiallyDone,
    Done,
}

impl CompletionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PartiallyDone => "partially_done",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CompletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully populated assignment that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub cycle: String,
    pub chore_title: String,
    pub assignees: Vec<PersonId>,
    pub created_at_us: i64,
    pub due_at_us: Option<i64>,
    pub triggered_by: Option<PersonId>,
}

impl NewAssignment {
    /// Build a record for the periodic allocation run.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::InvalidRecord`] if `assignees` is empty.
    pub fn scheduled(
        cycle: impl Into<String>,
        chore_title: impl Into<String>,
        assignees: Vec<PersonId>,
        created_at_us: i64,
        due_at_us: Option<i64>,
    ) -> Result<Self> {
        let record = Self {
            cycle: cycle.into(),
            chore_title: chore_title.into(),
            assignees: dedup_ordered(assignees),
            created_at_us,
            due_at_us,
            triggered_by: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Build a record created outside the schedule on someone's request.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::InvalidRecord`] if `assignees` is empty.
    pub fn adhoc(
        cycle: impl Into<String>,
        chore_title: impl Into<String>,
        assignees: Vec<PersonId>,
        created_at_us: i64,
        due_at_us: Option<i64>,
        triggered_by: PersonId,
    ) -> Result<Self> {
        let mut record = Self::scheduled(cycle, chore_title, assignees, created_at_us, due_at_us)?;
        record.triggered_by = Some(triggered_by);
        Ok(record)
    }

    /// Check the invariants a store must refuse to persist without.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::InvalidRecord`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.assignees.is_empty() {
            return Err(RotaError::InvalidRecord(format!(
                "'{}' has no assignees",
                self.chore_title
            )));
        }
        if self.chore_title.trim().is_empty() {
            return Err(RotaError::InvalidRecord("chore title is empty".into()));
        }
        if self.cycle.trim().is_empty() {
            return Err(RotaError::InvalidRecord("cycle key is empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_adhoc(&self) -> bool {
        self.triggered_by.is_some()
    }
}

/// What a confirmation did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Added to `completed_by`; `finished` when that completed the record.
    Recorded { finished: bool },
    /// The person had already confirmed; nothing changed.
    AlreadyConfirmed,
}

/// A persisted entry in the fairness ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: RecordId,
    pub cycle: String,
    pub chore_title: String,
    pub assignees: Vec<PersonId>,
    pub created_at_us: i64,
    pub due_at_us: Option<i64>,
    pub completed_by: BTreeSet<PersonId>,
    pub completed: bool,
    pub completed_at_us: Option<i64>,
    pub triggered_by: Option<PersonId>,
}

impl AssignmentRecord {
    #[must_use]
    pub fn from_new(id: RecordId, new: NewAssignment) -> Self {
        Self {
            id,
            cycle: new.cycle,
            chore_title: new.chore_title,
            assignees: new.assignees,
            created_at_us: new.created_at_us,
            due_at_us: new.due_at_us,
            completed_by: BTreeSet::new(),
            completed: false,
            completed_at_us: None,
            triggered_by: new.triggered_by,
        }
    }

    #[must_use]
    pub fn state(&self) -> CompletionState {
        if self.completed {
            CompletionState::Done
        } else if self.completed_by.is_empty() {
            CompletionState::Pending
        } else {
            CompletionState::PartiallyDone
        }
    }

    #[must_use]
    pub fn is_assigned(&self, person: &PersonId) -> bool {
        self.assignees.contains(person)
    }

    #[must_use]
    pub fn has_confirmed(&self, person: &PersonId) -> bool {
        self.completed_by.contains(person)
    }

    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.assignees.len() > 1
    }

    #[must_use]
    pub const fn is_adhoc(&self) -> bool {
        self.triggered_by.is_some()
    }

    /// Credit each assignee earns for this record.
    #[must_use]
    pub fn credit_share(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = self.assignees.len().max(1) as f64;
        1.0 / n
    }

    /// Assignees who have not confirmed yet, in assignment order.
    #[must_use]
    pub fn waiting_on(&self) -> Vec<&PersonId> {
        self.assignees
            .iter()
            .filter(|person| !self.completed_by.contains(*person))
            .collect()
    }

    /// Record that `person` finished their part.
    ///
    /// `completed` flips once every assignee has confirmed, and
    /// `completed_at_us` is stamped at that moment only.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::InvalidRecord`] if `person` is not an assignee.
    pub fn confirm(&mut self, person: &PersonId, at_us: i64) -> Result<Confirmation> {
        if !self.is_assigned(person) {
            return Err(RotaError::InvalidRecord(format!(
                "{person} is not assigned to '{}' ({})",
                self.chore_title, self.id
            )));
        }
        if !self.completed_by.insert(person.clone()) {
            return Ok(Confirmation::AlreadyConfirmed);
        }

        let finished = self.assignees.iter().all(|p| self.completed_by.contains(p));
        if finished && !self.completed {
            self.completed = true;
            self.completed_at_us = Some(at_us);
        }
        Ok(Confirmation::Recorded { finished })
    }

    /// Check the ledger invariants on a loaded or updated record.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::InvalidRecord`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.assignees.is_empty() {
            return Err(RotaError::InvalidRecord(format!("{} has no assignees", self.id)));
        }
        if let Some(stray) = self.completed_by.iter().find(|p| !self.is_assigned(p)) {
            return Err(RotaError::InvalidRecord(format!(
                "{stray} confirmed {} without being assigned",
                self.id
            )));
        }
        let everyone = self.assignees.iter().all(|p| self.completed_by.contains(p));
        if self.completed != everyone {
            return Err(RotaError::InvalidRecord(format!(
                "{} completed flag disagrees with its confirmations",
                self.id
            )));
        }
        Ok(())
    }
}

fn dedup_ordered(people: Vec<PersonId>) -> Vec<PersonId> {
    let mut seen = BTreeSet::new();
    people
        .into_iter()
        .filter(|person| seen.insert(person.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_record() -> AssignmentRecord {
        let new = NewAssignment::scheduled(
            "2026-W42",
            "Deep clean kitchen",
            vec!["ana".into(), "bo".into()],
            1_000,
            None,
        )
        .expect("valid record");
        AssignmentRecord::from_new(RecordId(1), new)
    }

    #[test]
    fn empty_assignees_are_rejected() {
        let err = NewAssignment::scheduled("2026-W42", "Dishes", vec![], 0, None)
            .expect_err("empty assignees must fail");
        assert!(matches!(err, RotaError::InvalidRecord(_)));
    }

    #[test]
    fn duplicate_assignees_collapse_in_order() {
        let new = NewAssignment::scheduled(
            "2026-W42",
            "Dishes",
            vec!["bo".into(), "ana".into(), "bo".into()],
            0,
            None,
        )
        .expect("valid record");
        assert_eq!(new.assignees, vec![PersonId::from("bo"), PersonId::from("ana")]);
    }

    #[test]
    fn shared_chore_walks_pending_partial_done() {
        let mut record = shared_record();
        assert_eq!(record.state(), CompletionState::Pending);

        let first = record.confirm(&"ana".into(), 2_000).expect("ana is assigned");
        assert_eq!(first, Confirmation::Recorded { finished: false });
        assert_eq!(record.state(), CompletionState::PartiallyDone);
        assert_eq!(record.waiting_on(), vec![&PersonId::from("bo")]);
        assert_eq!(record.completed_at_us, None);

        let second = record.confirm(&"bo".into(), 3_000).expect("bo is assigned");
        assert_eq!(second, Confirmation::Recorded { finished: true });
        assert_eq!(record.state(), CompletionState::Done);
        assert_eq!(record.completed_at_us, Some(3_000));
        assert!(record.waiting_on().is_empty());
        record.validate().expect("done record is consistent");
    }

    #[test]
    fn repeated_confirmation_is_a_no_op() {
        let mut record = shared_record();
        record.confirm(&"ana".into(), 2_000).expect("ana is assigned");
        let again = record.confirm(&"ana".into(), 9_000).expect("still assigned");
        assert_eq!(again, Confirmation::AlreadyConfirmed);
        assert_eq!(record.completed_by.len(), 1);
    }

    #[test]
    fn outsiders_cannot_confirm() {
        let mut record = shared_record();
        let err = record
            .confirm(&"cy".into(), 2_000)
            .expect_err("cy is not assigned");
        assert!(matches!(err, RotaError::InvalidRecord(_)));
        assert!(record.completed_by.is_empty());
    }

    #[test]
    fn shared_record_splits_credit() {
        let record = shared_record();
        assert!((record.credit_share() - 0.5).abs() < f64::EPSILON);
    }
}
