//! Household data model: people, chores, and the assignment records that
//! make up the fairness ledger.

pub mod chore;
pub mod person;
pub mod record;

pub use chore::{Chore, Recurrence};
pub use person::{Person, PersonId};
pub use record::{AssignmentRecord, CompletionState, Confirmation, NewAssignment, RecordId};
