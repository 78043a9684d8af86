//! Per-person workload statistics.

use serde::Serialize;

use crate::model::{AssignmentRecord, Person, PersonId};

/// Credit totals for one roster member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonStats {
    pub person: PersonId,
    pub display_name: String,
    /// Sum of `1 / |assignees|` over every record listing this person.
    pub assigned: f64,
    /// Same, restricted to completed records.
    pub completed: f64,
}

/// Totals for each roster member over `records`, in roster order.
#[must_use]
pub fn person_stats<'a, I>(records: I, roster: &[Person]) -> Vec<PersonStats>
where
    I: IntoIterator<Item = &'a AssignmentRecord>,
{
    let mut stats: Vec<PersonStats> = roster
        .iter()
        .map(|person| PersonStats {
            person: person.id.clone(),
            display_name: person.display_name.clone(),
            assigned: 0.0,
            completed: 0.0,
        })
        .collect();

    for record in records {
        let share = record.credit_share();
        for entry in stats.iter_mut().filter(|s| record.is_assigned(&s.person)) {
            entry.assigned += share;
            if record.completed {
                entry.completed += share;
            }
        }
    }
    stats
}

/// Render a credit value without rounding noise: `2`, `1.5`, `0.333`.
#[must_use]
pub fn format_credit(value: f64) -> String {
    let rendered = format!("{value:.3}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
