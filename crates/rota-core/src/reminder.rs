//! Reminder sweep for chores coming due.
//!
//! The sweep is read-only and keeps no memory of what it already sent, so
//! a chore inside the lookahead window is announced on every sweep.

use chrono::{DateTime, Duration, TimeZone};
use serde::Serialize;

use crate::error::Result;
use crate::model::{Person, PersonId, RecordId, person::display_name};
use crate::store::{RecordQuery, RecordStore};

/// Default lookahead, in minutes.
pub const DEFAULT_LOOKAHEAD_MINUTES: i64 = 30;

/// One reminder to deliver to one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub record: RecordId,
    pub person: PersonId,
    pub chore_title: String,
    pub due_at_us: i64,
}

impl Reminder {
    /// Message text, with the due time rendered in `tz`.
    #[must_use]
    pub fn message<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let due = DateTime::from_timestamp_micros(self.due_at_us)
            .map(|utc| utc.with_timezone(tz).format("%H:%M").to_string())
            .unwrap_or_else(|| "soon".to_string());
        format!("Reminder: '{}' is due at {due}.", self.chore_title)
    }

    /// Display name of the recipient.
    #[must_use]
    pub fn recipient<'a>(&'a self, roster: &'a [Person]) -> &'a str {
        display_name(roster, &self.person)
    }
}

/// Reminders for every open record due within `[now, now + lookahead]`.
///
/// One reminder per assignee who has not yet confirmed, ordered by due time.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn due_soon<Tz: TimeZone>(
    store: &dyn RecordStore,
    now: &DateTime<Tz>,
    lookahead: Duration,
) -> Result<Vec<Reminder>> {
    let from_us = now.timestamp_micros();
    let to_us = from_us.saturating_add(lookahead.num_microseconds().unwrap_or(i64::MAX));
    let mut records = store.query(&RecordQuery::all().completed(false).due_between(from_us, to_us))?;
    records.sort_by_key(|record| (record.due_at_us, record.id));

    let reminders: Vec<Reminder> = records
        .iter()
        .flat_map(|record| {
            let due_at_us = record.due_at_us.unwrap_or(from_us);
            record.waiting_on().into_iter().map(move |person| Reminder {
                record: record.id,
                person: person.clone(),
                chore_title: record.chore_title.clone(),
                due_at_us,
            })
        })
        .collect();
    tracing::debug!(count = reminders.len(), "reminder sweep");
    Ok(reminders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewAssignment;
    use crate::store::MemoryStore;
    use chrono::{FixedOffset, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 17, 40, 0)
            .single()
            .expect("valid instant")
    }

    fn seed(store: &mut MemoryStore, chore: &str, people: &[&str], due_in_minutes: i64) {
        let due = now() + Duration::minutes(due_in_minutes);
        store
            .append(
                NewAssignment::scheduled(
                    "2026-W42",
                    chore,
                    people.iter().map(|p| PersonId::from(*p)).collect(),
                    0,
                    Some(due.timestamp_micros()),
                )
                .expect("valid record"),
            )
            .expect("append");
    }

    #[test]
    fn only_records_inside_window_are_swept() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Dishes", &["ana"], 20);
        seed(&mut store, "Trash", &["bo"], 45);
        seed(&mut store, "Floors", &["cy"], -5);

        let reminders =
            due_soon(&store, &now(), Duration::minutes(DEFAULT_LOOKAHEAD_MINUTES)).expect("sweep");
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].chore_title, "Dishes");
    }

    #[test]
    fn shared_chores_remind_only_unconfirmed_people() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Deep clean kitchen", &["ana", "bo"], 10);
        store
            .update(RecordId(1), &mut |r| r.confirm(&"ana".into(), 1).map(|_| ()))
            .expect("confirm");

        let reminders = due_soon(&store, &now(), Duration::minutes(30)).expect("sweep");
        let people: Vec<_> = reminders.iter().map(|r| r.person.as_str()).collect();
        assert_eq!(people, vec!["bo"]);
    }

    #[test]
    fn repeated_sweeps_repeat_reminders() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Dishes", &["ana"], 20);
        let first = due_soon(&store, &now(), Duration::minutes(30)).expect("sweep");
        let second = due_soon(&store, &now(), Duration::minutes(30)).expect("sweep");
        assert_eq!(first, second);
    }

    #[test]
    fn message_uses_household_offset() {
        let reminder = Reminder {
            record: RecordId(1),
            person: "ana".into(),
            chore_title: "Dishes".into(),
            due_at_us: now().timestamp_micros(),
        };
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        assert_eq!(reminder.message(&tz), "Reminder: 'Dishes' is due at 19:40.");
    }
}
