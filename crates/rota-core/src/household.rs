//! The household service: configuration, ledger, allocator and notifier
//! wired together behind the operations the CLI (or a chat bot) calls.
//!
//! Every operation persists first and notifies second. A failed delivery
//! is logged and counted, never propagated, so one unreachable person
//! cannot undo or abort a batch.

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use serde::Serialize;

use crate::adhoc::resolve_chore;
use crate::allocator::{allocate, allocate_adhoc};
use crate::completion::{
    self, CompletionOutcome, InboundMessage, describe_outcome, waiting_on_names,
};
use crate::config::HouseholdConfig;
use crate::cycle::CycleId;
use crate::due::next_due_us;
use crate::error::{Result, RotaError};
use crate::model::{AssignmentRecord, NewAssignment, PersonId, person::display_name};
use crate::notify::Notifier;
use crate::reminder::{Reminder, due_soon};
use crate::session::{SessionKey, SessionMap, ShareSession};
use crate::stats::{PersonStats, person_stats};
use crate::store::{RecordQuery, RecordStore};

/// What one allocation run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: String,
    /// Newly created records, or the still-pending ones on a repeat run.
    pub records: Vec<AssignmentRecord>,
    /// `false` when an earlier run already covered this cycle.
    pub created: bool,
    pub notice: Option<String>,
    pub failed_notifications: usize,
}

/// Reply to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandledMessage {
    pub outcome: CompletionOutcome,
    pub reply: String,
}

pub struct Household<S, N> {
    config: HouseholdConfig,
    tz: FixedOffset,
    store: S,
    notifier: N,
    sessions: SessionMap,
}

impl<S: RecordStore, N: Notifier> Household<S, N> {
    /// # Errors
    ///
    /// Returns [`RotaError::Configuration`] if `config` does not validate.
    pub fn new(config: HouseholdConfig, store: S, notifier: N) -> Result<Self> {
        config.validate()?;
        let tz = config.utc_offset()?;
        let sessions = SessionMap::new(config.sessions.ttl());
        Ok(Self {
            config,
            tz,
            store,
            notifier,
            sessions,
        })
    }

    pub const fn config(&self) -> &HouseholdConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn into_parts(self) -> (S, N) {
        (self.store, self.notifier)
    }

    /// `now` in the household's timezone.
    pub fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.tz)
    }

    /// Cycle key containing `now`.
    pub fn cycle_at(&self, now: DateTime<Utc>) -> String {
        CycleId::containing(&self.local(now)).key()
    }

    /// Allocate this cycle's scheduled chores.
    ///
    /// A repeat call in the same cycle returns the existing pending records
    /// and writes nothing, unless `force` is set, in which case a fresh set
    /// is created next to the old one.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::EmptyRoster`] or any store error.
    pub fn run_cycle<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        force: bool,
        rng: &mut R,
    ) -> Result<CycleReport> {
        let local = self.local(now);
        let key = CycleId::containing(&local).key();

        let existing = self
            .store
            .query(&RecordQuery::for_cycle(&key).scheduled_only())?;
        if !existing.is_empty() {
            if !force {
                let pending: Vec<_> = existing.into_iter().filter(|r| !r.completed).collect();
                tracing::info!(cycle = %key, pending = pending.len(), "cycle already allocated");
                return Ok(CycleReport {
                    cycle: key,
                    records: pending,
                    created: false,
                    notice: None,
                    failed_notifications: 0,
                });
            }
            tracing::warn!(
                cycle = %key,
                existing = existing.len(),
                "forced reassignment: ledger will hold duplicate records for this cycle"
            );
        }

        let policy = self.config.fairness.policy();
        let history = self.store.query(&policy.window.history_query(&local))?;

        let batch = allocate(
            &self.config.chores,
            &self.config.people,
            &history,
            &policy,
            &local,
            rng,
        )
        .inspect_err(|err| tracing::error!(code = err.error_code(), "allocation failed: {err}"))?;
        let records = self.store.append_all(batch)?;
        tracing::info!(cycle = %key, created = records.len(), "allocated cycle");

        let mut failed = 0;
        let notice = policy.window.reset_notice(&local);
        if let Some(text) = &notice {
            failed += self.announce(text);
        }
        if !records.is_empty() {
            failed += self.announce(&self.summary(&key, &records));
            for record in &records {
                failed += self.notify_assignees(record, &self.assignment_message(record));
            }
        }

        Ok(CycleReport {
            cycle: key,
            records,
            created: true,
            notice,
            failed_notifications: failed,
        })
    }

    /// Handle an inbound message. `Ok(None)` when it is not a completion
    /// signal.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::UnknownPerson`] when a completion signal comes
    /// from someone off the roster, or a store error.
    pub fn handle_text(
        &mut self,
        message: &InboundMessage,
        now: DateTime<Utc>,
    ) -> Result<Option<HandledMessage>> {
        if !completion::is_completion_signal(message, &self.config.completion.keyword) {
            return Ok(None);
        }
        self.config.person(&message.sender)?;
        let cycle = self.cycle_at(now);
        let Some(outcome) = completion::mark_done(
            &mut self.store,
            message,
            &self.config.completion.keyword,
            &cycle,
            now.timestamp_micros(),
        )?
        else {
            return Ok(None);
        };

        if let CompletionOutcome::SingleRecordUpdated(record) = &outcome {
            self.announce_if_finished(record);
        }
        let reply = describe_outcome(&outcome, &self.config.people);
        Ok(Some(HandledMessage { outcome, reply }))
    }

    /// Confirm a chore picked after a disambiguation prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::NoMatchingChore`] when `person` has no open
    /// record with that title this cycle.
    pub fn pick(
        &mut self,
        person: &PersonId,
        chore_title: &str,
        now: DateTime<Utc>,
    ) -> Result<AssignmentRecord> {
        self.config.person(person)?;
        let cycle = self.cycle_at(now);
        let record = completion::complete_selected(
            &mut self.store,
            person,
            &cycle,
            chore_title,
            now.timestamp_micros(),
        )?;
        self.announce_if_finished(&record);
        Ok(record)
    }

    /// Create an ad-hoc record for the chore `text` refers to.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::NoMatchingChore`] when no chore matches (no
    /// record is created), or [`RotaError::UnknownPerson`] for requesters
    /// off the roster.
    pub fn trigger<R: Rng + ?Sized>(
        &mut self,
        text: &str,
        requester: &PersonId,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<AssignmentRecord> {
        self.config.person(requester)?;
        let chore = resolve_chore(&self.config.chores, text)?.clone();
        let local = self.local(now);
        let policy = self.config.fairness.policy();
        let history = self.store.query(&policy.window.history_query(&local))?;

        let new = allocate_adhoc(
            &chore,
            &self.config.people,
            &history,
            &policy,
            &local,
            requester,
            rng,
        )?;
        let record = self.persist(new)?;
        tracing::info!(
            record = %record.id,
            chore = %record.chore_title,
            requester = %requester,
            "ad-hoc chore triggered"
        );
        let message = format!(
            "{} asked for '{}'. You're up!",
            display_name(&self.config.people, requester),
            record.chore_title
        );
        self.notify_assignees(&record, &message);
        Ok(record)
    }

    /// Begin choosing who shares the chore matching `category`.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::NoMatchingChore`] or [`RotaError::UnknownPerson`].
    pub fn start_share(
        &mut self,
        initiator: &PersonId,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<ShareSession> {
        self.config.person(initiator)?;
        let chore = resolve_chore(&self.config.chores, category)?;
        let now_us = now.timestamp_micros();
        self.sessions.evict_expired(now_us);
        let session = self
            .sessions
            .start(SessionKey::new(initiator.clone(), category), chore.title.clone(), now_us);
        Ok(session.clone())
    }

    /// Add or remove `person` in an open share selection.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::NoActiveSession`] if the selection expired or
    /// was never started, or [`RotaError::UnknownPerson`].
    pub fn toggle_share(
        &mut self,
        initiator: &PersonId,
        category: &str,
        person: &PersonId,
        now: DateTime<Utc>,
    ) -> Result<ShareSession> {
        self.config.person(person)?;
        let key = SessionKey::new(initiator.clone(), category);
        self.sessions
            .toggle(&key, person.clone(), now.timestamp_micros())
            .cloned()
            .ok_or_else(|| RotaError::NoActiveSession(key.category.clone()))
    }

    /// Finish a share selection and create the shared record.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::NoActiveSession`] for missing or expired
    /// selections and [`RotaError::InvalidRecord`] if nobody was selected.
    pub fn confirm_share(
        &mut self,
        initiator: &PersonId,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<AssignmentRecord> {
        let key = SessionKey::new(initiator.clone(), category);
        let session = self
            .sessions
            .confirm(&key, now.timestamp_micros())
            .ok_or_else(|| RotaError::NoActiveSession(key.category.clone()))?;

        let local = self.local(now);
        let recurrence = self
            .config
            .chores
            .iter()
            .find(|chore| chore.title == session.chore_title)
            .and_then(|chore| chore.recurrence);
        let new = NewAssignment::adhoc(
            CycleId::containing(&local).key(),
            session.chore_title,
            session.selected,
            now.timestamp_micros(),
            next_due_us(recurrence.as_ref(), &local),
            initiator.clone(),
        )?;
        let record = self.persist(new)?;
        let names: Vec<&str> = record
            .assignees
            .iter()
            .map(|id| display_name(&self.config.people, id))
            .collect();
        let message = format!("'{}' is shared by {}.", record.chore_title, names.join(" and "));
        self.announce(&message);
        Ok(record)
    }

    /// Abandon a share selection. Returns whether one was open.
    pub fn cancel_share(&mut self, initiator: &PersonId, category: &str) -> bool {
        self.sessions
            .cancel(&SessionKey::new(initiator.clone(), category))
    }

    /// Remind everyone with an open chore due soon.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn remind(&mut self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let reminders = due_soon(&self.store, &now, self.config.reminders.lookahead())?;
        for reminder in &reminders {
            let message = reminder.message(&self.tz);
            self.deliver(&reminder.person, &message);
        }
        Ok(reminders)
    }

    /// Every record of the cycle containing `now`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn status(&self, now: DateTime<Utc>) -> Result<Vec<AssignmentRecord>> {
        self.store.query(&RecordQuery::for_cycle(self.cycle_at(now)))
    }

    /// Per-person credit inside the fairness window, or over the whole
    /// ledger when `all_time` is set.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn stats(&self, now: DateTime<Utc>, all_time: bool) -> Result<Vec<PersonStats>> {
        if all_time {
            let records = self.store.query(&RecordQuery::all())?;
            return Ok(person_stats(&records, &self.config.people));
        }
        let local = self.local(now);
        let window = self.config.fairness.policy().window;
        let candidates = self.store.query(&window.history_query(&local))?;
        Ok(person_stats(window.filter(&candidates, &local), &self.config.people))
    }

    /// Post to the household channel. Returns 1 if delivery failed.
    pub fn announce(&mut self, message: &str) -> usize {
        match self.notifier.announce(message) {
            Ok(()) => 0,
            Err(err) => {
                tracing::warn!(code = RotaError::from(err.clone()).error_code(), "{err}");
                1
            }
        }
    }

    fn deliver(&mut self, person: &PersonId, message: &str) -> usize {
        match self.notifier.notify(person, message) {
            Ok(()) => 0,
            Err(err) => {
                tracing::warn!(code = RotaError::from(err.clone()).error_code(), "{err}");
                1
            }
        }
    }

    fn notify_assignees(&mut self, record: &AssignmentRecord, message: &str) -> usize {
        record
            .assignees
            .iter()
            .map(|person| self.deliver(person, message))
            .sum()
    }

    fn persist(&mut self, new: NewAssignment) -> Result<AssignmentRecord> {
        let id = self.store.append(new)?;
        self.store.get(id)?.ok_or(RotaError::RecordNotFound(id))
    }

    fn announce_if_finished(&mut self, record: &AssignmentRecord) {
        if record.completed {
            let names: Vec<&str> = record
                .assignees
                .iter()
                .map(|id| display_name(&self.config.people, id))
                .collect();
            let message = format!("{} finished '{}'.", names.join(" and "), record.chore_title);
            self.announce(&message);
        } else if record.is_shared() {
            let waiting = waiting_on_names(record, &self.config.people).join(", ");
            tracing::debug!(record = %record.id, waiting = %waiting, "shared chore partially done");
        }
    }

    fn summary(&self, cycle: &str, records: &[AssignmentRecord]) -> String {
        let mut lines = vec![format!("Chores for {cycle}:")];
        for record in records {
            let names: Vec<&str> = record
                .assignees
                .iter()
                .map(|id| display_name(&self.config.people, id))
                .collect();
            let due = record
                .due_at_us
                .and_then(DateTime::from_timestamp_micros)
                .map(|utc| format!(" (due {})", utc.with_timezone(&self.tz).format("%a %H:%M")))
                .unwrap_or_default();
            lines.push(format!("- {}: {}{due}", record.chore_title, names.join(", ")));
        }
        lines.join("\n")
    }

    fn assignment_message(&self, record: &AssignmentRecord) -> String {
        if record.is_shared() {
            let names: Vec<&str> = record
                .assignees
                .iter()
                .map(|id| display_name(&self.config.people, id))
                .collect();
            format!(
                "You're on '{}' this week, together with {}.",
                record.chore_title,
                names.join(", ")
            )
        } else {
            format!("You're on '{}' this week.", record.chore_title)
        }
    }
}
