//! Completion tracking for free-text "done" messages.

use serde::Serialize;

use crate::error::{Result, RotaError};
use crate::model::{AssignmentRecord, Confirmation, Person, PersonId, person::display_name};
use crate::store::{RecordQuery, RecordStore};

/// Default completion keyword.
pub const DEFAULT_KEYWORD: &str = "done";

/// Where a message arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// One-to-one conversation with the bot.
    Direct,
    /// Shared household channel.
    Group,
}

/// An inbound message as seen by the completion tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: PersonId,
    pub channel: ChannelKind,
    pub text: String,
}

impl InboundMessage {
    #[must_use]
    pub fn direct(sender: impl Into<PersonId>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            channel: ChannelKind::Direct,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn group(sender: impl Into<PersonId>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            channel: ChannelKind::Group,
            text: text.into(),
        }
    }
}

/// Whether `message` should be handled as a completion signal.
///
/// Only direct messages count. The keyword is matched as a
/// case-insensitive substring of the trimmed text.
#[must_use]
pub fn is_completion_signal(message: &InboundMessage, keyword: &str) -> bool {
    if message.channel != ChannelKind::Direct {
        return false;
    }
    let keyword = keyword.trim().to_lowercase();
    !keyword.is_empty() && message.text.trim().to_lowercase().contains(&keyword)
}

/// Result of handling a completion signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "records", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The sender has nothing left to confirm this cycle.
    NoPendingWork,
    /// Exactly one record was open and has been confirmed.
    SingleRecordUpdated(AssignmentRecord),
    /// Several records are open; the sender must pick one. Nothing changed.
    DisambiguationNeeded(Vec<AssignmentRecord>),
}

/// Records in `cycle` that `person` still has to confirm.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn open_for(
    store: &dyn RecordStore,
    person: &PersonId,
    cycle: &str,
) -> Result<Vec<AssignmentRecord>> {
    let records = store.query(
        &RecordQuery::for_cycle(cycle)
            .assignee(person.clone())
            .completed(false),
    )?;
    Ok(records
        .into_iter()
        .filter(|record| !record.has_confirmed(person))
        .collect())
}

/// Handle a possible "done" message from `message.sender`.
///
/// Returns `Ok(None)` when the message is not a completion signal at all.
///
/// # Errors
///
/// Returns an error if the store read or update fails.
pub fn mark_done(
    store: &mut dyn RecordStore,
    message: &InboundMessage,
    keyword: &str,
    cycle: &str,
    now_us: i64,
) -> Result<Option<CompletionOutcome>> {
    if !is_completion_signal(message, keyword) {
        return Ok(None);
    }

    let person = &message.sender;
    let mut open = open_for(store, person, cycle)?;
    let outcome = match open.len() {
        0 => CompletionOutcome::NoPendingWork,
        1 => {
            let record = open.remove(0);
            CompletionOutcome::SingleRecordUpdated(confirm(store, &record, person, now_us)?)
        }
        _ => {
            tracing::debug!(person = %person, open = open.len(), "completion needs a choice");
            CompletionOutcome::DisambiguationNeeded(open)
        }
    };
    Ok(Some(outcome))
}

/// Confirm an explicitly chosen chore after disambiguation.
///
/// # Errors
///
/// Returns [`RotaError::NoMatchingChore`] if `person` has no open record for
/// `chore_title` in `cycle`, or any store error.
pub fn complete_selected(
    store: &mut dyn RecordStore,
    person: &PersonId,
    cycle: &str,
    chore_title: &str,
    now_us: i64,
) -> Result<AssignmentRecord> {
    let wanted = chore_title.trim();
    let record = open_for(store, person, cycle)?
        .into_iter()
        .find(|record| record.chore_title.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| RotaError::NoMatchingChore(wanted.to_string()))?;
    confirm(store, &record, person, now_us)
}

fn confirm(
    store: &mut dyn RecordStore,
    record: &AssignmentRecord,
    person: &PersonId,
    now_us: i64,
) -> Result<AssignmentRecord> {
    let mut result = None;
    let updated = store.update(record.id, &mut |r| {
        result = Some(r.confirm(person, now_us)?);
        Ok(())
    })?;
    tracing::info!(
        record = %updated.id,
        chore = %updated.chore_title,
        person = %person,
        state = %updated.state(),
        already = matches!(result, Some(Confirmation::AlreadyConfirmed)),
        "recorded completion"
    );
    Ok(updated)
}

/// Display names of assignees who still have to confirm `record`.
#[must_use]
pub fn waiting_on_names<'a>(record: &'a AssignmentRecord, roster: &'a [Person]) -> Vec<&'a str> {
    record
        .waiting_on()
        .into_iter()
        .map(|id| display_name(roster, id))
        .collect()
}

/// User-facing reply for a completion outcome.
#[must_use]
pub fn describe_outcome(outcome: &CompletionOutcome, roster: &[Person]) -> String {
    match outcome {
        CompletionOutcome::NoPendingWork => {
            "You have no open chores this week. Nice.".to_string()
        }
        CompletionOutcome::SingleRecordUpdated(record) if record.completed => {
            format!("Marked '{}' as done. Thanks!", record.chore_title)
        }
        CompletionOutcome::SingleRecordUpdated(record) => format!(
            "Got your part of '{}'. Still waiting on {}.",
            record.chore_title,
            waiting_on_names(record, roster).join(", ")
        ),
        CompletionOutcome::DisambiguationNeeded(records) => {
            let titles: Vec<&str> = records.iter().map(|r| r.chore_title.as_str()).collect();
            format!("Which one did you finish? {}", titles.join(" / "))
        }
    }
}
