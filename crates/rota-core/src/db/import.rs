//! One-time import of flat-file JSON ledgers.
//!
//! Older ledgers were JSON files whose entries used either a scalar
//! `assignee` or a list of `assignees`, with loosely named fields. Every
//! entry is normalized to the list form before it reaches the store.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::CycleId;
use crate::model::{NewAssignment, PersonId};
use crate::store::RecordStore;

/// One entry from a legacy JSON ledger, in any of its historical shapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyEntry {
    #[serde(alias = "week", alias = "period")]
    pub cycle: String,
    #[serde(alias = "chore", alias = "title")]
    pub chore_title: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub assignees: Option<Vec<String>>,
    #[serde(default)]
    pub completed_by: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(alias = "assigned_at", alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "due")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub triggered_by: Option<String>,
}

impl LegacyEntry {
    /// Assignees as a list, whichever field the entry used.
    #[must_use]
    pub fn unified_assignees(&self) -> Vec<PersonId> {
        let raw: Vec<&str> = match (&self.assignees, &self.assignee) {
            (Some(list), _) if !list.is_empty() => list.iter().map(String::as_str).collect(),
            (_, Some(single)) => vec![single.as_str()],
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(PersonId::from)
            .collect()
    }

    /// People who confirmed. A legacy `completed: true` with no explicit
    /// list means every assignee finished.
    #[must_use]
    pub fn unified_completed_by(&self, assignees: &[PersonId]) -> Vec<PersonId> {
        if self.completed_by.is_empty() && self.completed {
            return assignees.to_vec();
        }
        self.completed_by
            .iter()
            .map(|id| PersonId::from(id.trim()))
            .filter(|id| assignees.contains(id))
            .collect()
    }
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// `(entry index, reason)` for entries that could not be imported.
    pub skipped: Vec<(usize, String)>,
}

/// Parse a legacy ledger: a JSON array, or one JSON object per line.
///
/// # Errors
///
/// Returns an error naming the first entry that fails to parse.
pub fn parse_legacy_ledger(content: &str) -> Result<Vec<LegacyEntry>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("parse legacy ledger array");
    }

    let mut entries = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(line)
            .with_context(|| format!("parse legacy ledger line {}", line_no + 1))?;
        entries.push(entry);
    }
    if entries.is_empty() {
        bail!("legacy ledger is empty");
    }
    Ok(entries)
}

/// Append every importable entry to `store`, replaying confirmations.
///
/// Entries with no usable assignee or an unreadable week are skipped and
/// reported rather than failing the whole import.
///
/// # Errors
///
/// Returns an error if a store write fails.
pub fn import_legacy(store: &mut dyn RecordStore, entries: &[LegacyEntry]) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (index, entry) in entries.iter().enumerate() {
        let assignees = entry.unified_assignees();
        if assignees.is_empty() {
            report
                .skipped
                .push((index, format!("'{}' has no assignee", entry.chore_title)));
            continue;
        }
        let Ok(cycle) = entry.cycle.parse::<CycleId>() else {
            report
                .skipped
                .push((index, format!("'{}' is not a week like 2026-W42", entry.cycle)));
            continue;
        };
        let completed_by = entry.unified_completed_by(&assignees);
        let created_at_us = entry.created_at.timestamp_micros();
        let due_at_us = entry.due_at.map(|due| due.timestamp_micros());

        let new = match entry.triggered_by.as_deref() {
            Some(requester) => NewAssignment::adhoc(
                cycle.key(),
                entry.chore_title.clone(),
                assignees,
                created_at_us,
                due_at_us,
                PersonId::from(requester),
            ),
            None => NewAssignment::scheduled(
                cycle.key(),
                entry.chore_title.clone(),
                assignees,
                created_at_us,
                due_at_us,
            ),
        };
        let new = match new {
            Ok(new) => new,
            Err(err) => {
                report.skipped.push((index, err.to_string()));
                continue;
            }
        };

        let id = store.append(new).context("append imported record")?;
        if !completed_by.is_empty() {
            let at_us = entry
                .completed_at
                .map_or(created_at_us, |done| done.timestamp_micros());
            store
                .update(id, &mut |record| {
                    for person in &completed_by {
                        record.confirm(person, at_us)?;
                    }
                    Ok(())
                })
                .context("replay imported confirmations")?;
        }
        report.imported += 1;
    }

    tracing::info!(
        imported = report.imported,
        skipped = report.skipped.len(),
        "legacy ledger import finished"
    );
    Ok(report)
}
