//! Fairness allocator.
//!
//! Each scheduled chore goes to whoever has earned the least credit for it
//! inside the lookback window. A record earns `1 / |assignees|` credit for
//! every assignee, so shared chores split their weight. Ties are broken
//! uniformly at random, and within one run the allocator spreads chores
//! over people who have not been picked yet before it repeats anyone.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cycle::{CycleId, WindowPolicy};
use crate::due::next_due_us;
use crate::error::{Result, RotaError};
use crate::model::{AssignmentRecord, Chore, NewAssignment, Person, PersonId};

/// Credits closer than this are treated as equal.
pub const CREDIT_EPSILON: f64 = 1e-9;

/// Which records count toward a person's credit for a chore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditScope {
    /// Only past records of the same chore.
    #[default]
    PerChore,
    /// Every record in the window, whatever the chore.
    Total,
}

/// Window and credit scope used by one allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FairnessPolicy {
    pub window: WindowPolicy,
    pub scope: CreditScope,
}

impl FairnessPolicy {
    #[must_use]
    pub const fn new(window: WindowPolicy, scope: CreditScope) -> Self {
        Self { window, scope }
    }

    fn counts(&self, record: &AssignmentRecord, chore_title: &str) -> bool {
        match self.scope {
            CreditScope::PerChore => record.chore_title == chore_title,
            CreditScope::Total => true,
        }
    }
}

/// Accumulated credit per roster member.
///
/// Everyone on the roster starts at zero. Assignees who have since left the
/// roster are ignored.
pub fn credit_by_person<'a, I>(records: I, roster: &[Person]) -> BTreeMap<PersonId, f64>
where
    I: IntoIterator<Item = &'a AssignmentRecord>,
{
    let mut credit: BTreeMap<PersonId, f64> =
        roster.iter().map(|person| (person.id.clone(), 0.0)).collect();
    for record in records {
        let share = record.credit_share();
        for person in &record.assignees {
            if let Some(total) = credit.get_mut(person) {
                *total += share;
            }
        }
    }
    credit
}

/// Compute this cycle's scheduled assignments.
///
/// Chores that are manual-only, have no recurrence, or were already
/// completed for the current cycle are skipped. Nothing is persisted.
///
/// # Errors
///
/// Returns [`RotaError::EmptyRoster`] when `roster` is empty.
pub fn allocate<Tz, R>(
    chores: &[Chore],
    roster: &[Person],
    history: &[AssignmentRecord],
    policy: &FairnessPolicy,
    now: &DateTime<Tz>,
    rng: &mut R,
) -> Result<Vec<NewAssignment>>
where
    Tz: TimeZone,
    R: Rng + ?Sized,
{
    if roster.is_empty() {
        return Err(RotaError::EmptyRoster);
    }

    let cycle = CycleId::containing(now).key();
    let windowed = policy.window.filter(history, now);
    let finished: BTreeSet<&str> = history
        .iter()
        .filter(|record| record.cycle == cycle && record.completed && !record.is_adhoc())
        .map(|record| record.chore_title.as_str())
        .collect();

    let pending: Vec<&Chore> = chores
        .iter()
        .filter(|chore| chore.is_scheduled() && !finished.contains(chore.title.as_str()))
        .collect();
    let total_slots: usize = pending.iter().map(|chore| chore.slots()).sum();
    let mut picker = Picker {
        roster,
        batch: BTreeSet::new(),
        spread: roster.len() >= total_slots,
    };

    // Under total scope, chores handed out earlier in this run count too.
    let mut run_credit: BTreeMap<PersonId, f64> = BTreeMap::new();
    let created_at_us = now.timestamp_micros();
    let mut out = Vec::with_capacity(pending.len());
    for chore in pending {
        let mut credit = credit_by_person(
            windowed
                .iter()
                .copied()
                .filter(|record| policy.counts(record, &chore.title)),
            roster,
        );
        for (person, extra) in &run_credit {
            if let Some(total) = credit.get_mut(person) {
                *total += extra;
            }
        }

        let assignees = picker.pick_many(&credit, chore.slots(), rng);
        if policy.scope == CreditScope::Total {
            #[allow(clippy::cast_precision_loss)]
            let share = 1.0 / assignees.len().max(1) as f64;
            for person in &assignees {
                *run_credit.entry(person.clone()).or_insert(0.0) += share;
            }
        }
        tracing::debug!(
            chore = %chore.title,
            cycle = %cycle,
            assignees = ?assignees,
            "allocated chore"
        );

        let due_at_us = next_due_us(chore.recurrence.as_ref(), now);
        out.push(NewAssignment::scheduled(
            cycle.clone(),
            chore.title.clone(),
            assignees,
            created_at_us,
            due_at_us,
        )?);
    }

    Ok(out)
}

/// Pick assignees for one ad-hoc request of `chore`.
///
/// Uses the same credit rule as the scheduled run, without batch spreading.
///
/// # Errors
///
/// Returns [`RotaError::EmptyRoster`] when `roster` is empty.
pub fn allocate_adhoc<Tz, R>(
    chore: &Chore,
    roster: &[Person],
    history: &[AssignmentRecord],
    policy: &FairnessPolicy,
    now: &DateTime<Tz>,
    requester: &PersonId,
    rng: &mut R,
) -> Result<NewAssignment>
where
    Tz: TimeZone,
    R: Rng + ?Sized,
{
    if roster.is_empty() {
        return Err(RotaError::EmptyRoster);
    }

    let credit = credit_by_person(
        policy
            .window
            .filter(history, now)
            .into_iter()
            .filter(|record| policy.counts(record, &chore.title)),
        roster,
    );
    let mut picker = Picker {
        roster,
        batch: BTreeSet::new(),
        spread: false,
    };
    let assignees = picker.pick_many(&credit, chore.slots(), rng);
    tracing::debug!(
        chore = %chore.title,
        requester = %requester,
        assignees = ?assignees,
        "allocated ad-hoc chore"
    );

    NewAssignment::adhoc(
        CycleId::containing(now).key(),
        chore.title.clone(),
        assignees,
        now.timestamp_micros(),
        next_due_us(chore.recurrence.as_ref(), now),
        requester.clone(),
    )
}

struct Picker<'a> {
    roster: &'a [Person],
    /// People already given a chore earlier in this run.
    batch: BTreeSet<PersonId>,
    /// Enough people to give every slot to someone different.
    spread: bool,
}

impl Picker<'_> {
    fn pick_many<R: Rng + ?Sized>(
        &mut self,
        credit: &BTreeMap<PersonId, f64>,
        slots: usize,
        rng: &mut R,
    ) -> Vec<PersonId> {
        let mut picks: Vec<PersonId> = Vec::with_capacity(slots);
        while picks.len() < slots {
            let Some(person) = self.pick_one(credit, &picks, rng) else {
                break;
            };
            self.batch.insert(person.clone());
            picks.push(person);
        }
        picks
    }

    fn pick_one<R: Rng + ?Sized>(
        &self,
        credit: &BTreeMap<PersonId, f64>,
        exclude: &[PersonId],
        rng: &mut R,
    ) -> Option<PersonId> {
        let eligible: Vec<&PersonId> = self
            .roster
            .iter()
            .map(|person| &person.id)
            .filter(|id| !exclude.contains(id))
            .collect();
        let tied = lowest_credit(&eligible, credit);

        let fresh: Vec<&PersonId> = tied
            .iter()
            .copied()
            .filter(|id| !self.batch.contains(*id))
            .collect();
        if let Some(choice) = fresh.choose(rng) {
            return Some((*choice).clone());
        }

        if self.spread {
            let unassigned: Vec<&PersonId> = eligible
                .iter()
                .copied()
                .filter(|id| !self.batch.contains(*id))
                .collect();
            if let Some(choice) = lowest_credit(&unassigned, credit).choose(rng) {
                return Some((*choice).clone());
            }
        }

        tied.choose(rng).map(|choice| (*choice).clone())
    }
}

fn lowest_credit<'a>(people: &[&'a PersonId], credit: &BTreeMap<PersonId, f64>) -> Vec<&'a PersonId> {
    let score = |id: &PersonId| credit.get(id).copied().unwrap_or(0.0);
    let Some(min) = people.iter().map(|id| score(*id)).min_by(f64::total_cmp) else {
        return Vec::new();
    };
    people
        .iter()
        .copied()
        .filter(|id| score(*id) <= min + CREDIT_EPSILON)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordId, Recurrence};
    use chrono::{Utc, Weekday};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn now() -> DateTime<Utc> {
        // Friday of 2026-W42.
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn roster(ids: &[&str]) -> Vec<Person> {
        ids.iter().map(|id| Person::new(*id, id.to_uppercase())).collect()
    }

    fn weekly(title: &str) -> Chore {
        Chore::new(title, Some(Recurrence::new(Weekday::Sun, 18, 0)))
    }

    fn past(id: i64, cycle: &str, chore: &str, people: &[&str], completed: bool) -> AssignmentRecord {
        let new = NewAssignment::scheduled(
            cycle,
            chore,
            people.iter().map(|p| PersonId::from(*p)).collect(),
            now().timestamp_micros() - 1_000,
            None,
        )
        .expect("valid record");
        let mut record = AssignmentRecord::from_new(RecordId(id), new);
        if completed {
            for person in people {
                record.confirm(&PersonId::from(*person), 0).expect("assignee");
            }
        }
        record
    }

    #[test]
    fn empty_roster_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = allocate(
            &[weekly("Dishes")],
            &[],
            &[],
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect_err("no roster");
        assert!(matches!(err, RotaError::EmptyRoster));
    }

    #[test]
    fn lowest_credit_person_wins() {
        let history = vec![
            past(1, "2026-W40", "Dishes", &["ana"], true),
            past(2, "2026-W41", "Dishes", &["bo"], true),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let out = allocate(
            &[weekly("Dishes")],
            &roster(&["ana", "bo", "cy"]),
            &history,
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].assignees, vec![PersonId::from("cy")]);
        assert_eq!(out[0].cycle, "2026-W42");
        assert!(out[0].due_at_us.is_some());
    }

    #[test]
    fn shared_records_count_half() {
        let history = vec![
            past(1, "2026-W40", "Dishes", &["ana", "bo"], true),
            past(2, "2026-W41", "Dishes", &["ana"], true),
        ];
        let credit = credit_by_person(&history, &roster(&["ana", "bo"]));
        assert!((credit[&PersonId::from("ana")] - 1.5).abs() < CREDIT_EPSILON);
        assert!((credit[&PersonId::from("bo")] - 0.5).abs() < CREDIT_EPSILON);
    }

    #[test]
    fn batch_spreads_chores_across_people() {
        let mut rng = StdRng::seed_from_u64(3);
        let chores = [weekly("Dishes"), weekly("Trash"), weekly("Floors")];
        let out = allocate(
            &chores,
            &roster(&["ana", "bo", "cy"]),
            &[],
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");

        let people: BTreeSet<_> = out.iter().flat_map(|r| r.assignees.clone()).collect();
        assert_eq!(people.len(), 3);
    }

    #[test]
    fn spreading_widens_past_the_tie_set() {
        // Ana has the lowest credit for both chores, but she must not take
        // both while bo is free.
        let history = vec![
            past(1, "2026-W40", "Dishes", &["bo"], true),
            past(2, "2026-W40", "Trash", &["bo"], true),
        ];
        let mut rng = StdRng::seed_from_u64(11);
        let out = allocate(
            &[weekly("Dishes"), weekly("Trash")],
            &roster(&["ana", "bo"]),
            &history,
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out[0].assignees, vec![PersonId::from("ana")]);
        assert_eq!(out[1].assignees, vec![PersonId::from("bo")]);
    }

    #[test]
    fn more_chores_than_people_repeats_from_tie_set() {
        let mut rng = StdRng::seed_from_u64(5);
        let chores = [weekly("Dishes"), weekly("Trash"), weekly("Floors")];
        let out = allocate(
            &chores,
            &roster(&["ana", "bo"]),
            &[],
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out.len(), 3);
        let people: BTreeSet<_> = out.iter().flat_map(|r| r.assignees.clone()).collect();
        assert_eq!(people.len(), 2);
    }

    #[test]
    fn skips_manual_and_completed_chores() {
        let history = vec![past(1, "2026-W42", "Dishes", &["ana"], true)];
        let chores = [
            weekly("Dishes"),
            weekly("Laundry").manual_only(),
            Chore::new("Trash", None),
            weekly("Floors"),
        ];
        let mut rng = StdRng::seed_from_u64(2);
        let out = allocate(
            &chores,
            &roster(&["ana", "bo"]),
            &history,
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");
        let titles: Vec<_> = out.iter().map(|r| r.chore_title.as_str()).collect();
        assert_eq!(titles, vec!["Floors"]);
    }

    #[test]
    fn headcount_picks_distinct_people() {
        let mut rng = StdRng::seed_from_u64(9);
        let out = allocate(
            &[weekly("Deep clean kitchen").with_headcount(2)],
            &roster(&["ana", "bo", "cy"]),
            &[],
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out[0].assignees.len(), 2);
        assert_ne!(out[0].assignees[0], out[0].assignees[1]);
    }

    #[test]
    fn headcount_larger_than_roster_takes_everyone() {
        let mut rng = StdRng::seed_from_u64(9);
        let out = allocate(
            &[weekly("Move furniture").with_headcount(5)],
            &roster(&["ana", "bo"]),
            &[],
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out[0].assignees.len(), 2);
    }

    #[test]
    fn total_scope_counts_every_chore() {
        let history = vec![
            past(1, "2026-W41", "Trash", &["ana"], true),
            past(2, "2026-W41", "Floors", &["ana"], true),
            past(3, "2026-W41", "Dishes", &["bo"], true),
        ];
        let policy = FairnessPolicy::new(WindowPolicy::default(), CreditScope::Total);
        let mut rng = StdRng::seed_from_u64(4);
        let out = allocate(
            &[weekly("Dishes")],
            &roster(&["ana", "bo"]),
            &history,
            &policy,
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out[0].assignees, vec![PersonId::from("bo")]);
    }

    #[test]
    fn records_outside_window_are_forgotten() {
        let mut old = past(1, "2026-W20", "Dishes", &["bo"], true);
        old.created_at_us = Utc
            .with_ymd_and_hms(2026, 5, 12, 9, 0, 0)
            .single()
            .expect("valid instant")
            .timestamp_micros();
        let history = vec![old, past(2, "2026-W41", "Dishes", &["ana"], true)];
        let mut rng = StdRng::seed_from_u64(6);
        let out = allocate(
            &[weekly("Dishes")],
            &roster(&["ana", "bo"]),
            &history,
            &FairnessPolicy::default(),
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out[0].assignees, vec![PersonId::from("bo")]);
    }

    #[test]
    fn unbounded_rolling_window_reaches_back_without_overflow() {
        let history = vec![past(1, "2026-W41", "Dishes", &["ana"], true)];
        let policy = FairnessPolicy::new(WindowPolicy::Rolling { cycles: u32::MAX }, CreditScope::PerChore);
        let mut rng = StdRng::seed_from_u64(12);
        let out = allocate(
            &[weekly("Dishes")],
            &roster(&["ana", "bo"]),
            &history,
            &policy,
            &now(),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(out[0].assignees, vec![PersonId::from("bo")]);
    }

    #[test]
    fn adhoc_allocation_records_requester() {
        let history = vec![past(1, "2026-W41", "Trash", &["ana"], true)];
        let mut rng = StdRng::seed_from_u64(8);
        let record = allocate_adhoc(
            &Chore::new("Trash", None).with_category("trash"),
            &roster(&["ana", "bo"]),
            &history,
            &FairnessPolicy::default(),
            &now(),
            &PersonId::from("ana"),
            &mut rng,
        )
        .expect("allocate");
        assert_eq!(record.assignees, vec![PersonId::from("bo")]);
        assert_eq!(record.triggered_by, Some(PersonId::from("ana")));
        assert_eq!(record.due_at_us, None);
    }
}
