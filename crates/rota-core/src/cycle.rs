//! Accounting periods: ISO-week cycles, calendar months, and the fairness
//! lookback window built from them.

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::model::AssignmentRecord;
use crate::store::RecordQuery;

/// One weekly cycle, identified by the Monday it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId {
    monday: NaiveDate,
}

impl CycleId {
    /// The cycle containing `at`, in `at`'s own timezone.
    #[must_use]
    pub fn containing<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self::containing_date(at.date_naive())
    }

    #[must_use]
    pub fn containing_date(date: NaiveDate) -> Self {
        let back = i64::from(date.weekday().num_days_from_monday());
        Self {
            monday: date - Duration::days(back),
        }
    }

    #[must_use]
    pub const fn monday(&self) -> NaiveDate {
        self.monday
    }

    /// The cycle `n` weeks before this one, or `None` past the calendar's
    /// earliest representable date.
    #[must_use]
    pub fn previous(&self, n: u32) -> Option<Self> {
        self.monday
            .checked_sub_days(Days::new(u64::from(n) * 7))
            .map(|monday| Self { monday })
    }

    /// Midnight at the start of the cycle in `tz`.
    #[must_use]
    pub fn start_in<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<Tz> {
        local_midnight(tz, self.monday)
    }

    /// Stable key stored on every record, e.g. `2026-W42`.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let week = self.monday.iso_week();
        write!(f, "{}-W{:02}", week.year(), week.week())
    }
}

impl FromStr for CycleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, week) = s
            .trim()
            .split_once("-W")
            .ok_or_else(|| format!("'{s}' is not a cycle key like 2026-W42"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("bad year in cycle key '{s}'"))?;
        let week: u32 = week
            .parse()
            .map_err(|_| format!("bad week in cycle key '{s}'"))?;
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
            .map(|monday| Self { monday })
            .ok_or_else(|| format!("week {week} does not exist in {year}"))
    }
}

/// A calendar month, used by the monthly-reset fairness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPeriod {
    first: NaiveDate,
}

impl MonthPeriod {
    #[must_use]
    pub fn containing<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        let date = at.date_naive();
        Self {
            first: date - Duration::days(i64::from(date.day0())),
        }
    }

    #[must_use]
    pub fn start_in<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<Tz> {
        local_midnight(tz, self.first)
    }

    /// Midnight at the start of the following month in `tz`.
    #[must_use]
    pub fn end_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.first
            .checked_add_months(Months::new(1))
            .map(|next| local_midnight(tz, next))
    }

    /// Key like `2026-10`.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.first.year(), self.first.month())
    }
}

/// How far back the allocator looks when counting credit.
///
/// The two modes are exclusive: either a rolling run of weekly cycles, or
/// everything since the start of the current calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "window", rename_all = "snake_case")]
pub enum WindowPolicy {
    Rolling { cycles: u32 },
    #[serde(alias = "month")]
    CalendarMonth,
}

/// Default rolling lookback, in weekly cycles.
pub const DEFAULT_WINDOW_CYCLES: u32 = 8;

/// Longest rolling lookback a household config may ask for (ten years).
pub const MAX_WINDOW_CYCLES: u32 = 520;

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::Rolling {
            cycles: DEFAULT_WINDOW_CYCLES,
        }
    }
}

impl WindowPolicy {
    /// First cycle that still counts under a rolling window at `now`.
    ///
    /// A rolling window of `n` cycles covers the current cycle and the
    /// `n - 1` before it. Windows reaching past the calendar start at its
    /// earliest week.
    fn first_cycle<Tz: TimeZone>(cycles: u32, now: &DateTime<Tz>) -> CycleId {
        let current = CycleId::containing(now);
        current
            .previous(cycles.saturating_sub(1))
            .unwrap_or_else(|| CycleId::containing_date(NaiveDate::MIN + Duration::weeks(1)))
    }

    /// First instant that still counts toward fairness at `now`.
    #[must_use]
    pub fn window_start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        match *self {
            Self::Rolling { cycles } => Self::first_cycle(cycles, now).start_in(&tz),
            Self::CalendarMonth => MonthPeriod::containing(now).start_in(&tz),
        }
    }

    /// Whether `record` counts toward fairness at `now`.
    ///
    /// Rolling windows go by the cycle the record was assigned for, so an
    /// imported record counts for its own week whatever its creation time.
    /// Records with an unreadable cycle key never count. The monthly window
    /// goes by creation time within the current month.
    #[must_use]
    pub fn contains<Tz: TimeZone>(&self, record: &AssignmentRecord, now: &DateTime<Tz>) -> bool {
        match *self {
            Self::Rolling { cycles } => {
                let first = Self::first_cycle(cycles, now);
                let current = CycleId::containing(now);
                record
                    .cycle
                    .parse::<CycleId>()
                    .is_ok_and(|cycle| first <= cycle && cycle <= current)
            }
            Self::CalendarMonth => {
                let month = MonthPeriod::containing(now);
                let tz = now.timezone();
                let start_us = month.start_in(&tz).timestamp_micros();
                let end_us = month
                    .end_in(&tz)
                    .map_or(i64::MAX, |end| end.timestamp_micros());
                (start_us..end_us).contains(&record.created_at_us)
            }
        }
    }

    /// Records from `history` that fall inside the window at `now`.
    #[must_use]
    pub fn filter<'a, Tz: TimeZone>(
        &self,
        history: &'a [AssignmentRecord],
        now: &DateTime<Tz>,
    ) -> Vec<&'a AssignmentRecord> {
        history
            .iter()
            .filter(|record| self.contains(record, now))
            .collect()
    }

    /// Ledger query covering the window plus the whole current cycle.
    ///
    /// The store narrows the candidates and [`Self::filter`] makes the
    /// final cut.
    #[must_use]
    pub fn history_query<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RecordQuery {
        let current = CycleId::containing(now);
        match *self {
            Self::Rolling { cycles } => {
                RecordQuery::all().cycles_between(Self::first_cycle(cycles, now).key(), current.key())
            }
            Self::CalendarMonth => {
                let tz = now.timezone();
                let since = self.window_start(now).min(current.start_in(&tz));
                RecordQuery::all().created_since(since.timestamp_micros())
            }
        }
    }

    /// Announcement for the first day of a new accounting month.
    ///
    /// Only the calendar-month policy resets, so rolling windows never
    /// produce a notice.
    #[must_use]
    pub fn reset_notice<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<String> {
        match self {
            Self::CalendarMonth if now.day() == 1 => Some(format!(
                "New month, clean slate: chore credit resets for {}.",
                MonthPeriod::containing(now)
            )),
            _ => None,
        }
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn cycle_key_uses_iso_week() {
        // Friday 2026-10-16 is in ISO week 42.
        let cycle = CycleId::containing(&at(2026, 10, 16, 9));
        assert_eq!(cycle.key(), "2026-W42");
        assert_eq!(cycle.monday(), NaiveDate::from_ymd_opt(2026, 10, 12).expect("date"));
    }

    #[test]
    fn cycle_key_handles_iso_year_boundary() {
        // 2027-01-01 is a Friday, still ISO week 53 of 2026.
        let cycle = CycleId::containing(&at(2027, 1, 1, 12));
        assert_eq!(cycle.key(), "2026-W53");
        assert_eq!(
            CycleId::containing(&at(2027, 1, 4, 12)).previous(1),
            Some(cycle)
        );
    }

    #[test]
    fn cycle_key_round_trips_through_parse() {
        let parsed: CycleId = "2026-W42".parse().expect("parses");
        assert_eq!(parsed, CycleId::containing(&at(2026, 10, 14, 0)));
        assert!("2026-42".parse::<CycleId>().is_err());
        assert!("2025-W60".parse::<CycleId>().is_err());
    }

    #[test]
    fn rolling_window_covers_current_and_previous_cycles() {
        let now = at(2026, 10, 16, 9);
        let start = WindowPolicy::Rolling { cycles: 8 }.window_start(&now);
        // Monday of week 42 minus seven weeks.
        assert_eq!(start, at(2026, 8, 24, 0));

        let single = WindowPolicy::Rolling { cycles: 1 }.window_start(&now);
        assert_eq!(single, at(2026, 10, 12, 0));
    }

    #[test]
    fn previous_past_the_calendar_is_none() {
        let cycle = CycleId::containing(&at(2026, 10, 16, 9));
        assert!(cycle.previous(u32::MAX).is_none());
        assert!(WindowPolicy::Rolling { cycles: u32::MAX }.window_start(&at(2026, 10, 16, 9)) < at(1, 1, 1, 0));
    }

    fn record(cycle: &str, created: DateTime<Utc>) -> AssignmentRecord {
        let new = crate::model::NewAssignment::scheduled(
            cycle,
            "Dishes",
            vec!["ana".into()],
            created.timestamp_micros(),
            None,
        )
        .expect("valid record");
        AssignmentRecord::from_new(crate::model::RecordId(1), new)
    }

    #[test]
    fn rolling_window_goes_by_assigned_cycle() {
        let now = at(2026, 10, 16, 9);
        let window = WindowPolicy::Rolling { cycles: 2 };
        // Imported yesterday, but assigned for a week long gone.
        assert!(!window.contains(&record("2026-W30", now), &now));
        // Created long ago for last week.
        assert!(window.contains(&record("2026-W41", at(2026, 1, 5, 9)), &now));
        // Next week has not started yet.
        assert!(!window.contains(&record("2026-W43", now), &now));
        assert!(!window.contains(&record("week forty-two", now), &now));

        assert_eq!(
            window.history_query(&now).cycle_range,
            Some(("2026-W41".to_string(), "2026-W42".to_string()))
        );
    }

    #[test]
    fn month_window_ends_with_the_month() {
        let now = at(2026, 10, 16, 9);
        let window = WindowPolicy::CalendarMonth;
        assert!(window.contains(&record("2026-W40", at(2026, 10, 1, 0)), &now));
        assert!(!window.contains(&record("2026-W40", at(2026, 9, 30, 23)), &now));
        assert!(!window.contains(&record("2026-W45", at(2026, 11, 2, 8)), &now));
    }

    #[test]
    fn month_window_starts_on_the_first() {
        let now = at(2026, 10, 16, 9);
        assert_eq!(
            WindowPolicy::CalendarMonth.window_start(&now),
            at(2026, 10, 1, 0)
        );
    }

    #[test]
    fn window_respects_household_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        // 23:00 UTC Sunday is already Monday locally.
        let now = tz.from_utc_datetime(&at(2026, 10, 18, 23).naive_utc());
        assert_eq!(CycleId::containing(&now).key(), "2026-W43");
    }

    #[test]
    fn reset_notice_only_on_first_of_month_for_monthly_policy() {
        assert!(
            WindowPolicy::CalendarMonth
                .reset_notice(&at(2026, 11, 1, 8))
                .is_some_and(|text| text.contains("2026-11"))
        );
        assert!(WindowPolicy::CalendarMonth.reset_notice(&at(2026, 11, 2, 8)).is_none());
        assert!(WindowPolicy::default().reset_notice(&at(2026, 11, 1, 8)).is_none());
    }

    #[test]
    fn policy_parses_from_tagged_toml() {
        let rolling: WindowPolicy = toml::from_str("window = \"rolling\"\ncycles = 4\n").expect("rolling");
        assert_eq!(rolling, WindowPolicy::Rolling { cycles: 4 });
        let month: WindowPolicy = toml::from_str("window = \"month\"\n").expect("month");
        assert_eq!(month, WindowPolicy::CalendarMonth);
    }
}
