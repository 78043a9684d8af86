//! Due-date calculation for weekly recurrences.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};

use crate::model::Recurrence;

/// Next due instant for `recurrence`, anchored on `reference`.
///
/// The target is the configured weekday of the reference's Monday-based
/// week at `hour:minute:00`, shifted by `cycle_offset` weeks. With an offset
/// of zero a target earlier than `reference` rolls forward one week, so a
/// freshly computed due date is never in the past. Non-zero offsets already
/// pin the target cycle and are returned as-is.
///
/// Returns `None` for manually triggered chores and for recurrences whose
/// wall-clock time does not exist.
#[must_use]
pub fn next_due<Tz: TimeZone>(
    recurrence: Option<&Recurrence>,
    reference: &DateTime<Tz>,
    cycle_offset: i64,
) -> Option<DateTime<Tz>> {
    let recurrence = recurrence?;
    let date = reference.date_naive();
    let shift = i64::from(recurrence.weekday.num_days_from_monday())
        - i64::from(date.weekday().num_days_from_monday());
    let target = date + Duration::days(shift) + Duration::weeks(cycle_offset);

    let tz = reference.timezone();
    let due = local_at(&tz, target, recurrence)?;
    if cycle_offset == 0 && due < *reference {
        return local_at(&tz, target + Duration::weeks(1), recurrence);
    }
    Some(due)
}

/// [`next_due`] in microseconds since the epoch, as stored on records.
#[must_use]
pub fn next_due_us<Tz: TimeZone>(
    recurrence: Option<&Recurrence>,
    reference: &DateTime<Tz>,
) -> Option<i64> {
    next_due(recurrence, reference, 0).map(|due| due.timestamp_micros())
}

// Rebuilding from the local date keeps the wall-clock time stable across
// DST changes; adding 168 hours would not.
fn local_at<Tz: TimeZone>(tz: &Tz, date: NaiveDate, recurrence: &Recurrence) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(recurrence.hour, recurrence.minute, 0)?;
    tz.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("valid instant")
    }

    const MONDAY_TEN: Recurrence = Recurrence::new(Weekday::Mon, 10, 0);

    #[test]
    fn manual_chores_have_no_due_date() {
        assert_eq!(next_due(None, &at(2026, 10, 12, 9, 0), 0), None);
    }

    #[test]
    fn passed_due_time_rolls_to_next_week() {
        // Monday 11:00 reference, chore due Monday 10:00.
        let due = next_due(Some(&MONDAY_TEN), &at(2026, 10, 12, 11, 0), 0);
        assert_eq!(due, Some(at(2026, 10, 19, 10, 0)));
    }

    #[test]
    fn upcoming_due_time_stays_in_this_week() {
        let due = next_due(Some(&MONDAY_TEN), &at(2026, 10, 12, 9, 59), 0);
        assert_eq!(due, Some(at(2026, 10, 12, 10, 0)));
    }

    #[test]
    fn exact_due_instant_is_not_rolled() {
        let due = next_due(Some(&MONDAY_TEN), &at(2026, 10, 12, 10, 0), 0);
        assert_eq!(due, Some(at(2026, 10, 12, 10, 0)));
    }

    #[test]
    fn later_weekday_is_found_forward_in_week() {
        let sunday = Recurrence::new(Weekday::Sun, 19, 30);
        let due = next_due(Some(&sunday), &at(2026, 10, 16, 8, 0), 0);
        assert_eq!(due, Some(at(2026, 10, 18, 19, 30)));
    }

    #[test]
    fn earlier_weekday_rewinds_then_rolls() {
        // Friday reference, Tuesday chore: rewind to this Tuesday, which has
        // passed, so roll to next Tuesday.
        let tuesday = Recurrence::new(Weekday::Tue, 7, 0);
        let due = next_due(Some(&tuesday), &at(2026, 10, 16, 8, 0), 0);
        assert_eq!(due, Some(at(2026, 10, 20, 7, 0)));
    }

    #[test]
    fn offsets_skip_rollover() {
        let reference = at(2026, 10, 12, 11, 0);
        assert_eq!(
            next_due(Some(&MONDAY_TEN), &reference, 1),
            Some(at(2026, 10, 19, 10, 0))
        );
        assert_eq!(
            next_due(Some(&MONDAY_TEN), &reference, 2),
            Some(at(2026, 10, 26, 10, 0))
        );
        // A past offset is returned even though it is before the reference.
        assert_eq!(
            next_due(Some(&MONDAY_TEN), &reference, -1),
            Some(at(2026, 10, 5, 10, 0))
        );
    }

    #[test]
    fn due_is_computed_in_household_time() {
        let tz = FixedOffset::west_opt(5 * 3600).expect("offset");
        let reference = tz
            .with_ymd_and_hms(2026, 10, 12, 9, 0, 0)
            .single()
            .expect("valid local instant");
        let due = next_due(Some(&MONDAY_TEN), &reference, 0).expect("due date");
        assert_eq!(due.with_timezone(&Utc), at(2026, 10, 12, 15, 0));
    }

    #[test]
    fn impossible_wall_clock_yields_none() {
        let bogus = Recurrence::new(Weekday::Mon, 25, 0);
        assert_eq!(next_due(Some(&bogus), &at(2026, 10, 12, 9, 0), 0), None);
    }
}
