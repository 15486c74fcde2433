//! Calendar arithmetic for reminders and team commands
//!
//! All functions are pure. Calendar steps (days, weeks, months) happen in the
//! reminder's own time zone so the wall-clock time of day is kept across DST
//! changes; custom intervals are plain minute arithmetic.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Add working-day and business-hours helpers for burndown and PR metrics
//! - 1.0.0: Day filters, interval advance, next legal day probe

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::model::{DayFilter, DayOfWeek, RecurrenceInterval};
use crate::core::{ReminderError, ReminderResult};

/// Default number of +1 day probes before a day filter is declared unsatisfiable
pub const DEFAULT_PROBE_BUDGET: u32 = 14;

/// The weekday of `instant` as seen in `tz`
pub fn day_of_week(instant: DateTime<Utc>, tz: Tz) -> DayOfWeek {
    instant.with_timezone(&tz).weekday().into()
}

pub fn is_weekend(instant: DateTime<Utc>, tz: Tz) -> bool {
    day_of_week(instant, tz).is_weekend()
}

/// True when there is no filter, or the local day passes it
pub fn matches_day_filter(instant: DateTime<Utc>, tz: Tz, filter: Option<&DayFilter>) -> bool {
    match filter {
        Some(filter) => filter.allows(day_of_week(instant, tz)),
        None => true,
    }
}

/// Move `instant` forward by exactly one interval step
///
/// Monthly steps keep the day of month, clamped to the last day of shorter months.
pub fn advance(instant: DateTime<Utc>, tz: Tz, interval: &RecurrenceInterval) -> DateTime<Utc> {
    let local = instant.with_timezone(&tz).naive_local();
    let stepped = match interval {
        RecurrenceInterval::Custom { minutes } => {
            return instant + Duration::minutes(i64::from(*minutes));
        }
        RecurrenceInterval::Daily => local.checked_add_days(Days::new(1)),
        RecurrenceInterval::Weekly => local.checked_add_days(Days::new(7)),
        RecurrenceInterval::Monthly => local.checked_add_months(Months::new(1)),
    };

    match stepped {
        Some(next) => resolve_local(tz, next),
        // Only reachable at the end of chrono's representable range
        None => instant,
    }
}

/// Step forward one day at a time until the day filter is satisfied
///
/// Checks at most `max_probe` candidate days starting with `instant` itself.
pub fn next_legal_day(
    instant: DateTime<Utc>,
    tz: Tz,
    filter: Option<&DayFilter>,
    max_probe: u32,
) -> ReminderResult<DateTime<Utc>> {
    let mut candidate = instant;
    for _ in 0..max_probe {
        if matches_day_filter(candidate, tz, filter) {
            return Ok(candidate);
        }
        candidate = advance(candidate, tz, &RecurrenceInterval::Daily);
    }
    Err(ReminderError::NoLegalDay { probes: max_probe })
}

/// Map a local wall-clock time to an instant
///
/// Ambiguous times take the earlier instant; times inside a DST gap move to
/// the first valid instant after it.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return dt.with_timezone(&Utc);
    }

    let mut probe = local;
    for _ in 0..(24 * 4) {
        probe += Duration::minutes(15);
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt.with_timezone(&Utc);
        }
    }
    // No zone has a gap this long; treat the wall time as UTC
    Utc.from_utc_datetime(&local)
}

/// Number of Monday-Friday dates in `start..=end`
pub fn working_days_between(start: NaiveDate, end: NaiveDate) -> u32 {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !DayOfWeek::from(d.weekday()).is_weekend())
        .count() as u32
}

/// The `n`th working day counting `start` as the first candidate (1-based)
pub fn nth_working_day(start: NaiveDate, n: u32) -> NaiveDate {
    if n == 0 {
        return start;
    }
    start
        .iter_days()
        .filter(|d| !DayOfWeek::from(d.weekday()).is_weekend())
        .nth((n - 1) as usize)
        .unwrap_or(start)
}

/// Elapsed hours between two instants, not counting Saturdays and Sundays in `tz`
pub fn business_hours_between(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> f64 {
    if end <= start {
        return 0.0;
    }

    let mut total = Duration::zero();
    let mut cursor = start;
    while cursor < end {
        let local_date = cursor.with_timezone(&tz).date_naive();
        let next_midnight = local_date
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|midnight| resolve_local(tz, midnight))
            .unwrap_or(end);
        let segment_end = next_midnight.min(end);

        if !is_weekend(cursor, tz) {
            total = total + (segment_end - cursor);
        }
        if segment_end <= cursor {
            break;
        }
        cursor = segment_end;
    }

    total.num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const TOKYO: Tz = chrono_tz::Asia::Tokyo;

    fn tokyo(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        TOKYO
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
        instant.with_timezone(&tz).date_naive()
    }

    #[test]
    fn test_is_weekend_uses_zone() {
        // Friday 23:30 UTC is already Saturday in Tokyo
        let instant = Utc.with_ymd_and_hms(2024, 7, 19, 23, 30, 0).unwrap();
        assert!(!is_weekend(instant, chrono_tz::UTC));
        assert!(is_weekend(instant, TOKYO));
    }

    #[test]
    fn test_matches_day_filter() {
        let saturday = tokyo(2024, 7, 20, 9, 0);
        let monday = tokyo(2024, 7, 22, 9, 0);
        let weekdays = DayFilter::weekdays_only();
        let mondays = DayFilter::only([DayOfWeek::Monday]);

        assert!(matches_day_filter(saturday, TOKYO, None));
        assert!(!matches_day_filter(saturday, TOKYO, Some(&weekdays)));
        assert!(matches_day_filter(monday, TOKYO, Some(&weekdays)));
        assert!(matches_day_filter(monday, TOKYO, Some(&mondays)));
        assert!(!matches_day_filter(tokyo(2024, 7, 23, 9, 0), TOKYO, Some(&mondays)));
    }

    #[test]
    fn test_advance_daily_and_weekly() {
        let start = tokyo(2024, 7, 19, 9, 0);
        assert_eq!(
            advance(start, TOKYO, &RecurrenceInterval::Daily),
            tokyo(2024, 7, 20, 9, 0)
        );
        assert_eq!(
            advance(start, TOKYO, &RecurrenceInterval::Weekly),
            tokyo(2024, 7, 26, 9, 0)
        );
    }

    #[test]
    fn test_advance_monthly_clamps() {
        let leap = tokyo(2024, 1, 31, 9, 0);
        assert_eq!(
            advance(leap, TOKYO, &RecurrenceInterval::Monthly),
            tokyo(2024, 2, 29, 9, 0)
        );

        let common = tokyo(2023, 1, 31, 9, 0);
        assert_eq!(
            advance(common, TOKYO, &RecurrenceInterval::Monthly),
            tokyo(2023, 2, 28, 9, 0)
        );

        let thirty = tokyo(2024, 3, 31, 9, 0);
        assert_eq!(
            advance(thirty, TOKYO, &RecurrenceInterval::Monthly),
            tokyo(2024, 4, 30, 9, 0)
        );
    }

    #[test]
    fn test_advance_custom_is_minute_arithmetic() {
        let start = Utc.with_ymd_and_hms(2024, 2, 28, 23, 0, 0).unwrap();
        assert_eq!(
            advance(start, TOKYO, &RecurrenceInterval::Custom { minutes: 90 }),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_advance_daily_keeps_wall_clock_across_dst() {
        let ny = chrono_tz::America::New_York;
        // DST starts 2024-03-10 in New York
        let before = ny
            .with_ymd_and_hms(2024, 3, 9, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let after = advance(before, ny, &RecurrenceInterval::Daily);
        let local = after.with_timezone(&ny);
        assert_eq!(local.hour(), 9);
        assert_eq!(local.day(), 10);
        assert_eq!(after - before, Duration::hours(23));
    }

    #[test]
    fn test_resolve_local_inside_gap() {
        let ny = chrono_tz::America::New_York;
        let gap = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = resolve_local(ny, gap).with_timezone(&ny);
        assert_eq!(resolved.hour(), 3);
    }

    #[test]
    fn test_next_legal_day_skips_weekend() {
        let saturday = tokyo(2024, 7, 20, 9, 0);
        let next =
            next_legal_day(saturday, TOKYO, Some(&DayFilter::weekdays_only()), 14).unwrap();
        assert_eq!(next, tokyo(2024, 7, 22, 9, 0));
    }

    #[test]
    fn test_next_legal_day_is_identity_on_legal_day() {
        let monday = tokyo(2024, 7, 22, 9, 0);
        assert_eq!(
            next_legal_day(monday, TOKYO, Some(&DayFilter::weekdays_only()), 14).unwrap(),
            monday
        );
        assert_eq!(next_legal_day(monday, TOKYO, None, 14).unwrap(), monday);
    }

    #[test]
    fn test_next_legal_day_exhausts_budget() {
        let filter = DayFilter {
            skip_weekends: true,
            allowed_days: Some([DayOfWeek::Saturday, DayOfWeek::Sunday].into_iter().collect()),
        };
        let err = next_legal_day(tokyo(2024, 7, 22, 9, 0), TOKYO, Some(&filter), 14).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_next_legal_day_small_budget() {
        // Wednesday-only needs seven candidates from Thursday
        let thursday = tokyo(2024, 7, 18, 9, 0);
        let wednesdays = DayFilter::only([DayOfWeek::Wednesday]);
        assert!(next_legal_day(thursday, TOKYO, Some(&wednesdays), 3).is_err());
        let next = next_legal_day(thursday, TOKYO, Some(&wednesdays), 14).unwrap();
        assert_eq!(local_date(next, TOKYO), NaiveDate::from_ymd_opt(2024, 7, 24).unwrap());
    }

    #[test]
    fn test_working_days_between() {
        let mon = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        let sun = NaiveDate::from_ymd_opt(2024, 7, 21).unwrap();
        let next_fri = NaiveDate::from_ymd_opt(2024, 7, 26).unwrap();
        assert_eq!(working_days_between(mon, sun), 5);
        assert_eq!(working_days_between(mon, next_fri), 10);
        assert_eq!(working_days_between(sun, mon), 0);
    }

    #[test]
    fn test_nth_working_day() {
        let fri = NaiveDate::from_ymd_opt(2024, 7, 19).unwrap();
        assert_eq!(nth_working_day(fri, 1), fri);
        assert_eq!(nth_working_day(fri, 2), NaiveDate::from_ymd_opt(2024, 7, 22).unwrap());
    }

    #[test]
    fn test_business_hours_between() {
        let utc = chrono_tz::UTC;
        let fri_noon = Utc.with_ymd_and_hms(2024, 7, 19, 12, 0, 0).unwrap();
        let mon_noon = Utc.with_ymd_and_hms(2024, 7, 22, 12, 0, 0).unwrap();
        // 12h of Friday + 12h of Monday
        assert_eq!(business_hours_between(fri_noon, mon_noon, utc), 24.0);

        let tue = Utc.with_ymd_and_hms(2024, 7, 23, 8, 0, 0).unwrap();
        let tue_later = Utc.with_ymd_and_hms(2024, 7, 23, 10, 30, 0).unwrap();
        assert_eq!(business_hours_between(tue, tue_later, utc), 2.5);
        assert_eq!(business_hours_between(tue_later, tue, utc), 0.0);
    }
}
