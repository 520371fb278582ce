//! Standard 5-field cron evaluation for the global-action schedule.
//!
//! The `cron` crate only walks forward from a given instant, so "the most
//! recent scheduled instant at or before `now`" (needed for the cold-start
//! window check and for detecting a missed boundary) is found by searching
//! increasingly wide lookback windows until one contains an occurrence.

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;

use crate::error::{Result, SchedulerError};

/// Lookback windows tried in order when hunting for the previous scheduled
/// instant. Covers everything from a every-few-minutes cron up to a
/// once-a-year one without iterating millions of occurrences for tight
/// schedules.
const LOOKBACK_WINDOWS_DAYS: &[i64] = &[1, 7, 35, 370];

pub fn parse(expression: &str) -> Result<Schedule> {
    // The `cron` crate expects a leading seconds field; stream-quality
    // schedules are specified with standard 5-field cron, so prepend "0".
    let with_seconds = format!("0 {expression}");
    Schedule::from_str(&with_seconds).map_err(|err| SchedulerError::InvalidCron(expression.to_string(), err.to_string()))
}

pub fn next_after(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&now).next()
}

pub fn previous_at_or_before(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for days in LOOKBACK_WINDOWS_DAYS {
        let start = now - Duration::days(*days);
        if let Some(found) = schedule.after(&start).take_while(|t| *t <= now).last() {
            return Some(found);
        }
    }
    None
}

/// Decide whether the global action is due right now, per the cold-start
/// rule: with no prior run recorded, only fire if `now` falls within ten
/// minutes of the most recent scheduled instant (otherwise wait for the
/// next one rather than firing immediately on every restart). With a prior
/// run recorded, fire once the most recent scheduled instant has moved past
/// it.
pub fn is_due(schedule: &Schedule, now: DateTime<Utc>, last_global_check: Option<DateTime<Utc>>) -> bool {
    let Some(prev_scheduled) = previous_at_or_before(schedule, now) else {
        return false;
    };

    match last_global_check {
        None => (now - prev_scheduled).abs() <= Duration::minutes(10),
        Some(last_check) => prev_scheduled > last_check,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn cold_start_within_window_fires() {
        let schedule = parse("0 3 * * *").unwrap();
        let now = at(2026, 7, 26, 3, 4);
        assert!(is_due(&schedule, now, None));
    }

    #[test]
    fn cold_start_outside_window_waits() {
        let schedule = parse("0 3 * * *").unwrap();
        let now = at(2026, 7, 26, 9, 0);
        assert!(!is_due(&schedule, now, None));
    }

    #[test]
    fn subsequent_run_fires_once_boundary_crossed() {
        let schedule = parse("0 3 * * *").unwrap();
        let last_check = at(2026, 7, 25, 3, 0);
        let now = at(2026, 7, 26, 3, 1);
        assert!(is_due(&schedule, now, Some(last_check)));
    }

    #[test]
    fn subsequent_run_does_not_refire_before_next_boundary() {
        let schedule = parse("0 3 * * *").unwrap();
        let last_check = at(2026, 7, 26, 3, 0);
        let now = at(2026, 7, 26, 14, 0);
        assert!(!is_due(&schedule, now, Some(last_check)));
    }

    #[test]
    fn next_after_returns_the_following_occurrence() {
        let schedule = parse("0 3 * * *").unwrap();
        let now = at(2026, 7, 26, 3, 1);
        let next = next_after(&schedule, now).unwrap();
        assert_eq!(next, at(2026, 7, 27, 3, 0));
    }
}
