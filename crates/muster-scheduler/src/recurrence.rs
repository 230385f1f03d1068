//! Next-fire computation: HH:MM local time + IANA zone → UTC instant,
//! weekdays only. Weekend skipping happens here at the recurrence level;
//! holiday skipping is the invoked operation's own workday gate.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use muster_core::error::{MusterError, Result};

/// Parse an "HH:MM" local time string.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| MusterError::Parse(format!("Bad time '{s}' (expected HH:MM): {e}")))
}

/// The next instant strictly after `after` at which `local_time` occurs on a
/// weekday in `tz`, expressed in UTC.
///
/// Deterministic for a fixed `after`: recomputing with unchanged config
/// yields the same instant. A local time skipped by a DST gap falls through
/// to the next weekday occurrence.
pub fn next_weekday_fire(after: DateTime<Utc>, local_time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let mut date = after.with_timezone(&tz).date_naive();
    // A week is enough to clear any run of weekend days plus a DST gap.
    for _ in 0..8 {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
            && let Some(local) = tz.from_local_datetime(&date.and_time(local_time)).earliest()
        {
            let instant = local.with_timezone(&Utc);
            if instant > after {
                return instant;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    // Out of calendar range; nothing sane to arm.
    after + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("08:00").unwrap(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(parse_hhmm(" 23:59 ").unwrap(), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert!(parse_hhmm("8am").is_err());
        assert!(parse_hhmm("25:00").is_err());
    }

    #[test]
    fn test_same_day_when_time_still_ahead() {
        // Monday 2024-10-28, 06:00 UTC; 08:00 UTC target fires the same day.
        let after = utc(2024, 10, 28, 6, 0);
        let next = next_weekday_fire(after, parse_hhmm("08:00").unwrap(), chrono_tz::UTC);
        assert_eq!(next, utc(2024, 10, 28, 8, 0));
    }

    #[test]
    fn test_rolls_to_next_day_when_time_passed() {
        let after = utc(2024, 10, 28, 9, 0);
        let next = next_weekday_fire(after, parse_hhmm("08:00").unwrap(), chrono_tz::UTC);
        assert_eq!(next, utc(2024, 10, 29, 8, 0));
    }

    #[test]
    fn test_friday_evening_rolls_over_weekend() {
        // Friday 2024-10-25 after the firing time → Monday 2024-10-28.
        let after = utc(2024, 10, 25, 12, 0);
        let next = next_weekday_fire(after, parse_hhmm("08:00").unwrap(), chrono_tz::UTC);
        assert_eq!(next, utc(2024, 10, 28, 8, 0));
    }

    #[test]
    fn test_saturday_rolls_to_monday() {
        let after = utc(2024, 10, 26, 0, 0);
        let next = next_weekday_fire(after, parse_hhmm("08:00").unwrap(), chrono_tz::UTC);
        assert_eq!(next, utc(2024, 10, 28, 8, 0));
    }

    #[test]
    fn test_local_time_converts_through_zone() {
        // 08:00 in New York on 2024-10-28 (EDT, UTC-4) is 12:00 UTC.
        let after = utc(2024, 10, 28, 6, 0);
        let next = next_weekday_fire(
            after,
            parse_hhmm("08:00").unwrap(),
            chrono_tz::America::New_York,
        );
        assert_eq!(next, utc(2024, 10, 28, 12, 0));
    }

    #[test]
    fn test_dst_transition_shifts_utc_instant() {
        // US DST ends 2024-11-03 (a Sunday). Friday 11-01 08:00 EDT is
        // 12:00 UTC; Monday 11-04 08:00 EST is 13:00 UTC.
        let tz = chrono_tz::America::New_York;
        let before = next_weekday_fire(utc(2024, 11, 1, 6, 0), parse_hhmm("08:00").unwrap(), tz);
        assert_eq!(before, utc(2024, 11, 1, 12, 0));
        let after = next_weekday_fire(utc(2024, 11, 1, 20, 0), parse_hhmm("08:00").unwrap(), tz);
        assert_eq!(after, utc(2024, 11, 4, 13, 0));
    }

    #[test]
    fn test_deterministic_for_fixed_after() {
        let after = utc(2024, 10, 28, 6, 0);
        let time = parse_hhmm("09:30").unwrap();
        let a = next_weekday_fire(after, time, chrono_tz::Europe::Berlin);
        let b = next_weekday_fire(after, time, chrono_tz::Europe::Berlin);
        assert_eq!(a, b);
    }
}
