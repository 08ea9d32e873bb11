//! Local calendar arithmetic. Every "day" in the wheel is a day in the
//! deployment's configured time zone, never a UTC day or a rolling 24 hours.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// First instant of `date` in `tz`. When midnight falls into a DST gap the
/// day starts at the first wall-clock time that exists.
pub fn start_of_local_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let mut wall_clock = date.and_time(NaiveTime::MIN);
    for _ in 0..96 {
        match tz.from_local_datetime(&wall_clock) {
            LocalResult::Single(start) => return start.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => wall_clock += Duration::minutes(15),
        }
    }
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn start_of_day_containing(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    start_of_local_day(local_date(now, tz), tz)
}

pub fn next_local_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let tomorrow = local_date(now, tz).succ_opt().unwrap_or(NaiveDate::MAX);
    start_of_local_day(tomorrow, tz)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_midnight_is_local_not_rolling() {
        // 23:59:30 in Paris during summer time (UTC+2).
        let now = utc("2025-06-14T21:59:30Z");
        let midnight = next_local_midnight(now, chrono_tz::Europe::Paris);
        assert_eq!(midnight, utc("2025-06-14T22:00:00Z"));
        assert_eq!((midnight - now).num_seconds(), 30);
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        let late_evening_utc = utc("2025-03-10T15:30:00Z");
        assert_eq!(
            local_date(late_evening_utc, chrono_tz::Asia::Tokyo),
            NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()
        );
        assert_eq!(
            local_date(late_evening_utc, chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
        );
    }

    #[test]
    fn test_day_start_skips_dst_gap_at_midnight() {
        // Sao Paulo moved clocks from 00:00 to 01:00 on 2018-11-04.
        let date = NaiveDate::from_ymd_opt(2018, 11, 4).unwrap();
        let start = start_of_local_day(date, chrono_tz::America::Sao_Paulo);
        assert_eq!(start, utc("2018-11-04T03:00:00Z"));
    }

    #[test]
    fn test_day_start_containing() {
        let now = utc("2025-01-05T12:00:00Z");
        assert_eq!(
            start_of_day_containing(now, chrono_tz::America::New_York),
            utc("2025-01-05T05:00:00Z")
        );
    }
}
