//! Timestamp utilities
//!
//! All stored timestamps are UTC. Calendar-day logic (daily leaderboards,
//! streaks, Triple Drop) works on UTC days; only the Early Bird / Night Owl
//! badges look at the submitter's local hour.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use std::sync::Mutex;

/// Largest accepted UTC offset in minutes (UTC+14:00 / UTC-14:00)
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Source of "now" for every component that stamps or windows data
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC calendar day
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

/// Manually driven clock for tests and backfills
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.lock();
        *current += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid instant
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Start of the UTC day containing `instant`
pub fn start_of_utc_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(instant)
}

/// Hour of day (0-23) on the submitter's wall clock
pub fn local_hour(instant: DateTime<Utc>, utc_offset_minutes: i32) -> u32 {
    (instant + Duration::minutes(i64::from(utc_offset_minutes))).hour()
}

/// Convert stored epoch milliseconds back into a timestamp
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), start + Duration::days(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn test_start_of_utc_day() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let start = start_of_utc_day(instant);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_local_hour_applies_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 3, 30, 0).unwrap();
        assert_eq!(local_hour(instant, 0), 3);
        // UTC-5: previous evening
        assert_eq!(local_hour(instant, -300), 22);
        // UTC+9
        assert_eq!(local_hour(instant, 540), 12);
    }

    #[test]
    fn test_millis_round_trip_is_exact() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap();
        assert_eq!(from_millis(instant.timestamp_millis()), instant);
    }
}
