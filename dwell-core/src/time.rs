//! Calendar arithmetic for duration buckets
//!
//! Day indices are computed the same way the recorder computes them:
//! shift a UTC millisecond timestamp by the local offset, then floor-divide
//! by [`MILLISECONDS_PER_DAY`].

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone};

use crate::types::DayIndex;

pub const MILLISECONDS_PER_SECOND: i64 = 1000;
pub const MILLISECONDS_PER_MINUTE: i64 = 60 * MILLISECONDS_PER_SECOND;
pub const MILLISECONDS_PER_HOUR: i64 = 60 * MILLISECONDS_PER_MINUTE;
pub const MILLISECONDS_PER_DAY: i64 = 24 * MILLISECONDS_PER_HOUR;

/// Source of the current instant and of local midnights.
///
/// The aggregator reads the clock once per query so that the offset and
/// range it sends to the backend are consistent.
pub trait Clock: Send + Sync {
    /// Current instant, carrying the local UTC offset in effect right now.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Start of `date` in local time.
    fn local_midnight(&self, date: NaiveDate) -> DateTime<FixedOffset>;
}

/// Clock backed by the operating system's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().into()
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<FixedOffset> {
        let naive = date.and_time(NaiveTime::default());
        // Midnight can fall into a DST gap in a few zones.
        match Local.from_local_datetime(&naive).earliest() {
            Some(dt) => dt.into(),
            None => Local.from_utc_datetime(&naive).into(),
        }
    }
}

/// Clock pinned to one instant and one offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    /// Pin the clock at `millis` since the epoch, viewed from `offset_secs` east of UTC.
    pub fn at_millis(millis: i64, offset_secs: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(offset_secs)?;
        let now = offset.timestamp_millis_opt(millis).single()?;
        Some(Self { now })
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<FixedOffset> {
        let offset = *self.now.offset();
        let naive = date.and_time(NaiveTime::default());
        offset
            .from_local_datetime(&naive)
            .single()
            .unwrap_or_else(|| offset.from_utc_datetime(&naive))
    }
}

/// Start of the local day containing `now`.
pub fn start_of_day(clock: &dyn Clock, now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    clock.local_midnight(now.date_naive())
}

/// Start of the local year containing `now`.
pub fn start_of_year(clock: &dyn Clock, now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let date = now.date_naive();
    clock.local_midnight(date.with_ordinal(1).unwrap_or(date))
}

/// Milliseconds east of UTC for the offset carried by `dt`.
pub fn timezone_offset_millis(dt: &DateTime<FixedOffset>) -> i64 {
    i64::from(dt.offset().local_minus_utc()) * MILLISECONDS_PER_SECOND
}

/// Day index of a timestamp after shifting it by `offset_millis`.
pub fn day_index(millis: i64, offset_millis: i64) -> DayIndex {
    (millis + offset_millis).div_euclid(MILLISECONDS_PER_DAY)
}

/// Local days since the epoch for `dt`, using its own offset.
pub fn day_from_epoch(dt: &DateTime<FixedOffset>) -> DayIndex {
    day_index(dt.timestamp_millis(), timezone_offset_millis(dt))
}

/// Rotate a Sunday-based weekday (0 = Sunday) so `first_day_of_week` lands on 0.
///
/// `first_day_of_week` uses the recorder's numbering where 0 is Monday,
/// hence the extra `- 1`.
pub fn weekday_offset_raw(raw_weekday: u32, first_day_of_week: u8) -> u32 {
    (i64::from(raw_weekday) - 1 - i64::from(first_day_of_week)).rem_euclid(7) as u32
}

/// Position of `date` within a week that starts on `first_day_of_week`.
pub fn weekday_offset<Tz: TimeZone>(date: &DateTime<Tz>, first_day_of_week: u8) -> u32 {
    weekday_offset_raw(date.weekday().num_days_from_sunday(), first_day_of_week)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_weekday_offset_is_bijection() {
        for first in 0..7u8 {
            let offsets: HashSet<u32> = (0..7).map(|raw| weekday_offset_raw(raw, first)).collect();
            assert_eq!(offsets.len(), 7, "first_day_of_week = {first}");
            assert!(offsets.iter().all(|o| *o < 7));
        }
    }

    #[test]
    fn test_weekday_offset_tuesday_first() {
        // Monday is the last slot of a week starting on Tuesday.
        assert_eq!(weekday_offset_raw(1, 1), 6);
        assert_eq!(weekday_offset_raw(2, 1), 0);
    }

    #[test]
    fn test_weekday_offset_monday_first() {
        assert_eq!(weekday_offset_raw(1, 0), 0);
        assert_eq!(weekday_offset_raw(0, 0), 6);
    }

    #[test]
    fn test_weekday_offset_from_date() {
        // 2024-06-03 is a Monday.
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 3, 12, 0, 0)
            .unwrap();
        assert_eq!(weekday_offset(&date, 0), 0);
        assert_eq!(weekday_offset(&date, 6), 1);
    }

    #[test]
    fn test_day_index_handles_negative_offset() {
        // 01:00 UTC on day 1 is still day 0 at UTC-2.
        let millis = MILLISECONDS_PER_DAY + MILLISECONDS_PER_HOUR;
        assert_eq!(day_index(millis, 0), 1);
        assert_eq!(day_index(millis, -2 * MILLISECONDS_PER_HOUR), 0);
        assert_eq!(day_index(-1, 0), -1);
    }

    #[test]
    fn test_fixed_clock_boundaries() {
        // 2024-03-10T12:00:00+08:00
        let clock = FixedClock::at_millis(1_710_043_200_000, 8 * 3600).unwrap();
        let now = clock.now();

        let day = start_of_day(&clock, &now);
        assert_eq!(day.to_rfc3339(), "2024-03-10T00:00:00+08:00");

        let year = start_of_year(&clock, &now);
        assert_eq!(year.to_rfc3339(), "2024-01-01T00:00:00+08:00");

        assert_eq!(timezone_offset_millis(&now), 8 * MILLISECONDS_PER_HOUR);
        assert_eq!(day_from_epoch(&year), 19723);
    }
}
