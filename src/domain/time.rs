//! Local-time helpers.
//!
//! The installation is single-site, so local time is derived from a single
//! configured UTC offset rather than a timezone database — see the fixed
//! offset Design Note in SPEC_FULL.md §9.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Produces local-time facts (date, hour, night window) from a fixed offset.
///
/// Cloneable and cheap: it holds nothing but the offset, so components take
/// it by value rather than behind an `Arc`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeProvider {
    offset: FixedOffset,
}

impl TimeProvider {
    pub fn from_hours(local_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(local_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is always valid"));
        Self { offset }
    }

    pub fn now_local(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Converts a given UTC instant to local time, rather than sampling
    /// the clock — used so a tick's entire output is derived from the one
    /// timestamp captured at its start.
    pub fn now_local_at(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset).hour()
    }

    /// `true` when the local hour at `at` falls in `[night_start, 24) ∪ [0, night_end)`.
    pub fn is_night(&self, at: DateTime<Utc>, night_start_hour: u32, night_end_hour: u32) -> bool {
        let hour = self.local_hour(at);
        if night_start_hour <= night_end_hour {
            hour >= night_start_hour && hour < night_end_hour
        } else {
            hour >= night_start_hour || hour < night_end_hour
        }
    }

    pub fn local_iso(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(
            chrono::NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, mi, 0)
                .unwrap(),
            Utc,
        )
    }

    #[test]
    fn wraps_night_window_over_midnight() {
        let tp = TimeProvider::from_hours(10);
        // 23:30 UTC + 10h offset -> 09:30 local next day, NOT night.
        assert!(!tp.is_night(utc(2026, 1, 1, 23, 30), 21, 6));
        // 12:00 UTC + 10h offset -> 22:00 local, night.
        assert!(tp.is_night(utc(2026, 1, 1, 12, 0), 21, 6));
        // 21:30 UTC + 10h offset -> 07:30 local, not night (after night_end=6... wait local is 7:30, past 6, not night)
        assert!(!tp.is_night(utc(2026, 1, 1, 21, 30), 21, 6));
    }

    #[test]
    fn local_date_advances_at_local_midnight_not_utc() {
        let tp = TimeProvider::from_hours(10);
        // 15:00 UTC on day 1 -> 01:00 local on day 2.
        let d = tp.local_date(utc(2026, 3, 4, 15, 0));
        assert_eq!(d, chrono::NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
    }
}
