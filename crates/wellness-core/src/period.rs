//! Reward periods derived purely from timestamps
//!
//! A period key is a function of the sample timestamp and the configured
//! boundary only. There is no process-wide "current period": two samples at
//! 23:59:59 and 00:00:01 land in different periods regardless of the order in
//! which they arrive.

use crate::error::{WellnessError, WellnessResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use wellness_types::PeriodKey;

/// Calendar interval within which a rule fires at most once per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    Daily,
    /// ISO week, starting on Monday at the boundary time
    Weekly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local time of day at which periods reset, plus the local UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBoundary {
    pub reset_at: NaiveTime,
    pub utc_offset_minutes: i32,
}

impl PeriodBoundary {
    /// Periods reset at midnight UTC
    pub const UTC_MIDNIGHT: Self = Self { reset_at: NaiveTime::MIN, utc_offset_minutes: 0 };

    /// Parse an `HH:MM` (or `HH:MM:SS`) reset time
    pub fn parse(reset_at: &str, utc_offset_minutes: i32) -> WellnessResult<Self> {
        let trimmed = reset_at.trim();
        let time = NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map_err(|e| WellnessError::Validation {
                message: format!("invalid period boundary '{reset_at}': {e}"),
                rule_id: None,
                field: Some("period_boundary".to_string()),
            })?;

        if !(-14 * 60..=14 * 60).contains(&utc_offset_minutes) {
            return Err(WellnessError::Validation {
                message: format!("utc offset {utc_offset_minutes} minutes is out of range"),
                rule_id: None,
                field: Some("utc_offset_minutes".to_string()),
            });
        }

        Ok(Self { reset_at: time, utc_offset_minutes })
    }

    /// Shift that maps a UTC instant onto its "period clock"
    fn shift(&self) -> Duration {
        Duration::minutes(i64::from(self.utc_offset_minutes))
            - Duration::seconds(i64::from(self.reset_at.num_seconds_from_midnight()))
    }

    /// The period day a timestamp belongs to
    pub fn period_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        (ts + self.shift()).date_naive()
    }

    /// UTC instant at which the given period day starts
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc() - self.shift()
    }

    /// Local wall-clock hour, used for time-of-day dynamics
    pub fn local_hour(&self, ts: DateTime<Utc>) -> u32 {
        (ts + Duration::minutes(i64::from(self.utc_offset_minutes))).hour()
    }
}

impl Default for PeriodBoundary {
    fn default() -> Self {
        Self::UTC_MIDNIGHT
    }
}

/// Half-open interval `[start, end)` covered by one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Lifecycle of a period: open until its boundary passes, then closed forever
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodState {
    Open,
    Closed,
}

fn period_start_date(ts: DateTime<Utc>, period: Period, boundary: &PeriodBoundary) -> NaiveDate {
    let date = boundary.period_date(ts);
    match period {
        Period::Daily => date,
        Period::Weekly => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
    }
}

/// Key of the period containing `ts`
pub fn period_key(ts: DateTime<Utc>, period: Period, boundary: &PeriodBoundary) -> PeriodKey {
    let start = period_start_date(ts, period, boundary);
    PeriodKey::new(format!("{}:{}", period.as_str(), start.format("%Y-%m-%d")))
}

/// The period window containing `ts`
pub fn period_window(ts: DateTime<Utc>, period: Period, boundary: &PeriodBoundary) -> PeriodWindow {
    let start_date = period_start_date(ts, period, boundary);
    let length = match period {
        Period::Daily => Duration::days(1),
        Period::Weekly => Duration::weeks(1),
    };
    PeriodWindow { start: boundary.start_of(start_date), end: boundary.start_of(start_date + length) }
}

/// State, as seen at `now`, of the period containing `ts`
pub fn period_state(
    ts: DateTime<Utc>,
    period: Period,
    boundary: &PeriodBoundary,
    now: DateTime<Utc>,
) -> PeriodState {
    if now >= period_window(ts, period, boundary).end { PeriodState::Closed } else { PeriodState::Open }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_midnight_straddle_uses_timestamp_only() {
        let boundary = PeriodBoundary::UTC_MIDNIGHT;
        let before = at(2026, 10, 15, 23, 59, 59);
        let after = at(2026, 10, 16, 0, 0, 1);

        assert_eq!(period_key(before, Period::Daily, &boundary).as_str(), "daily:2026-10-15");
        assert_eq!(period_key(after, Period::Daily, &boundary).as_str(), "daily:2026-10-16");
    }

    #[test]
    fn test_custom_reset_time_and_offset() {
        // Resets at 04:00 local time in UTC+02:00, i.e. 02:00 UTC
        let boundary = PeriodBoundary::parse("04:00", 120).unwrap();
        assert_eq!(
            period_key(at(2026, 10, 16, 1, 59, 59), Period::Daily, &boundary).as_str(),
            "daily:2026-10-15"
        );
        assert_eq!(
            period_key(at(2026, 10, 16, 2, 0, 0), Period::Daily, &boundary).as_str(),
            "daily:2026-10-16"
        );

        let window = period_window(at(2026, 10, 16, 12, 0, 0), Period::Daily, &boundary);
        assert_eq!(window.start, at(2026, 10, 16, 2, 0, 0));
        assert_eq!(window.end, at(2026, 10, 17, 2, 0, 0));
        assert_eq!(boundary.local_hour(at(2026, 10, 16, 12, 0, 0)), 14);
    }

    #[test]
    fn test_weekly_period_starts_on_monday() {
        let boundary = PeriodBoundary::UTC_MIDNIGHT;
        // 2026-10-16 is a Friday
        let key = period_key(at(2026, 10, 16, 9, 0, 0), Period::Weekly, &boundary);
        assert_eq!(key.as_str(), "weekly:2026-10-12");

        let window = period_window(at(2026, 10, 18, 23, 0, 0), Period::Weekly, &boundary);
        assert_eq!(window.start, at(2026, 10, 12, 0, 0, 0));
        assert_eq!(window.end, at(2026, 10, 19, 0, 0, 0));
    }

    #[test]
    fn test_period_closes_once_boundary_passes() {
        let boundary = PeriodBoundary::UTC_MIDNIGHT;
        let sample_ts = at(2026, 10, 15, 20, 0, 0);
        assert_eq!(
            period_state(sample_ts, Period::Daily, &boundary, at(2026, 10, 15, 23, 59, 59)),
            PeriodState::Open
        );
        assert_eq!(
            period_state(sample_ts, Period::Daily, &boundary, at(2026, 10, 16, 0, 0, 0)),
            PeriodState::Closed
        );
    }

    #[test]
    fn test_invalid_boundaries_are_rejected() {
        assert!(PeriodBoundary::parse("25:00", 0).is_err());
        assert!(PeriodBoundary::parse("midnight", 0).is_err());
        assert!(PeriodBoundary::parse("00:00", 15 * 60).is_err());
        assert_eq!(PeriodBoundary::parse("00:00:00", 0).unwrap(), PeriodBoundary::UTC_MIDNIGHT);
    }
}
