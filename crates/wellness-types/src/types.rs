use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Health metrics tracked by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Step count accumulated over the current day
    Steps,
    /// Heart rate in beats per minute
    HeartRate,
    /// Hours slept during the last night
    SleepHours,
    /// Glasses of water drunk during the current day
    WaterIntake,
    /// Active calories burned during the current day
    Calories,
    /// Self-reported mood on a 1-10 scale
    MoodScore,
    /// Minutes of moderate or vigorous activity during the current day
    ActiveMinutes,
}

impl MetricType {
    /// Every metric type, in a stable order
    pub const ALL: [Self; 7] = [
        Self::Steps,
        Self::HeartRate,
        Self::SleepHours,
        Self::WaterIntake,
        Self::Calories,
        Self::MoodScore,
        Self::ActiveMinutes,
    ];

    /// Canonical configuration name of the metric
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::HeartRate => "heart_rate",
            Self::SleepHours => "sleep_hours",
            Self::WaterIntake => "water_intake",
            Self::Calories => "calories",
            Self::MoodScore => "mood_score",
            Self::ActiveMinutes => "active_minutes",
        }
    }

    /// Display unit of the metric value
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::HeartRate => "bpm",
            Self::SleepHours => "h",
            Self::WaterIntake => "glasses",
            Self::Calories => "kcal",
            Self::MoodScore => "/10",
            Self::ActiveMinutes => "min",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a metric name is not part of the catalogue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric type '{0}'")]
pub struct ParseMetricTypeError(pub String);

impl FromStr for MetricType {
    type Err = ParseMetricTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        // Legacy field name for calories
        match normalized.as_str() {
            "calories_burned" => Ok(Self::Calories),
            other => Self::ALL
                .into_iter()
                .find(|metric| metric.as_str() == other)
                .ok_or_else(|| ParseMetricTypeError(s.to_string())),
        }
    }
}

/// Origin of a metric sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
    /// Produced by the metric simulator
    #[default]
    Simulated,
    /// Entered by hand through the dashboard
    Manual,
}

/// A single immutable observation of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Which metric was observed
    pub metric_type: MetricType,
    /// Observed value in the metric's unit
    pub value: f64,
    /// Where the observation came from
    #[serde(default)]
    pub source: SampleSource,
}

impl MetricSample {
    /// Create a simulated sample
    #[must_use]
    pub const fn simulated(timestamp: DateTime<Utc>, metric_type: MetricType, value: f64) -> Self {
        Self { timestamp, metric_type, value, source: SampleSource::Simulated }
    }
}

/// Identifier of a reward period, derived from a timestamp and the rule's period
///
/// Keys are plain strings such as `daily:2026-10-16`, `weekly:2026-10-12` or
/// `task:<task id>`, so they sort and compare the same way in every store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    /// Wrap an already formatted period key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uniqueness key of a reward event: one award per rule, user and period
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    /// Rewarded user
    pub user_id: String,
    /// Rule that fired
    pub rule_id: String,
    /// Period the award belongs to
    pub period_key: PeriodKey,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule '{}' for user '{}' in {}", self.rule_id, self.user_id, self.period_key)
    }
}

/// Coins credited to a user because a reward rule fired in a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    /// Unique event identifier
    pub event_id: Uuid,
    /// Rule that produced the event
    pub rule_id: String,
    /// Rewarded user
    pub user_id: String,
    /// Period the award belongs to
    pub period_key: PeriodKey,
    /// Coins credited
    pub coin_value: u32,
    /// Timestamp of the sample (or completion) that triggered the award
    pub awarded_at: DateTime<Utc>,
}

impl RewardEvent {
    /// Create an event with a fresh identifier
    #[must_use]
    pub fn new(
        rule_id: impl Into<String>,
        user_id: impl Into<String>,
        period_key: PeriodKey,
        coin_value: u32,
        awarded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            rule_id: rule_id.into(),
            user_id: user_id.into(),
            period_key,
            coin_value,
            awarded_at,
        }
    }

    /// Uniqueness key used by the idempotency guard
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey {
            user_id: self.user_id.clone(),
            rule_id: self.rule_id.clone(),
            period_key: self.period_key.clone(),
        }
    }
}

/// Closed time interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound
    pub start: DateTime<Utc>,
    /// Inclusive upper bound
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range; bounds are swapped when given in reverse order
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end { Self { start, end } } else { Self { start: end, end: start } }
    }

    /// The trailing range of `days` days ending at `as_of`
    ///
    /// Saturates at the earliest representable instant for very long windows.
    #[must_use]
    pub fn trailing_days(as_of: DateTime<Utc>, days: u32) -> Self {
        let start = chrono::Duration::try_days(i64::from(days))
            .and_then(|span| as_of.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(start, as_of)
    }

    /// Whether `ts` lies inside the range
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}
