//! Rolling-window analytics over metric samples and reward events
//!
//! Every function here is a pure function of its inputs and `as_of`: the
//! samples are filtered and put into a canonical order before any arithmetic,
//! so the same history always yields bit-identical statistics regardless of
//! the order in which the store returned it.

use crate::deadline::Deadline;
use crate::error::{WellnessError, WellnessResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use wellness_types::{MetricSample, MetricType, RewardEvent, TimeRange};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How the trend slope of a window was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMethod {
    /// Least-squares slope over (days since the first sample, value)
    LinearRegression,
    /// Second-half mean minus first-half mean, used when every sample shares one timestamp
    HalfMeans,
    /// A single sample has no trend
    Flat,
}

/// Statistics of a non-empty window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub sample_count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Change per day
    pub trend_slope: f64,
    pub trend_method: TrendMethod,
    pub first_sample_at: DateTime<Utc>,
    pub last_sample_at: DateTime<Utc>,
}

/// Result of a window query; `NoData` is the sentinel for an empty window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowStats {
    NoData,
    Summary(AggregatedStats),
}

/// Trailing-window rollup of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    pub window_size_days: u32,
    pub metric_type: MetricType,
    pub as_of: DateTime<Utc>,
    pub stats: WindowStats,
}

impl RollingWindow {
    pub fn is_empty(&self) -> bool {
        matches!(self.stats, WindowStats::NoData)
    }

    pub fn stats(&self) -> Option<&AggregatedStats> {
        match &self.stats {
            WindowStats::Summary(stats) => Some(stats),
            WindowStats::NoData => None,
        }
    }

    /// Statistics, or `DataUnavailable` for callers that cannot use the sentinel
    pub fn require_stats(&self) -> WellnessResult<&AggregatedStats> {
        self.stats().ok_or_else(|| {
            WellnessError::no_data(
                self.metric_type,
                format!(
                    "no {} samples in the {} days before {}",
                    self.metric_type, self.window_size_days, self.as_of
                ),
            )
        })
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::trailing_days(self.as_of, self.window_size_days)
    }
}

/// Summarize `metric_type` over `[as_of - window_days, as_of]`
pub fn summarize(
    samples: &[MetricSample],
    metric_type: MetricType,
    window_days: u32,
    as_of: DateTime<Utc>,
) -> RollingWindow {
    summarize_within(samples, metric_type, window_days, as_of, &Deadline::unbounded())
        .unwrap_or_else(|_| RollingWindow {
            window_size_days: window_days,
            metric_type,
            as_of,
            stats: WindowStats::NoData,
        })
}

/// Deadline-bounded variant of [`summarize`]
#[instrument(skip(samples, deadline), fields(candidates = samples.len()))]
pub fn summarize_within(
    samples: &[MetricSample],
    metric_type: MetricType,
    window_days: u32,
    as_of: DateTime<Utc>,
    deadline: &Deadline,
) -> WellnessResult<RollingWindow> {
    let range = TimeRange::trailing_days(as_of, window_days);

    let mut points: Vec<(DateTime<Utc>, f64)> = samples
        .iter()
        .filter(|s| s.metric_type == metric_type && range.contains(s.timestamp))
        .map(|s| (s.timestamp, s.value))
        .collect();
    points.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    deadline.check("window aggregation")?;

    let stats = match compute_stats(&points) {
        Some(stats) => WindowStats::Summary(stats),
        None => {
            debug!(%metric_type, window_days, "No samples in window");
            WindowStats::NoData
        }
    };

    Ok(RollingWindow { window_size_days: window_days, metric_type, as_of, stats })
}

fn compute_stats(points: &[(DateTime<Utc>, f64)]) -> Option<AggregatedStats> {
    let (first, last) = (points.first()?, points.last()?);
    let n = points.len() as f64;

    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (_, v) in points {
        sum += v;
        min = min.min(*v);
        max = max.max(*v);
    }

    let (trend_slope, trend_method) = trend(points, first.0);

    Some(AggregatedStats {
        sample_count: points.len(),
        mean: sum / n,
        min,
        max,
        trend_slope,
        trend_method,
        first_sample_at: first.0,
        last_sample_at: last.0,
    })
}

fn trend(points: &[(DateTime<Utc>, f64)], origin: DateTime<Utc>) -> (f64, TrendMethod) {
    if points.len() < 2 {
        return (0.0, TrendMethod::Flat);
    }

    // x = days since the first sample, y = value
    let n = points.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (ts, y) in points {
        let x = (*ts - origin).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() > f64::EPSILON {
        return ((n * sum_xy - sum_x * sum_y) / denom, TrendMethod::LinearRegression);
    }

    let half = points.len() / 2;
    let mean = |slice: &[(DateTime<Utc>, f64)]| {
        slice.iter().map(|(_, v)| v).sum::<f64>() / slice.len() as f64
    };
    (mean(&points[half..]) - mean(&points[..half]), TrendMethod::HalfMeans)
}

/// Coins earned by a user, lifetime and within a trailing window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub user_id: String,
    pub window_days: u32,
    pub as_of: DateTime<Utc>,
    pub lifetime_coins: u64,
    pub lifetime_events: usize,
    pub window_coins: u64,
    pub window_events: usize,
    pub coins_by_rule: BTreeMap<String, u64>,
}

/// Balance of a user: the sum of every coin ever awarded to them
pub fn balance(events: &[RewardEvent], user_id: &str) -> u64 {
    events.iter().filter(|e| e.user_id == user_id).map(|e| u64::from(e.coin_value)).sum()
}

/// Roll up reward events for the dashboard
pub fn summarize_rewards(
    events: &[RewardEvent],
    user_id: &str,
    window_days: u32,
    as_of: DateTime<Utc>,
) -> RewardSummary {
    let range = TimeRange::trailing_days(as_of, window_days);
    let mut summary = RewardSummary {
        user_id: user_id.to_string(),
        window_days,
        as_of,
        lifetime_coins: 0,
        lifetime_events: 0,
        window_coins: 0,
        window_events: 0,
        coins_by_rule: BTreeMap::new(),
    };

    for event in events.iter().filter(|e| e.user_id == user_id && e.awarded_at <= as_of) {
        let coins = u64::from(event.coin_value);
        summary.lifetime_coins += coins;
        summary.lifetime_events += 1;
        if range.contains(event.awarded_at) {
            summary.window_coins += coins;
            summary.window_events += 1;
            *summary.coins_by_rule.entry(event.rule_id.clone()).or_default() += coins;
        }
    }

    summary
}
