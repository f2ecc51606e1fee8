//! Hand-off to insight generators
//!
//! Insight generation (usually an LLM call) sits downstream of reward scoring.
//! The core only assembles the request and never waits on the answer while
//! scoring samples.

use crate::aggregation::RewardSummary;
use crate::error::WellnessResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wellness_types::{MetricSample, MetricType};

/// Input handed to an insight generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub user_id: String,
    pub recent_samples: Vec<MetricSample>,
    pub recent_reward_summary: RewardSummary,
}

impl InsightRequest {
    /// Most recent value of every metric present in the request
    pub fn latest_values(&self) -> BTreeMap<MetricType, f64> {
        let mut latest: BTreeMap<MetricType, (chrono::DateTime<chrono::Utc>, f64)> = BTreeMap::new();
        for sample in &self.recent_samples {
            let entry = latest.entry(sample.metric_type).or_insert((sample.timestamp, sample.value));
            if sample.timestamp >= entry.0 {
                *entry = (sample.timestamp, sample.value);
            }
        }
        latest.into_iter().map(|(metric, (_, value))| (metric, value)).collect()
    }
}

/// Produces free-text insight from recent activity
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &InsightRequest) -> WellnessResult<String>;
}

/// Rule-of-thumb tips used when no model is reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateInsightGenerator;

impl TemplateInsightGenerator {
    fn tips(request: &InsightRequest) -> Vec<String> {
        let latest = request.latest_values();
        let mut tips = Vec::new();

        if latest.get(&MetricType::SleepHours).is_some_and(|h| *h < 7.0) {
            tips.push("Aim for 7-9 hours of sleep with a consistent bedtime".to_string());
        }
        if latest.get(&MetricType::Steps).is_some_and(|s| *s < 8_000.0) {
            tips.push("Add a short walk to close the gap to 8,000 steps".to_string());
        }
        if latest.get(&MetricType::WaterIntake).is_some_and(|w| *w < 6.0) {
            tips.push("Keep a glass of water nearby and refill it every hour".to_string());
        }
        if latest.get(&MetricType::MoodScore).is_some_and(|m| *m < 5.0) {
            tips.push("Take a few minutes for a breathing exercise or a call with a friend".to_string());
        }
        if tips.is_empty() {
            tips.push("Great balance today, keep the routine going".to_string());
        }
        tips
    }
}

#[async_trait]
impl InsightGenerator for TemplateInsightGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, request: &InsightRequest) -> WellnessResult<String> {
        let summary = &request.recent_reward_summary;
        let mut lines: Vec<String> = Self::tips(request).into_iter().map(|t| format!("• {t}")).collect();
        lines.push(format!(
            "• {} coins earned in the last {} days ({} lifetime)",
            summary.window_coins, summary.window_days, summary.lifetime_coins
        ));
        Ok(lines.join("\n"))
    }
}
