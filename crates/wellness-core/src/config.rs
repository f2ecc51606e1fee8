//! Engine configuration surface and its startup validation

use crate::constants::defaults;
use crate::error::{WellnessError, WellnessResult};
use crate::period::{Period, PeriodBoundary};
use crate::rules::{Aggregation, Comparator, ConditionConfig, RewardRule, RuleConfig, validate_rules};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use wellness_types::MetricType;

/// The recognized configuration options of the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Generator cadence
    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    /// Analytics window
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Local reset time of reward periods, `HH:MM`
    #[serde(default = "default_period_boundary")]
    pub period_boundary: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Ordered reward rules
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Configuration after validation, ready to build the engine from
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub tick_interval: Duration,
    pub window_days: u32,
    pub boundary: PeriodBoundary,
    pub rules: Vec<RewardRule>,
}

impl EngineConfig {
    /// Validate everything at once; any error must abort startup
    pub fn validate(&self) -> WellnessResult<ValidatedConfig> {
        if self.tick_interval_seconds == 0 {
            return Err(WellnessError::Validation {
                message: "tick_interval_seconds must be at least 1".to_string(),
                rule_id: None,
                field: Some("tick_interval_seconds".to_string()),
            });
        }
        if !(1..=366).contains(&self.window_days) {
            return Err(WellnessError::Validation {
                message: format!("window_days {} must be between 1 and 366", self.window_days),
                rule_id: None,
                field: Some("window_days".to_string()),
            });
        }
        if self.rules.is_empty() {
            return Err(WellnessError::Validation {
                message: "no reward rules configured".to_string(),
                rule_id: None,
                field: Some("rules".to_string()),
            });
        }

        let boundary = PeriodBoundary::parse(&self.period_boundary, self.utc_offset_minutes)?;
        let rules = validate_rules(&self.rules)?;

        info!(
            tick_interval_seconds = self.tick_interval_seconds,
            window_days = self.window_days,
            period_boundary = %self.period_boundary,
            rules = rules.len(),
            "Engine configuration validated"
        );

        Ok(ValidatedConfig {
            tick_interval: Duration::from_secs(self.tick_interval_seconds),
            window_days: self.window_days,
            boundary,
            rules,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_tick_interval_seconds(),
            window_days: default_window_days(),
            period_boundary: default_period_boundary(),
            utc_offset_minutes: 0,
            rules: default_rules(),
        }
    }
}

fn default_tick_interval_seconds() -> u64 {
    defaults::TICK_INTERVAL_SECONDS
}
fn default_window_days() -> u32 {
    defaults::WINDOW_DAYS
}
fn default_period_boundary() -> String {
    defaults::PERIOD_BOUNDARY.to_string()
}

/// Reward rules shipped with the dashboard
pub fn default_rules() -> Vec<RuleConfig> {
    let describe = |mut rule: RuleConfig, description: &str| {
        rule.description = description.to_string();
        rule
    };

    vec![
        describe(
            RuleConfig::threshold(
                "daily_steps_10k",
                MetricType::Steps,
                Comparator::GreaterThanOrEqual,
                10_000.0,
                Period::Daily,
                5,
            ),
            "Walk 10,000 steps in a day",
        ),
        describe(
            RuleConfig::threshold(
                "daily_hydration",
                MetricType::WaterIntake,
                Comparator::GreaterThanOrEqual,
                8.0,
                Period::Daily,
                3,
            ),
            "Drink 8 glasses of water in a day",
        ),
        describe(
            RuleConfig::threshold(
                "daily_active_30",
                MetricType::ActiveMinutes,
                Comparator::GreaterThanOrEqual,
                30.0,
                Period::Daily,
                3,
            ),
            "Be active for 30 minutes",
        ),
        describe(
            RuleConfig::threshold(
                "weekly_sleep_routine",
                MetricType::SleepHours,
                Comparator::GreaterThanOrEqual,
                7.0,
                Period::Weekly,
                15,
            )
            .with_aggregation(Aggregation::Mean),
            "Average at least 7 hours of sleep over the week",
        ),
        RuleConfig {
            rule_id: "balanced_day".to_string(),
            description: "Rested, active and in a good mood on the same day".to_string(),
            metric_type: None,
            comparator: None,
            threshold: None,
            aggregation: Aggregation::Latest,
            all: vec![
                ConditionConfig {
                    metric_type: MetricType::SleepHours.as_str().to_string(),
                    comparator: Comparator::GreaterThanOrEqual,
                    threshold: 7.0,
                    aggregation: Aggregation::Latest,
                },
                ConditionConfig {
                    metric_type: MetricType::Steps.as_str().to_string(),
                    comparator: Comparator::GreaterThanOrEqual,
                    threshold: 8_000.0,
                    aggregation: Aggregation::Latest,
                },
                ConditionConfig {
                    metric_type: MetricType::MoodScore.as_str().to_string(),
                    comparator: Comparator::GreaterThanOrEqual,
                    threshold: 6.0,
                    aggregation: Aggregation::Mean,
                },
            ],
            any: Vec::new(),
            period: Period::Daily,
            coin_value: 10,
        },
    ]
}
