//! Reward rule definitions and their startup validation
//!
//! Rules arrive as loosely typed configuration documents (`RuleConfig`) and are
//! validated exactly once into immutable `RewardRule`s. An unknown metric name
//! or a malformed condition is a startup error, never a per-sample one.

use crate::error::{WellnessError, WellnessResult};
use crate::period::Period;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{info, instrument};
use wellness_types::MetricType;

/// Comparison applied between an observed value and a rule threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">", alias = "gt")]
    GreaterThan,
    #[serde(rename = ">=", alias = "gte")]
    GreaterThanOrEqual,
    #[serde(rename = "<", alias = "lt")]
    LessThan,
    #[serde(rename = "<=", alias = "lte")]
    LessThanOrEqual,
    #[serde(rename = "==", alias = "eq")]
    Equal,
}

impl Comparator {
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::GreaterThanOrEqual => value >= threshold,
            Comparator::LessThan => value < threshold,
            Comparator::LessThanOrEqual => value <= threshold,
            Comparator::Equal => (value - threshold).abs() <= f64::EPSILON * threshold.abs().max(1.0),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            Comparator::Equal => "==",
        }
    }
}

/// How the values of a period are reduced before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// The triggering sample's own value, or for another metric the most
    /// recent value at or before the triggering sample within the period
    #[default]
    Latest,
    Sum,
    Mean,
    Min,
    Max,
    /// Number of samples recorded in the period
    Count,
}

/// One comparison against one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric_type: MetricType,
    pub comparator: Comparator,
    pub threshold: f64,
    pub aggregation: Aggregation,
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({}) {} {}",
            self.aggregation,
            self.metric_type,
            self.comparator.symbol(),
            self.threshold
        )
    }
}

/// How the thresholds of a composite condition are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    All,
    Any,
}

/// Condition under which a rule awards coins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleCondition {
    Threshold(Threshold),
    Composite { combinator: Combinator, conditions: Vec<Threshold> },
}

impl RuleCondition {
    pub fn thresholds(&self) -> &[Threshold] {
        match self {
            RuleCondition::Threshold(t) => std::slice::from_ref(t),
            RuleCondition::Composite { conditions, .. } => conditions,
        }
    }

    pub fn combinator(&self) -> Combinator {
        match self {
            RuleCondition::Threshold(_) => Combinator::All,
            RuleCondition::Composite { combinator, .. } => *combinator,
        }
    }

    /// Whether a sample of this metric can change the outcome of the condition
    pub fn references(&self, metric_type: MetricType) -> bool {
        self.thresholds().iter().any(|t| t.metric_type == metric_type)
    }

    /// Distinct metrics read by the condition
    pub fn metrics(&self) -> Vec<MetricType> {
        let mut metrics: Vec<MetricType> = self.thresholds().iter().map(|t| t.metric_type).collect();
        metrics.sort();
        metrics.dedup();
        metrics
    }
}

/// A validated reward rule; static for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    pub rule_id: String,
    pub description: String,
    pub condition: RuleCondition,
    pub period: Period,
    pub coin_value: u32,
}

/// A single comparison as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub metric_type: String,
    pub comparator: Comparator,
    pub threshold: f64,
    #[serde(default)]
    pub aggregation: Aggregation,
}

/// A reward rule as written in configuration
///
/// Either the single-threshold fields (`metric_type`, `comparator`,
/// `threshold`, `aggregation`) or exactly one of `all` / `any` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub rule_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub comparator: Option<Comparator>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<ConditionConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<ConditionConfig>,
    #[serde(default)]
    pub period: Period,
    pub coin_value: u32,
}

impl RuleConfig {
    /// Single-threshold rule, mostly useful in tests and defaults
    pub fn threshold(
        rule_id: &str,
        metric_type: MetricType,
        comparator: Comparator,
        threshold: f64,
        period: Period,
        coin_value: u32,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            description: String::new(),
            metric_type: Some(metric_type.as_str().to_string()),
            comparator: Some(comparator),
            threshold: Some(threshold),
            aggregation: Aggregation::Latest,
            all: Vec::new(),
            any: Vec::new(),
            period,
            coin_value,
        }
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Validate into a typed rule
    pub fn validate(&self) -> WellnessResult<RewardRule> {
        let rule_id = self.rule_id.trim();
        if rule_id.is_empty() {
            return Err(WellnessError::rule_validation("", "rule_id", "rule_id must not be empty"));
        }
        if self.coin_value == 0 {
            return Err(WellnessError::rule_validation(
                rule_id,
                "coin_value",
                "coin_value must be greater than zero",
            ));
        }

        let has_single = self.metric_type.is_some();
        let shapes = [has_single, !self.all.is_empty(), !self.any.is_empty()];
        if shapes.iter().filter(|set| **set).count() != 1 {
            return Err(WellnessError::rule_validation(
                rule_id,
                "condition",
                "exactly one of metric_type, all or any must be configured",
            ));
        }

        let condition = if let Some(metric) = &self.metric_type {
            let comparator = self.comparator.ok_or_else(|| {
                WellnessError::rule_validation(rule_id, "comparator", "comparator is required")
            })?;
            let threshold = self.threshold.ok_or_else(|| {
                WellnessError::rule_validation(rule_id, "threshold", "threshold is required")
            })?;
            RuleCondition::Threshold(build_threshold(
                rule_id,
                metric,
                comparator,
                threshold,
                self.aggregation,
            )?)
        } else {
            let (combinator, configs) = if self.all.is_empty() {
                (Combinator::Any, &self.any)
            } else {
                (Combinator::All, &self.all)
            };
            let conditions = configs
                .iter()
                .map(|c| build_threshold(rule_id, &c.metric_type, c.comparator, c.threshold, c.aggregation))
                .collect::<WellnessResult<Vec<_>>>()?;
            RuleCondition::Composite { combinator, conditions }
        };

        Ok(RewardRule {
            rule_id: rule_id.to_string(),
            description: self.description.clone(),
            condition,
            period: self.period,
            coin_value: self.coin_value,
        })
    }
}

fn build_threshold(
    rule_id: &str,
    metric: &str,
    comparator: Comparator,
    threshold: f64,
    aggregation: Aggregation,
) -> WellnessResult<Threshold> {
    let metric_type = metric
        .parse::<MetricType>()
        .map_err(|e| WellnessError::rule_validation(rule_id, "metric_type", e.to_string()))?;
    if !threshold.is_finite() {
        return Err(WellnessError::rule_validation(
            rule_id,
            "threshold",
            format!("threshold {threshold} is not a finite number"),
        ));
    }
    Ok(Threshold { metric_type, comparator, threshold, aggregation })
}

/// Validate an ordered rule set; any error is fatal to startup
#[instrument(skip(configs))]
pub fn validate_rules(configs: &[RuleConfig]) -> WellnessResult<Vec<RewardRule>> {
    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(configs.len());

    for config in configs {
        let rule = config.validate()?;
        if !seen.insert(rule.rule_id.clone()) {
            return Err(WellnessError::rule_validation(
                &rule.rule_id,
                "rule_id",
                format!("duplicate rule_id '{}'", rule.rule_id),
            ));
        }
        rules.push(rule);
    }

    info!(rule_count = rules.len(), "Validated reward rules");
    Ok(rules)
}
