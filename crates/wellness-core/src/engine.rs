//! Reward rule evaluation
//!
//! `latest` thresholds look at values at or before the triggering sample.
//! Period aggregates (`sum`, `mean`, `min`, `max`, `count`) read everything
//! recorded for the period so far, whatever its timestamp, so late-arriving
//! history still counts towards the period total.

use crate::deadline::Deadline;
use crate::error::WellnessResult;
use crate::period::{PeriodBoundary, PeriodState, PeriodWindow, period_key, period_state, period_window};
use crate::rules::{Aggregation, Combinator, RewardRule, RuleConfig, Threshold, validate_rules};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};
use wellness_types::{EventKey, MetricSample, MetricType, RewardEvent, TimeRange};

/// Evaluates samples against the reward rules
///
/// Every rule is evaluated independently; the only thing tying rules and
/// samples together is the `(rule_id, user_id, period_key)` uniqueness key, so
/// neither rule order nor sample arrival order can produce a second award.
#[derive(Debug, Clone)]
pub struct RewardRuleEngine {
    rules: Vec<RewardRule>,
    boundary: PeriodBoundary,
}

impl RewardRuleEngine {
    /// Create an engine from already validated rules
    #[instrument(skip(rules))]
    pub fn new(rules: Vec<RewardRule>, boundary: PeriodBoundary) -> Self {
        info!(rule_count = rules.len(), "Creating reward rule engine");
        Self { rules, boundary }
    }

    /// Validate raw rule configuration and build an engine
    pub fn from_config(configs: &[RuleConfig], boundary: PeriodBoundary) -> WellnessResult<Self> {
        Ok(Self::new(validate_rules(configs)?, boundary))
    }

    pub fn rules(&self) -> &[RewardRule] {
        &self.rules
    }

    pub fn boundary(&self) -> &PeriodBoundary {
        &self.boundary
    }

    /// Rules a sample of this metric can trigger
    pub fn rules_for(&self, metric_type: MetricType) -> impl Iterator<Item = &RewardRule> {
        self.rules.iter().filter(move |rule| rule.condition.references(metric_type))
    }

    /// History needed to evaluate `sample`: the union of the periods of every
    /// rule it can trigger, per metric those rules read
    pub fn history_ranges(&self, sample: &MetricSample) -> Vec<(MetricType, TimeRange)> {
        let mut ranges: BTreeMap<MetricType, TimeRange> = BTreeMap::new();
        for rule in self.rules_for(sample.metric_type) {
            let window = period_window(sample.timestamp, rule.period, &self.boundary);
            let range = TimeRange::new(window.start, window.end);
            for metric in rule.condition.metrics() {
                ranges
                    .entry(metric)
                    .and_modify(|r| {
                        *r = TimeRange::new(r.start.min(range.start), r.end.max(range.end))
                    })
                    .or_insert(range);
            }
        }
        ranges.into_iter().collect()
    }

    /// Evaluate one sample without a deadline
    pub fn evaluate(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        sample: &MetricSample,
        recent_history: &[MetricSample],
        existing_events: &[RewardEvent],
    ) -> Vec<RewardEvent> {
        self.evaluate_within(
            user_id,
            now,
            sample,
            recent_history,
            existing_events,
            &Deadline::unbounded(),
        )
        .unwrap_or_default()
    }

    /// Evaluate one sample, giving up with a retryable timeout once `deadline` passes
    ///
    /// Returns at most one event per rule. A rule is skipped when its period is
    /// already closed at `now`, or when `existing_events` already holds an event
    /// with the same uniqueness key. Nothing is written here; on timeout no
    /// events are returned at all.
    #[instrument(
        skip(self, sample, recent_history, existing_events, deadline),
        fields(metric = %sample.metric_type, ts = %sample.timestamp)
    )]
    pub fn evaluate_within(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        sample: &MetricSample,
        recent_history: &[MetricSample],
        existing_events: &[RewardEvent],
        deadline: &Deadline,
    ) -> WellnessResult<Vec<RewardEvent>> {
        let mut awarded: HashSet<EventKey> = existing_events.iter().map(RewardEvent::key).collect();
        let mut events = Vec::new();

        for rule in self.rules_for(sample.metric_type) {
            deadline.check("reward evaluation")?;

            if period_state(sample.timestamp, rule.period, &self.boundary, now) == PeriodState::Closed {
                debug!(rule_id = %rule.rule_id, "Period closed, sample kept for analytics only");
                continue;
            }

            let key = EventKey {
                user_id: user_id.to_string(),
                rule_id: rule.rule_id.clone(),
                period_key: period_key(sample.timestamp, rule.period, &self.boundary),
            };
            if awarded.contains(&key) {
                continue;
            }

            let window = period_window(sample.timestamp, rule.period, &self.boundary);
            if self.rule_satisfied(rule, sample, recent_history, &window) {
                debug!(rule_id = %rule.rule_id, period = %key.period_key, "Rule satisfied");
                events.push(RewardEvent::new(
                    rule.rule_id.clone(),
                    user_id,
                    key.period_key.clone(),
                    rule.coin_value,
                    sample.timestamp,
                ));
                awarded.insert(key);
            }
        }

        Ok(events)
    }

    fn rule_satisfied(
        &self,
        rule: &RewardRule,
        sample: &MetricSample,
        history: &[MetricSample],
        window: &PeriodWindow,
    ) -> bool {
        let mut results =
            rule.condition.thresholds().iter().map(|t| threshold_satisfied(t, sample, history, window));
        match rule.condition.combinator() {
            Combinator::All => results.all(|ok| ok),
            Combinator::Any => results.any(|ok| ok),
        }
    }
}

/// Samples of one metric in the period, deduplicated and in timestamp order
///
/// The triggering sample may or may not already be part of the history; exact
/// duplicates collapse so it is never counted twice.
fn period_values(
    metric_type: MetricType,
    sample: &MetricSample,
    history: &[MetricSample],
    window: &PeriodWindow,
) -> Vec<(DateTime<Utc>, f64)> {
    let mut values: BTreeMap<(DateTime<Utc>, u64), f64> = BTreeMap::new();
    for s in history.iter().chain(std::iter::once(sample)) {
        if s.metric_type == metric_type && window.contains(s.timestamp) {
            values.insert((s.timestamp, s.value.to_bits()), s.value);
        }
    }
    values.into_iter().map(|((ts, _), v)| (ts, v)).collect()
}

fn threshold_satisfied(
    threshold: &Threshold,
    sample: &MetricSample,
    history: &[MetricSample],
    window: &PeriodWindow,
) -> bool {
    let observed = if threshold.aggregation == Aggregation::Latest
        && threshold.metric_type == sample.metric_type
    {
        Some(sample.value)
    } else {
        let values = period_values(threshold.metric_type, sample, history, window);
        aggregate(threshold.aggregation, &values, sample.timestamp)
    };

    observed.is_some_and(|value| threshold.comparator.compare(value, threshold.threshold))
}

fn aggregate(
    aggregation: Aggregation,
    values: &[(DateTime<Utc>, f64)],
    as_of: DateTime<Utc>,
) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let numbers = values.iter().map(|(_, v)| *v);
    match aggregation {
        Aggregation::Latest => values.iter().rev().find(|(ts, _)| *ts <= as_of).map(|(_, v)| *v),
        Aggregation::Sum => Some(numbers.sum()),
        Aggregation::Mean => Some(numbers.sum::<f64>() / values.len() as f64),
        Aggregation::Min => numbers.reduce(f64::min),
        Aggregation::Max => numbers.reduce(f64::max),
        Aggregation::Count => Some(values.len() as f64),
    }
}
