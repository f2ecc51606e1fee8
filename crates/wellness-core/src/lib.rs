#![allow(missing_docs)]
//! Core of the wellness dashboard.
//!
//! This crate simulates health metrics, scores them against configurable
//! reward rules with exactly-once awards per rule and period, and keeps the
//! rolling analytics behind the dashboard. Storage is reached only through
//! the [`store::PersistenceGateway`] trait.

use tracing::{debug, instrument};

/// Rolling windows, trends and reward roll-ups
pub mod aggregation;
/// Discardable cache of computed windows
pub mod cache;
/// Engine configuration and startup validation
pub mod config;
/// Default values and time-of-day activity tables
pub mod constants;
/// Caller-supplied time budgets
pub mod deadline;
/// Reward rule evaluation
pub mod engine;
/// Error taxonomy shared by every component
pub mod error;
/// Seeded metric simulation
pub mod generator;
/// Insight generator hand-off
pub mod insights;
/// Per-metric bounds and dynamics
pub mod metrics;
/// Reward periods and their keys
pub mod period;
/// Rule definitions and their configuration form
pub mod rules;
/// Deadline-bounded scoring and analytics over a gateway
pub mod service;
/// Persistence gateway and its in-memory implementation
pub mod store;
/// Task completion rewards
pub mod tasks;

pub use aggregation::{
    AggregatedStats, RewardSummary, RollingWindow, TrendMethod, WindowStats, balance, summarize,
    summarize_rewards, summarize_within,
};
pub use config::{EngineConfig, ValidatedConfig, default_rules};
pub use deadline::Deadline;
pub use engine::RewardRuleEngine;
pub use error::{ErrorSeverity, WellnessError, WellnessResult};
pub use generator::{GeneratorState, MetricGenerator};
pub use insights::{InsightGenerator, InsightRequest, TemplateInsightGenerator};
pub use period::{Period, PeriodBoundary, PeriodState, PeriodWindow, period_key, period_state};
pub use rules::{Aggregation, Combinator, Comparator, RewardRule, RuleCondition, RuleConfig};
pub use service::{ScoreOutcome, WellnessService, spawn_insight};
pub use store::{InMemoryGateway, PersistenceGateway};
pub use tasks::{Difficulty, TaskCompletion, TaskRewardTable};

pub use wellness_types::{MetricSample, MetricType, PeriodKey, RewardEvent, TimeRange};

/// Initialize the core components
#[instrument]
pub fn init() -> anyhow::Result<()> {
    debug!("Initializing wellness core");
    Ok(())
}
