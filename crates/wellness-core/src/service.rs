//! Wellness service: scoring, analytics and rewards on top of a gateway
//!
//! The service glues the pure parts of the core (engine, aggregation, tasks)
//! to a [`PersistenceGateway`]. Scoring a sample runs in two phases:
//!
//! 1. read and evaluate, bounded by the caller's [`Deadline`]; abandoning it
//!    leaves no trace;
//! 2. commit, which is never cancelled: every event is appended through the
//!    gateway's uniqueness guard, and losing a race is not an error.

use crate::aggregation::{RewardSummary, RollingWindow, balance, summarize_rewards, summarize_within};
use crate::cache::WindowCache;
use crate::deadline::Deadline;
use crate::engine::RewardRuleEngine;
use crate::error::WellnessResult;
use crate::insights::{InsightGenerator, InsightRequest};
use crate::period::period_key;
use crate::store::PersistenceGateway;
use crate::tasks::{Difficulty, TaskCompletion, TaskRewardTable, task_reward_event};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use wellness_types::{MetricSample, MetricType, RewardEvent, TimeRange};

/// Result of scoring one sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreOutcome {
    /// Events this call committed
    pub awarded: Vec<RewardEvent>,
    /// Candidates another writer committed first
    pub duplicates: usize,
}

impl ScoreOutcome {
    pub fn coins(&self) -> u64 {
        self.awarded.iter().map(|e| u64::from(e.coin_value)).sum()
    }
}

pub struct WellnessService {
    gateway: Arc<dyn PersistenceGateway>,
    engine: Arc<RewardRuleEngine>,
    task_rewards: TaskRewardTable,
    windows: WindowCache,
}

impl WellnessService {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, engine: Arc<RewardRuleEngine>) -> Self {
        Self { gateway, engine, task_rewards: TaskRewardTable::default(), windows: WindowCache::new() }
    }

    pub fn with_task_rewards(mut self, task_rewards: TaskRewardTable) -> Self {
        self.task_rewards = task_rewards;
        self
    }

    pub fn engine(&self) -> &RewardRuleEngine {
        &self.engine
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    pub fn window_cache(&self) -> &WindowCache {
        &self.windows
    }

    /// Persist a sample; samples are never scored here
    #[instrument(skip(self, sample), fields(metric = %sample.metric_type, ts = %sample.timestamp))]
    pub async fn record_sample(&self, sample: MetricSample) -> WellnessResult<()> {
        self.gateway.append_sample(sample).await
    }

    /// Score a stored sample on behalf of `user_id`
    ///
    /// On timeout nothing is committed and the error is retryable. Retrying is
    /// safe: candidates already committed come back as duplicates.
    #[instrument(skip(self, sample, deadline), fields(metric = %sample.metric_type, ts = %sample.timestamp))]
    pub async fn score_sample(
        &self,
        user_id: &str,
        sample: &MetricSample,
        now: DateTime<Utc>,
        deadline: Deadline,
    ) -> WellnessResult<ScoreOutcome> {
        let candidates = bounded(
            &deadline,
            "reward evaluation",
            self.reward_candidates(user_id, sample, now, &deadline),
        )
        .await?;

        // Last point where the call can still be abandoned
        deadline.check("reward evaluation")?;

        self.commit(candidates).await
    }

    async fn reward_candidates(
        &self,
        user_id: &str,
        sample: &MetricSample,
        now: DateTime<Utc>,
        deadline: &Deadline,
    ) -> WellnessResult<Vec<RewardEvent>> {
        let mut history = Vec::new();
        for (metric, range) in self.engine.history_ranges(sample) {
            history.extend(self.gateway.query_samples(metric, range).await?);
        }

        let mut existing = Vec::new();
        for rule in self.engine.rules_for(sample.metric_type) {
            let key = period_key(sample.timestamp, rule.period, self.engine.boundary());
            if let Some(event) = self.gateway.query_events(user_id, &rule.rule_id, &key).await? {
                existing.push(event);
            }
        }

        self.engine.evaluate_within(user_id, now, sample, &history, &existing, deadline)
    }

    async fn commit(&self, candidates: Vec<RewardEvent>) -> WellnessResult<ScoreOutcome> {
        let mut outcome = ScoreOutcome::default();
        for event in candidates {
            match self.gateway.append_reward_event(event.clone()).await {
                Ok(()) => {
                    info!(
                        rule_id = %event.rule_id,
                        user_id = %event.user_id,
                        period = %event.period_key,
                        coins = event.coin_value,
                        "Reward awarded"
                    );
                    outcome.awarded.push(event);
                }
                Err(e) if e.is_duplicate() => {
                    debug!(key = %event.key(), "Reward already committed by another writer");
                    outcome.duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    /// Rolling window for `metric_type` ending at `as_of`; refreshes the cache
    #[instrument(skip(self, deadline))]
    pub async fn summarize(
        &self,
        metric_type: MetricType,
        window_days: u32,
        as_of: DateTime<Utc>,
        deadline: Deadline,
    ) -> WellnessResult<RollingWindow> {
        let range = TimeRange::trailing_days(as_of, window_days);
        let samples =
            bounded(&deadline, "window aggregation", self.gateway.query_samples(metric_type, range))
                .await?;
        let window = summarize_within(&samples, metric_type, window_days, as_of, &deadline)?;
        self.windows.store(window.clone());
        Ok(window)
    }

    /// Last computed window, possibly stale
    pub fn cached_window(&self, metric_type: MetricType, window_days: u32) -> Option<RollingWindow> {
        self.windows.get(metric_type, window_days)
    }

    /// Recompute the cached windows of `metrics`; returns how many succeeded
    pub async fn refresh_windows(
        &self,
        metrics: &[MetricType],
        window_days: u32,
        as_of: DateTime<Utc>,
        deadline: Deadline,
    ) -> usize {
        let mut refreshed = 0;
        for &metric in metrics {
            match self.summarize(metric, window_days, as_of, deadline).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(%metric, error = %e, "Window refresh failed"),
            }
        }
        debug!(refreshed, total = metrics.len(), "Window cache refreshed");
        refreshed
    }

    /// Sum of every coin ever awarded to the user
    pub async fn current_balance(&self, user_id: &str) -> WellnessResult<u64> {
        let events = self.gateway.events_for_user(user_id, None).await?;
        Ok(balance(&events, user_id))
    }

    pub async fn reward_summary(
        &self,
        user_id: &str,
        window_days: u32,
        as_of: DateTime<Utc>,
    ) -> WellnessResult<RewardSummary> {
        let events = self.gateway.events_for_user(user_id, None).await?;
        Ok(summarize_rewards(&events, user_id, window_days, as_of))
    }

    /// Pay out a completed task; a task already paid yields 0 coins
    #[instrument(skip(self, completion))]
    pub async fn complete_task(
        &self,
        user_id: &str,
        task_id: &str,
        task_type: &str,
        difficulty: Difficulty,
        completion: Option<&TaskCompletion>,
        completed_at: DateTime<Utc>,
    ) -> WellnessResult<u32> {
        let coins = self.task_rewards.calculate(task_type, difficulty, completion);
        let event = task_reward_event(user_id, task_id, coins, completed_at);
        match self.gateway.append_reward_event(event).await {
            Ok(()) => {
                info!(coins, "Task reward awarded");
                Ok(coins)
            }
            Err(e) if e.is_duplicate() => {
                debug!("Task already rewarded");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Collect recent samples and rewards for an insight generator
    pub async fn insight_request(
        &self,
        user_id: &str,
        window_days: u32,
        as_of: DateTime<Utc>,
    ) -> WellnessResult<InsightRequest> {
        let range = TimeRange::trailing_days(as_of, window_days);
        let mut recent_samples = Vec::new();
        for metric in MetricType::ALL {
            recent_samples.extend(self.gateway.query_samples(metric, range).await?);
        }
        let recent_reward_summary = self.reward_summary(user_id, window_days, as_of).await?;
        Ok(InsightRequest { user_id: user_id.to_string(), recent_samples, recent_reward_summary })
    }
}

/// Run an insight generator off the caller's task
pub fn spawn_insight(
    generator: Arc<dyn InsightGenerator>,
    request: InsightRequest,
) -> JoinHandle<WellnessResult<String>> {
    tokio::spawn(async move {
        let insight = generator.generate(&request).await;
        if let Err(e) = &insight {
            warn!(generator = generator.name(), error = %e, "Insight generation failed");
        }
        insight
    })
}

async fn bounded<T, F>(deadline: &Deadline, operation: &str, fut: F) -> WellnessResult<T>
where
    F: Future<Output = WellnessResult<T>>,
{
    match deadline.remaining() {
        None => fut.await,
        Some(remaining) => match tokio::time::timeout(remaining, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, "Deadline exceeded");
                Err(deadline.timeout_error(operation))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::TemplateInsightGenerator;
    use crate::period::{Period, PeriodBoundary};
    use crate::rules::{Comparator, RuleConfig};
    use crate::store::InMemoryGateway;
    use crate::tasks::Difficulty;
    use chrono::{Duration, TimeZone};

    fn service() -> (Arc<InMemoryGateway>, WellnessService) {
        let gateway = Arc::new(InMemoryGateway::new());
        let rules = [RuleConfig::threshold(
            "steps_10k",
            MetricType::Steps,
            Comparator::GreaterThanOrEqual,
            10_000.0,
            Period::Daily,
            5,
        )];
        let engine = RewardRuleEngine::from_config(&rules, PeriodBoundary::UTC_MIDNIGHT).unwrap();
        let service = WellnessService::new(gateway.clone(), Arc::new(engine));
        (gateway, service)
    }

    #[tokio::test]
    async fn test_score_twice_awards_once() {
        let (_, service) = service();
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap();
        let sample = MetricSample::simulated(ts, MetricType::Steps, 12_000.0);
        service.record_sample(sample.clone()).await.unwrap();

        let first = service.score_sample("u1", &sample, ts, Deadline::unbounded()).await.unwrap();
        assert_eq!(first.awarded.len(), 1);
        assert_eq!(first.coins(), 5);

        let second = service.score_sample("u1", &sample, ts, Deadline::unbounded()).await.unwrap();
        assert!(second.awarded.is_empty());
        assert_eq!(service.current_balance("u1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_expired_deadline_commits_nothing() {
        let (gateway, service) = service();
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap();
        let sample = MetricSample::simulated(ts, MetricType::Steps, 12_000.0);
        service.record_sample(sample.clone()).await.unwrap();

        let err = service
            .score_sample("u1", &sample, ts, Deadline::after(std::time::Duration::ZERO))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(gateway.event_count(), 0);
    }

    #[tokio::test]
    async fn test_summarize_fills_cache() {
        let (_, service) = service();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap();
        for (i, steps) in [4_000.0, 9_000.0].into_iter().enumerate() {
            let ts = now - Duration::days(i as i64);
            service.record_sample(MetricSample::simulated(ts, MetricType::Steps, steps)).await.unwrap();
        }

        let window = service.summarize(MetricType::Steps, 7, now, Deadline::unbounded()).await.unwrap();
        assert_eq!(window.require_stats().unwrap().sample_count, 2);
        assert_eq!(service.cached_window(MetricType::Steps, 7), Some(window));
    }

    #[tokio::test]
    async fn test_task_completion_paid_once() {
        let (_, service) = service();
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let coins =
            service.complete_task("u1", "t-7", "exercise", Difficulty::Hard, None, at).await.unwrap();
        assert_eq!(coins, 32);
        let again =
            service.complete_task("u1", "t-7", "exercise", Difficulty::Hard, None, at).await.unwrap();
        assert_eq!(again, 0);
        assert_eq!(service.current_balance("u1").await.unwrap(), 32);

        // Reporting the same task under another type does not pay it again
        let relabelled =
            service.complete_task("u1", "t-7", "meditation", Difficulty::Easy, None, at).await.unwrap();
        assert_eq!(relabelled, 0);
        assert_eq!(service.current_balance("u1").await.unwrap(), 32);

        // Another user completing the same task id is paid
        let other =
            service.complete_task("u2", "t-7", "meditation", Difficulty::Easy, None, at).await.unwrap();
        assert_eq!(other, 15);
    }

    #[tokio::test]
    async fn test_huge_windows_are_served() {
        let (_, service) = service();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap();
        service
            .record_sample(MetricSample::simulated(now, MetricType::Steps, 1_200.0))
            .await
            .unwrap();

        let window =
            service.summarize(MetricType::Steps, u32::MAX, now, Deadline::unbounded()).await.unwrap();
        assert_eq!(window.require_stats().unwrap().sample_count, 1);

        let request = service.insight_request("u1", u32::MAX, now).await.unwrap();
        assert_eq!(request.recent_samples.len(), 1);
        assert_eq!(request.recent_reward_summary.lifetime_coins, 0);
    }

    #[tokio::test]
    async fn test_insight_runs_in_background() {
        let (_, service) = service();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap();
        service
            .record_sample(MetricSample::simulated(now, MetricType::WaterIntake, 2.0))
            .await
            .unwrap();

        let request = service.insight_request("u1", 7, now).await.unwrap();
        assert_eq!(request.recent_samples.len(), 1);

        let text = spawn_insight(Arc::new(TemplateInsightGenerator), request).await.unwrap().unwrap();
        assert!(text.contains("glass of water"));
    }
}
