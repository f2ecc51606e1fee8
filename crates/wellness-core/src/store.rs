//! Persistence gateway: the only component that touches storage
//!
//! The core talks to storage exclusively through [`PersistenceGateway`].
//! Implementations must enforce the reward uniqueness constraint atomically:
//! of two concurrent appends with the same `(rule_id, user_id, period_key)`,
//! exactly one succeeds and the other fails with `DuplicateEvent`.

use crate::error::{WellnessError, WellnessResult};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use wellness_types::{EventKey, MetricSample, MetricType, PeriodKey, RewardEvent, TimeRange};

/// Narrow read/append interface to the time-series and reward stores
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Append an immutable sample
    async fn append_sample(&self, sample: MetricSample) -> WellnessResult<()>;

    /// Append a reward event; fails with `DuplicateEvent` when the key is taken
    async fn append_reward_event(&self, event: RewardEvent) -> WellnessResult<()>;

    /// Samples of one metric inside `range`, in timestamp order
    async fn query_samples(
        &self,
        metric_type: MetricType,
        range: TimeRange,
    ) -> WellnessResult<Vec<MetricSample>>;

    /// The event stored under a uniqueness key, if any
    async fn query_events(
        &self,
        user_id: &str,
        rule_id: &str,
        period_key: &PeriodKey,
    ) -> WellnessResult<Option<RewardEvent>>;

    /// Every event of a user, optionally restricted to `awarded_at` in `range`,
    /// ordered by award time
    async fn events_for_user(
        &self,
        user_id: &str,
        range: Option<TimeRange>,
    ) -> WellnessResult<Vec<RewardEvent>>;
}

/// Counters describing what an in-memory gateway has stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub samples_appended: u64,
    pub events_appended: u64,
    pub duplicates_rejected: u64,
}

/// Gateway backed by concurrent in-process maps
///
/// The uniqueness guard is the map entry itself: checking and inserting happen
/// under the same shard lock, so the check-and-emit is atomic.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    samples: DashMap<MetricType, Vec<MetricSample>>,
    events: DashMap<EventKey, RewardEvent>,
    samples_appended: AtomicU64,
    events_appended: AtomicU64,
    duplicates_rejected: AtomicU64,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            samples_appended: self.samples_appended.load(Ordering::Relaxed),
            events_appended: self.events_appended.load(Ordering::Relaxed),
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn append_sample(&self, sample: MetricSample) -> WellnessResult<()> {
        if !sample.value.is_finite() {
            return Err(WellnessError::storage(
                "append_sample",
                format!("refusing non-finite {} value", sample.metric_type),
            ));
        }
        self.samples.entry(sample.metric_type).or_default().push(sample);
        self.samples_appended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn append_reward_event(&self, event: RewardEvent) -> WellnessResult<()> {
        match self.events.entry(event.key()) {
            Entry::Occupied(existing) => {
                self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(key = %existing.key(), "Rejected duplicate reward event");
                Err(WellnessError::DuplicateEvent { key: existing.key().clone() })
            }
            Entry::Vacant(slot) => {
                slot.insert(event);
                self.events_appended.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    async fn query_samples(
        &self,
        metric_type: MetricType,
        range: TimeRange,
    ) -> WellnessResult<Vec<MetricSample>> {
        let mut found: Vec<MetricSample> = self
            .samples
            .get(&metric_type)
            .map(|stored| stored.iter().filter(|s| range.contains(s.timestamp)).cloned().collect())
            .unwrap_or_default();
        found.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(found)
    }

    async fn query_events(
        &self,
        user_id: &str,
        rule_id: &str,
        period_key: &PeriodKey,
    ) -> WellnessResult<Option<RewardEvent>> {
        let key = EventKey {
            user_id: user_id.to_string(),
            rule_id: rule_id.to_string(),
            period_key: period_key.clone(),
        };
        Ok(self.events.get(&key).map(|e| e.value().clone()))
    }

    async fn events_for_user(
        &self,
        user_id: &str,
        range: Option<TimeRange>,
    ) -> WellnessResult<Vec<RewardEvent>> {
        let mut found: Vec<RewardEvent> = self
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| range.is_none_or(|r| r.contains(e.awarded_at)))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| a.awarded_at.cmp(&b.awarded_at).then(a.event_id.cmp(&b.event_id)));
        Ok(found)
    }
}
