//! Synthetic metric stream with bounded random-walk dynamics
//!
//! The generator is a pure state machine: `generate_tick` takes the previous
//! state and returns the samples for the next tick together with the new
//! state. The random number generator lives inside the state, so the same
//! seed and start time always reproduce the same stream.

use crate::constants::activity;
use crate::error::{WellnessError, WellnessResult};
use crate::metrics::{MetricKind, MetricProfile, profile};
use crate::period::PeriodBoundary;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use wellness_types::{MetricSample, MetricType};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Upper bound on samples reserved up front by `simulate`
const MAX_PREALLOCATED_SAMPLES: usize = 1 << 16;

fn preallocation(ticks: u64, metrics: usize) -> usize {
    usize::try_from(ticks)
        .ok()
        .and_then(|ticks| ticks.checked_mul(metrics))
        .map_or(MAX_PREALLOCATED_SAMPLES, |n| n.min(MAX_PREALLOCATED_SAMPLES))
}

/// Everything the generator needs to produce the next tick
#[derive(Debug, Clone)]
pub struct GeneratorState {
    clock: DateTime<Utc>,
    values: BTreeMap<MetricType, f64>,
    rng: StdRng,
    ticks: u64,
}

impl GeneratorState {
    /// Simulated time of the last tick
    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Number of ticks generated so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current internal value of a metric
    pub fn value(&self, metric_type: MetricType) -> Option<f64> {
        self.values.get(&metric_type).copied()
    }
}

/// Produces one sample per tracked metric on every tick
#[derive(Debug, Clone)]
pub struct MetricGenerator {
    tick_interval: Duration,
    boundary: PeriodBoundary,
    profiles: Vec<MetricProfile>,
}

impl MetricGenerator {
    /// Create a generator for the given metrics
    pub fn new(
        tick_interval: std::time::Duration,
        boundary: PeriodBoundary,
        metrics: &[MetricType],
    ) -> WellnessResult<Self> {
        let tick_interval = Duration::from_std(tick_interval)
            .ok()
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| WellnessError::Validation {
                message: format!("tick interval {tick_interval:?} must be positive"),
                rule_id: None,
                field: Some("tick_interval_seconds".to_string()),
            })?;

        let mut tracked: Vec<MetricType> = metrics.to_vec();
        tracked.sort();
        tracked.dedup();
        if tracked.is_empty() {
            return Err(WellnessError::Validation {
                message: "at least one metric must be simulated".to_string(),
                rule_id: None,
                field: Some("metrics".to_string()),
            });
        }

        info!(
            tick_ms = tick_interval.num_milliseconds(),
            metrics = tracked.len(),
            "Creating metric generator"
        );

        Ok(Self { tick_interval, boundary, profiles: tracked.into_iter().map(profile).collect() })
    }

    /// Generator covering the whole metric catalogue
    pub fn with_all_metrics(
        tick_interval: std::time::Duration,
        boundary: PeriodBoundary,
    ) -> WellnessResult<Self> {
        Self::new(tick_interval, boundary, &MetricType::ALL)
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn metrics(&self) -> impl Iterator<Item = MetricType> + '_ {
        self.profiles.iter().map(|p| p.metric_type)
    }

    /// Seeded starting state; the first tick is emitted one interval after `start_at`
    pub fn initial_state(&self, seed: u64, start_at: DateTime<Utc>) -> GeneratorState {
        GeneratorState {
            clock: start_at,
            values: self.profiles.iter().map(|p| (p.metric_type, p.initial_value())).collect(),
            rng: StdRng::seed_from_u64(seed),
            ticks: 0,
        }
    }

    /// Advance the simulation by one tick
    pub fn generate_tick(&self, previous: &GeneratorState) -> (Vec<MetricSample>, GeneratorState) {
        let mut state = previous.clone();
        let next_clock = previous.clock + self.tick_interval;
        let rolled_over =
            self.boundary.period_date(previous.clock) != self.boundary.period_date(next_clock);
        let hour = self.boundary.local_hour(next_clock);
        let multiplier = activity::multiplier(hour);
        let day_fraction = self.tick_interval.num_milliseconds() as f64 / MILLIS_PER_DAY;

        let mut samples = Vec::with_capacity(self.profiles.len());
        for p in &self.profiles {
            let previous_value =
                state.values.get(&p.metric_type).copied().unwrap_or_else(|| p.initial_value());
            let z: f64 = state.rng.sample(StandardNormal);

            let proposed = match p.kind {
                MetricKind::Gauge { mean_reversion } => {
                    let target = match p.metric_type {
                        MetricType::HeartRate => p.baseline + 10.0 * (multiplier - 1.0),
                        MetricType::MoodScore => p.baseline + activity::mood_shift(hour),
                        _ => p.baseline,
                    };
                    previous_value + mean_reversion * (target - previous_value) + z * p.volatility
                }
                MetricKind::DailyCounter => {
                    let carried = if rolled_over { p.lower_bound } else { previous_value };
                    let expected = p.baseline * day_fraction * multiplier;
                    carried + (expected + z * expected * p.volatility).max(0.0)
                }
                MetricKind::Nightly { mean_reversion } => {
                    if rolled_over {
                        previous_value
                            + mean_reversion * (p.baseline - previous_value)
                            + z * p.volatility
                    } else {
                        previous_value
                    }
                }
            };

            let value = if p.contains(proposed) {
                proposed
            } else {
                let violation = WellnessError::RangeViolation {
                    metric: p.metric_type,
                    value: proposed,
                    lower: p.lower_bound,
                    upper: p.upper_bound,
                };
                warn!(error = %violation, "Clamping simulated value into bounds");
                p.clamp(proposed)
            };
            state.values.insert(p.metric_type, value);

            let emitted = match (p.integral, p.kind) {
                (false, _) => value,
                (true, MetricKind::DailyCounter) => value.floor(),
                (true, _) => value.round(),
            };
            samples.push(MetricSample::simulated(next_clock, p.metric_type, emitted));
        }

        state.clock = next_clock;
        state.ticks += 1;
        debug!(tick = state.ticks, clock = %next_clock, rolled_over, "Generated metric tick");

        (samples, state)
    }

    /// Run `ticks` ticks back to back, collecting every sample
    pub fn simulate(
        &self,
        state: &GeneratorState,
        ticks: u64,
    ) -> (Vec<MetricSample>, GeneratorState) {
        let mut current = state.clone();
        let mut all = Vec::with_capacity(preallocation(ticks, self.profiles.len()));
        for _ in 0..ticks {
            let (samples, next) = self.generate_tick(&current);
            all.extend(samples);
            current = next;
        }
        (all, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap()
    }

    fn hourly() -> MetricGenerator {
        MetricGenerator::with_all_metrics(
            std::time::Duration::from_secs(3600),
            PeriodBoundary::UTC_MIDNIGHT,
        )
        .unwrap()
    }

    #[test]
    fn test_same_seed_reproduces_stream() {
        let generator = hourly();
        let (a, _) = generator.simulate(&generator.initial_state(42, start()), 48);
        let (b, _) = generator.simulate(&generator.initial_state(42, start()), 48);
        let (c, _) = generator.simulate(&generator.initial_state(43, start()), 48);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_tick_advances_clock_and_emits_one_sample_per_metric() {
        let generator = hourly();
        let state = generator.initial_state(7, start());
        let (samples, next) = generator.generate_tick(&state);

        assert_eq!(samples.len(), MetricType::ALL.len());
        assert_eq!(next.clock(), start() + Duration::hours(1));
        assert_eq!(next.ticks(), 1);
        assert!(samples.iter().all(|s| s.timestamp == next.clock()));
        // The previous state is left untouched
        assert_eq!(state.ticks(), 0);
    }

    #[test]
    fn test_counters_reset_at_period_boundary() {
        let generator = MetricGenerator::new(
            std::time::Duration::from_secs(3600),
            PeriodBoundary::UTC_MIDNIGHT,
            &[MetricType::Steps],
        )
        .unwrap();
        let state = generator.initial_state(1, start());
        let (_, end_of_day) = generator.simulate(&state, 23);
        let total_day_one = end_of_day.value(MetricType::Steps).unwrap();

        let (_, next_day) = generator.simulate(&end_of_day, 1);
        assert!(total_day_one > 1000.0, "a simulated day should accumulate steps");
        assert!(next_day.value(MetricType::Steps).unwrap() < total_day_one);
    }

    #[test]
    fn test_preallocation_is_capped() {
        assert_eq!(preallocation(12, 7), 84);
        assert_eq!(preallocation(0, 7), 0);
        assert_eq!(preallocation(u64::MAX, 7), MAX_PREALLOCATED_SAMPLES);
        assert_eq!(preallocation(1 << 40, 7), MAX_PREALLOCATED_SAMPLES);

        let generator = hourly();
        let (samples, _) = generator.simulate(&generator.initial_state(3, start()), 2);
        assert_eq!(samples.len(), 2 * MetricType::ALL.len());
    }

    #[test]
    fn test_invalid_generator_configuration() {
        let zero = MetricGenerator::with_all_metrics(
            std::time::Duration::ZERO,
            PeriodBoundary::UTC_MIDNIGHT,
        );
        assert!(matches!(zero, Err(WellnessError::Validation { .. })));

        let empty = MetricGenerator::new(
            std::time::Duration::from_secs(5),
            PeriodBoundary::UTC_MIDNIGHT,
            &[],
        );
        assert!(empty.is_err());
    }
}
