use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use wellness_core::metrics::profile;
use wellness_core::*;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap()
}

fn engine() -> RewardRuleEngine {
    let rules = [
        RuleConfig::threshold(
            "steps_10k",
            MetricType::Steps,
            Comparator::GreaterThanOrEqual,
            10_000.0,
            Period::Daily,
            5,
        ),
        RuleConfig::threshold(
            "steps_weekly_total",
            MetricType::Steps,
            Comparator::GreaterThanOrEqual,
            40_000.0,
            Period::Weekly,
            20,
        )
        .with_aggregation(Aggregation::Sum),
    ];
    RewardRuleEngine::from_config(&rules, PeriodBoundary::UTC_MIDNIGHT).unwrap()
}

/// Score samples one at a time in the given order, the way the pipeline does:
/// each sample sees the history recorded so far and the events already stored
fn replay(engine: &RewardRuleEngine, samples: &[MetricSample], events: &mut Vec<RewardEvent>) {
    let mut history: Vec<MetricSample> = Vec::new();
    for sample in samples {
        history.push(sample.clone());
        let awarded = engine.evaluate("user-1", sample.timestamp, sample, &history, &events[..]);
        events.extend(awarded);
    }
}

fn award_keys(events: &[RewardEvent]) -> BTreeSet<(String, String)> {
    events.iter().map(|e| (e.rule_id.clone(), e.period_key.to_string())).collect()
}

fn step_samples() -> impl Strategy<Value = Vec<MetricSample>> {
    prop::collection::vec((0i64..3 * 86_400, 0u32..15_000), 1..40).prop_map(|points| {
        points
            .into_iter()
            .map(|(offset, steps)| {
                MetricSample::simulated(
                    epoch() + Duration::seconds(offset),
                    MetricType::Steps,
                    f64::from(steps),
                )
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_generated_values_stay_in_bounds(seed in any::<u64>()) {
        let generator = MetricGenerator::with_all_metrics(
            std::time::Duration::from_secs(300),
            PeriodBoundary::UTC_MIDNIGHT,
        )
        .unwrap();
        let (samples, state) = generator.simulate(&generator.initial_state(seed, epoch()), 10_000);

        prop_assert_eq!(state.ticks(), 10_000);
        for sample in &samples {
            let p = profile(sample.metric_type);
            prop_assert!(
                p.contains(sample.value),
                "{} = {} outside [{}, {}]",
                sample.metric_type, sample.value, p.lower_bound, p.upper_bound
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_replay_awards_nothing_new(samples in step_samples()) {
        let engine = engine();
        let mut events = Vec::new();
        replay(&engine, &samples, &mut events);
        let first_pass = events.len();

        replay(&engine, &samples, &mut events);
        prop_assert_eq!(events.len(), first_pass);

        // At most one award per rule and period
        prop_assert_eq!(award_keys(&events).len(), events.len());
    }

    #[test]
    fn prop_award_set_ignores_arrival_order(
        (samples, shuffled) in step_samples()
            .prop_flat_map(|s| (Just(s.clone()), Just(s).prop_shuffle()))
    ) {
        let engine = engine();

        let mut in_order = Vec::new();
        replay(&engine, &samples, &mut in_order);
        let mut out_of_order = Vec::new();
        replay(&engine, &shuffled, &mut out_of_order);

        let daily = |events: &[RewardEvent]| -> BTreeSet<(String, String)> {
            award_keys(events).into_iter().filter(|(rule, _)| rule == "steps_10k").collect()
        };
        prop_assert_eq!(daily(&in_order), daily(&out_of_order));

        // Sum rules see every sample once the last one arrives
        let weekly = |events: &[RewardEvent]| events.iter().any(|e| e.rule_id == "steps_weekly_total");
        prop_assert_eq!(weekly(&in_order), weekly(&out_of_order));
    }

    #[test]
    fn prop_window_stats_are_order_independent(
        (samples, shuffled) in step_samples()
            .prop_flat_map(|s| (Just(s.clone()), Just(s).prop_shuffle()))
    ) {
        let as_of = epoch() + Duration::days(3);
        let a = summarize(&samples, MetricType::Steps, 7, as_of);
        let b = summarize(&shuffled, MetricType::Steps, 7, as_of);
        prop_assert_eq!(&a, &b);

        let stats = a.require_stats().unwrap();
        prop_assert_eq!(stats.sample_count, samples.len());
        prop_assert!(stats.min <= stats.mean && stats.mean <= stats.max);
    }
}
