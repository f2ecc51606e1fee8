use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;
use wellness_core::{
    MetricGenerator, MetricSample, MetricType, PeriodBoundary, RewardRuleEngine, default_rules,
    summarize,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap()
}

fn simulated_history(ticks: u64) -> Vec<MetricSample> {
    let generator =
        MetricGenerator::with_all_metrics(Duration::from_secs(60), PeriodBoundary::UTC_MIDNIGHT)
            .unwrap();
    generator.simulate(&generator.initial_state(7, start()), ticks).0
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.measurement_time(Duration::from_secs(5));

    let generator =
        MetricGenerator::with_all_metrics(Duration::from_secs(5), PeriodBoundary::UTC_MIDNIGHT)
            .unwrap();
    for ticks in [100u64, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("simulate", ticks), ticks, |b, &ticks| {
            b.iter(|| black_box(generator.simulate(&generator.initial_state(42, start()), ticks)));
        });
    }
    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");
    group.measurement_time(Duration::from_secs(5));

    let engine =
        RewardRuleEngine::from_config(&default_rules(), PeriodBoundary::UTC_MIDNIGHT).unwrap();
    for ticks in [60u64, 1_440].iter() {
        let history = simulated_history(*ticks);
        let trigger = history
            .iter()
            .rev()
            .find(|s| s.metric_type == MetricType::Steps)
            .cloned()
            .unwrap();
        group.bench_with_input(BenchmarkId::new("evaluate", ticks), &history, |b, history| {
            b.iter(|| {
                black_box(engine.evaluate("bench-user", trigger.timestamp, &trigger, history, &[]))
            });
        });
    }
    group.finish();
}

fn bench_rolling_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_window");
    group.measurement_time(Duration::from_secs(5));

    let history = simulated_history(7 * 1_440);
    let as_of = start() + ChronoDuration::days(7);
    for days in [1u32, 7].iter() {
        group.bench_with_input(BenchmarkId::new("summarize", days), days, |b, &days| {
            b.iter(|| black_box(summarize(&history, MetricType::HeartRate, days, as_of)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generation, bench_evaluation, bench_rolling_window);
criterion_main!(benches);
