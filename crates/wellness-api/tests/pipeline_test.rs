use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use wellness_api::{AppConfig, DEFAULT_CONFIG, RuntimeSettings, build_service, run};
use wellness_core::{
    InsightGenerator, InsightRequest, MetricGenerator, MetricType, WellnessResult,
};

struct CountingInsights {
    calls: AtomicUsize,
}

#[async_trait]
impl InsightGenerator for CountingInsights {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, request: &InsightRequest) -> WellnessResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} samples", request.recent_samples.len()))
    }
}

fn settings(config: &AppConfig) -> (RuntimeSettings, MetricGenerator, wellness_core::ValidatedConfig) {
    let validated = config.validate().unwrap();
    let mut settings = RuntimeSettings::from_config(config, &validated);
    settings.start_at = Utc.with_ymd_and_hms(2026, 10, 16, 6, 0, 0).unwrap();
    settings.tick_interval = Duration::from_millis(5);
    settings.refresh_interval = Duration::from_millis(20);

    // Simulated time moves an hour per tick while the wall clock moves 5 ms
    let generator = MetricGenerator::with_all_metrics(
        Duration::from_secs(3600),
        validated.boundary,
    )
    .unwrap();
    (settings, generator, validated)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pipeline_runs_fixed_number_of_ticks() {
    println!("🧪 Running the scheduled pipeline for 24 ticks");

    let config = AppConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
    let (settings, generator, validated) = settings(&config);
    let settings = settings.with_max_ticks(Some(24));
    let service = build_service(&validated);
    let insights = Arc::new(CountingInsights { calls: AtomicUsize::new(0) });
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let report = run(
        Arc::clone(&service),
        generator,
        settings,
        Some(insights.clone() as Arc<dyn InsightGenerator>),
        shutdown_rx,
    )
    .await
    .unwrap();

    println!("✅ {report:?}");
    let metrics = MetricType::ALL.len() as u64;
    assert_eq!(report.ticks, 24);
    assert_eq!(report.samples_recorded, 24 * metrics);
    assert_eq!(report.samples_scored + report.samples_skipped, report.samples_recorded);
    assert_eq!(report.scoring_failures, 0);
    assert_eq!(report.balance, report.coins_awarded);
    assert!(report.windows_refreshed >= metrics);

    let window = service.cached_window(MetricType::HeartRate, validated.window_days).unwrap();
    assert_eq!(window.require_stats().unwrap().sample_count, 24);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pipeline_stops_on_shutdown() {
    let config = AppConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
    let (settings, generator, validated) = settings(&config);
    let service = build_service(&validated);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run(service, generator, settings, None, shutdown_rx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send_replace(true);

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pipeline did not stop")
        .unwrap()
        .unwrap();
    assert!(report.ticks >= 1);
    assert_eq!(report.samples_recorded, report.ticks * MetricType::ALL.len() as u64);
}

#[tokio::test]
async fn test_invalid_rules_abort_before_start() {
    let config = AppConfig::from_toml_str(
        r#"
[[rules]]
rule_id = "bad"
metric_type = "blood_pressure"
comparator = ">"
threshold = 120.0
coin_value = 1
"#,
    )
    .unwrap();

    let err = config.validate().unwrap_err();
    println!("✅ Rejected: {err:#}");
    assert!(format!("{err:#}").contains("blood_pressure"));
}
