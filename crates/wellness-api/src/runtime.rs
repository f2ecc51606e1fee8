//! Scheduled pipeline: generator, scoring consumer and analytics refresh
//!
//! The generator appends every sample through the gateway and offers it to
//! the scorer over a bounded queue without waiting. The scorer evaluates each
//! sample under a deadline. The refresh task rebuilds the window cache from
//! the store on its own interval. The tasks share nothing but the gateway and
//! a watch channel carrying the simulated clock.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wellness_core::{
    Deadline, InMemoryGateway, InsightGenerator, MetricGenerator, MetricSample, MetricType,
    RewardRuleEngine, ValidatedConfig, WellnessService, spawn_insight,
};

use crate::config::AppConfig;

/// Pipeline settings resolved from configuration
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub user_id: String,
    pub seed: u64,
    pub start_at: DateTime<Utc>,
    pub tick_interval: Duration,
    pub evaluation_timeout: Duration,
    pub queue_capacity: usize,
    pub window_days: u32,
    pub refresh_interval: Duration,
    /// Stop after this many ticks; run until shutdown otherwise
    pub max_ticks: Option<u64>,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig, validated: &ValidatedConfig) -> Self {
        Self {
            user_id: config.scoring.user_id.clone(),
            seed: config.simulation.seed,
            start_at: config.simulation.start_at.unwrap_or_else(Utc::now),
            tick_interval: validated.tick_interval,
            evaluation_timeout: config.evaluation_timeout(),
            queue_capacity: config.scoring.queue_capacity,
            window_days: validated.window_days,
            refresh_interval: config.refresh_interval(),
            max_ticks: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

/// What a pipeline run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub ticks: u64,
    pub samples_recorded: u64,
    pub samples_scored: u64,
    /// Recorded but never scored because the queue was full
    pub samples_skipped: u64,
    pub scoring_failures: u64,
    pub events_awarded: u64,
    pub coins_awarded: u64,
    pub balance: u64,
    pub windows_refreshed: u64,
}

#[derive(Debug, Default)]
struct GeneratorReport {
    ticks: u64,
    recorded: u64,
    skipped: u64,
}

#[derive(Debug, Default)]
struct ScoringReport {
    scored: u64,
    failures: u64,
    events: u64,
    coins: u64,
}

/// Build a service over an in-memory store from validated configuration
pub fn build_service(validated: &ValidatedConfig) -> Arc<WellnessService> {
    let engine = RewardRuleEngine::new(validated.rules.clone(), validated.boundary);
    Arc::new(WellnessService::new(Arc::new(InMemoryGateway::new()), Arc::new(engine)))
}

/// Run the pipeline until `max_ticks` is reached or `shutdown` flips to true
pub async fn run(
    service: Arc<WellnessService>,
    generator: MetricGenerator,
    settings: RuntimeSettings,
    insights: Option<Arc<dyn InsightGenerator>>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<RunReport> {
    info!(
        user_id = %settings.user_id,
        seed = settings.seed,
        tick_ms = settings.tick_interval.as_millis() as u64,
        max_ticks = ?settings.max_ticks,
        "Starting wellness pipeline"
    );

    let (sample_tx, sample_rx) = mpsc::channel(settings.queue_capacity);
    let (clock_tx, clock_rx) = watch::channel(settings.start_at);
    let (stop_tx, stop_rx) = watch::channel(false);

    let generator_task = tokio::spawn(generate_loop(
        Arc::clone(&service),
        generator,
        settings.clone(),
        sample_tx,
        clock_tx,
        shutdown,
    ));
    let scoring_task = tokio::spawn(score_loop(
        Arc::clone(&service),
        settings.clone(),
        insights,
        sample_rx,
        clock_rx.clone(),
    ));
    let refresh_task =
        tokio::spawn(refresh_loop(Arc::clone(&service), settings.clone(), clock_rx.clone(), stop_rx));

    let generated = generator_task.await.context("Generator task panicked")?;
    let scored = scoring_task.await.context("Scoring task panicked")?;
    stop_tx.send_replace(true);
    let mut windows_refreshed = refresh_task.await.context("Refresh task panicked")?;

    // Final refresh so the cache reflects every recorded sample
    let as_of = *clock_rx.borrow();
    windows_refreshed += service
        .refresh_windows(
            &MetricType::ALL,
            settings.window_days,
            as_of,
            Deadline::after(settings.evaluation_timeout),
        )
        .await as u64;

    let balance = service.current_balance(&settings.user_id).await?;
    let report = RunReport {
        ticks: generated.ticks,
        samples_recorded: generated.recorded,
        samples_scored: scored.scored,
        samples_skipped: generated.skipped,
        scoring_failures: scored.failures,
        events_awarded: scored.events,
        coins_awarded: scored.coins,
        balance,
        windows_refreshed,
    };
    info!(?report, "Wellness pipeline stopped");
    Ok(report)
}

async fn generate_loop(
    service: Arc<WellnessService>,
    generator: MetricGenerator,
    settings: RuntimeSettings,
    sample_tx: mpsc::Sender<MetricSample>,
    clock_tx: watch::Sender<DateTime<Utc>>,
    mut shutdown: watch::Receiver<bool>,
) -> GeneratorReport {
    let mut report = GeneratorReport::default();
    let mut state = generator.initial_state(settings.seed, settings.start_at);
    let mut interval = tokio::time::interval(settings.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if settings.max_ticks.is_some_and(|max| report.ticks >= max) {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("Generator received shutdown");
                break;
            }
        }

        let (samples, next) = generator.generate_tick(&state);
        state = next;
        report.ticks += 1;

        for sample in samples {
            if let Err(e) = service.record_sample(sample.clone()).await {
                warn!(metric = %sample.metric_type, error = %e, "Failed to record sample");
                continue;
            }
            report.recorded += 1;

            match sample_tx.try_send(sample) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(sample)) => {
                    report.skipped += 1;
                    warn!(metric = %sample.metric_type, "Scoring queue full, sample not scored");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    error!("Scoring consumer stopped, halting generator");
                    return report;
                }
            }
        }
        clock_tx.send_replace(state.clock());
    }

    report
}

async fn score_loop(
    service: Arc<WellnessService>,
    settings: RuntimeSettings,
    insights: Option<Arc<dyn InsightGenerator>>,
    mut sample_rx: mpsc::Receiver<MetricSample>,
    clock_rx: watch::Receiver<DateTime<Utc>>,
) -> ScoringReport {
    let mut report = ScoringReport::default();

    while let Some(sample) = sample_rx.recv().await {
        let now = (*clock_rx.borrow()).max(sample.timestamp);

        let mut outcome = service
            .score_sample(&settings.user_id, &sample, now, Deadline::after(settings.evaluation_timeout))
            .await;
        if outcome.as_ref().is_err_and(|e| e.is_retryable()) {
            debug!(metric = %sample.metric_type, "Retrying sample scoring once");
            outcome = service
                .score_sample(
                    &settings.user_id,
                    &sample,
                    now,
                    Deadline::after(settings.evaluation_timeout),
                )
                .await;
        }

        match outcome {
            Ok(outcome) => {
                report.scored += 1;
                report.events += outcome.awarded.len() as u64;
                report.coins += outcome.coins();
                if let Some(generator) = insights.as_ref().filter(|_| !outcome.awarded.is_empty()) {
                    request_insight(&service, generator, &settings, now);
                }
            }
            Err(e) => {
                report.failures += 1;
                warn!(
                    metric = %sample.metric_type,
                    ts = %sample.timestamp,
                    error = %e,
                    severity = %e.severity(),
                    "Sample scoring failed"
                );
            }
        }
    }

    debug!(scored = report.scored, "Scoring queue drained");
    report
}

fn request_insight(
    service: &Arc<WellnessService>,
    generator: &Arc<dyn InsightGenerator>,
    settings: &RuntimeSettings,
    as_of: DateTime<Utc>,
) {
    let service = Arc::clone(service);
    let generator = Arc::clone(generator);
    let user_id = settings.user_id.clone();
    let window_days = settings.window_days;

    tokio::spawn(async move {
        let request = match service.insight_request(&user_id, window_days, as_of).await {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Could not assemble insight request");
                return;
            }
        };
        if let Ok(Ok(insight)) = spawn_insight(generator, request).await {
            info!(%user_id, insight = %insight, "New insight");
        }
    });
}

async fn refresh_loop(
    service: Arc<WellnessService>,
    settings: RuntimeSettings,
    clock_rx: watch::Receiver<DateTime<Utc>>,
    mut stop: watch::Receiver<bool>,
) -> u64 {
    let mut refreshed = 0;
    let mut interval = tokio::time::interval(settings.refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = wait_for_shutdown(&mut stop) => break,
        }
        let as_of = *clock_rx.borrow();
        refreshed += service
            .refresh_windows(
                &MetricType::ALL,
                settings.window_days,
                as_of,
                Deadline::after(settings.evaluation_timeout),
            )
            .await as u64;
    }

    refreshed
}

/// Resolves once the flag is true; never resolves if the sender is gone first
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
