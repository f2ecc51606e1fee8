use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use wellness_api::{AppConfig, RuntimeSettings, TracingConfig, build_service, init_tracing, run};
use wellness_core::{MetricGenerator, TemplateInsightGenerator};

/// Wellness dashboard engine
#[derive(Parser)]
#[command(name = "wellness")]
#[command(about = "Simulates health metrics and scores them into reward coins")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (overrides WELLNESS_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the generator, scorer and analytics refresh until Ctrl-C
    Run {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Print simulated samples as JSON lines without scoring them
    Simulate {
        #[arg(long, default_value = "12")]
        ticks: u64,
        /// Seed override
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate the configuration and list the reward rules
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut tracing_config = TracingConfig::from_environment();
    if cli.verbose {
        tracing_config = tracing_config.verbose();
    }
    init_tracing(&tracing_config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting wellness engine");

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(&path.to_string_lossy())?,
        None => AppConfig::load()?,
    }
    .apply_env_overrides();

    match cli.command.unwrap_or(Command::Run { ticks: None }) {
        Command::Run { ticks } => run_command(config, ticks).await,
        Command::Simulate { ticks, seed } => simulate_command(config, ticks, seed),
        Command::CheckConfig => check_config_command(&config),
    }
}

async fn run_command(config: AppConfig, ticks: Option<u64>) -> anyhow::Result<()> {
    let validated = config.validate()?;
    let settings = RuntimeSettings::from_config(&config, &validated).with_max_ticks(ticks);
    let generator = MetricGenerator::with_all_metrics(validated.tick_interval, validated.boundary)?;
    let service = build_service(&validated);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                shutdown_tx.send_replace(true);
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let report =
        run(service, generator, settings, Some(Arc::new(TemplateInsightGenerator)), shutdown_rx)
            .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn simulate_command(config: AppConfig, ticks: u64, seed: Option<u64>) -> anyhow::Result<()> {
    let validated = config.validate()?;
    let generator = MetricGenerator::with_all_metrics(validated.tick_interval, validated.boundary)?;
    let start_at = config.simulation.start_at.unwrap_or_else(chrono::Utc::now);
    let state = generator.initial_state(seed.unwrap_or(config.simulation.seed), start_at);

    let (samples, _) = generator.simulate(&state, ticks);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for sample in &samples {
        writeln!(out, "{}", serde_json::to_string(sample)?).context("Failed to write sample")?;
    }
    info!(ticks, samples = samples.len(), "Simulation finished");
    Ok(())
}

fn check_config_command(config: &AppConfig) -> anyhow::Result<()> {
    let validated = config.validate()?;
    println!(
        "Configuration OK: tick {}s, window {} days, periods reset at {} (UTC{:+} min)",
        validated.tick_interval.as_secs(),
        validated.window_days,
        validated.boundary.reset_at.format("%H:%M"),
        validated.boundary.utc_offset_minutes,
    );
    for rule in &validated.rules {
        let conditions: Vec<String> =
            rule.condition.thresholds().iter().map(ToString::to_string).collect();
        println!(
            "  {:<24} {:>4} coins  {:<7} {}",
            rule.rule_id,
            rule.coin_value,
            rule.period.as_str(),
            conditions.join(match rule.condition.combinator() {
                wellness_core::Combinator::All => " AND ",
                wellness_core::Combinator::Any => " OR ",
            })
        );
    }
    Ok(())
}
