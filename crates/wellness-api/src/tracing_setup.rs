//! Structured logging setup for the binary
//!
//! Logs go to stderr so that `wellness simulate` can stream samples on stdout.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "wellness=info,wellness_api=info,wellness_core=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Configuration for log output
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// `EnvFilter` directives
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { filter: DEFAULT_FILTER.to_string(), format: LogFormat::Pretty }
    }
}

impl TracingConfig {
    /// Read `RUST_LOG` and `WELLNESS_LOG_FORMAT`
    pub fn from_environment() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup("WELLNESS_LOG_FORMAT") {
            Some(f) if f.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self {
            filter: lookup("RUST_LOG")
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format,
        }
    }

    /// Raise the default filter to debug
    pub fn verbose(mut self) -> Self {
        if self.filter == DEFAULT_FILTER {
            self.filter = "wellness=debug,wellness_api=debug,wellness_core=debug".to_string();
        }
        self
    }
}

/// Install the global subscriber; fails if one is already installed
pub fn init_tracing(config: &TracingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("Invalid log filter '{}'", config.filter))?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    info!(filter = %config.filter, format = ?config.format, "Tracing initialized");
    Ok(())
}
