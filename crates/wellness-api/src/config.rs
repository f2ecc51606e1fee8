use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::{info, warn};
use wellness_core::constants::defaults;
use wellness_core::{EngineConfig, RuleConfig, ValidatedConfig};

/// Used when the configuration file is missing
pub const DEFAULT_CONFIG: &str = r#"[simulation]
tick_interval_seconds = 5
seed = 42

[analytics]
window_days = 7
refresh_interval_seconds = 60

[period]
boundary = "00:00"
utc_offset_minutes = 0

[scoring]
user_id = "demo-user"
evaluation_timeout_ms = 500
queue_capacity = 1024

[[rules]]
rule_id = "daily_steps_10k"
description = "Walk 10,000 steps in a day"
metric_type = "steps"
comparator = ">="
threshold = 10000.0
period = "daily"
coin_value = 5

[[rules]]
rule_id = "daily_hydration"
description = "Drink 8 glasses of water in a day"
metric_type = "water_intake"
comparator = ">="
threshold = 8.0
period = "daily"
coin_value = 3

[[rules]]
rule_id = "daily_active_30"
description = "Be active for 30 minutes"
metric_type = "active_minutes"
comparator = ">="
threshold = 30.0
period = "daily"
coin_value = 3

[[rules]]
rule_id = "weekly_sleep_routine"
description = "Average at least 7 hours of sleep over the week"
metric_type = "sleep_hours"
comparator = ">="
threshold = 7.0
aggregation = "mean"
period = "weekly"
coin_value = 15

[[rules]]
rule_id = "balanced_day"
description = "Rested, active and in a good mood on the same day"
period = "daily"
coin_value = 10

[[rules.all]]
metric_type = "sleep_hours"
comparator = ">="
threshold = 7.0

[[rules.all]]
metric_type = "steps"
comparator = ">="
threshold = 8000.0

[[rules.all]]
metric_type = "mood_score"
comparator = ">="
threshold = 6.0
aggregation = "mean"
"#;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    #[serde(default)]
    pub seed: u64,
    /// Simulated clock origin; defaults to process start
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { tick_interval_seconds: default_tick_interval_seconds(), seed: 0, start_at: None }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PeriodConfig {
    #[serde(default = "default_boundary")]
    pub boundary: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self { boundary: default_boundary(), utc_offset_minutes: 0 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_evaluation_timeout_ms")]
    pub evaluation_timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            evaluation_timeout_ms: default_evaluation_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub period: PeriodConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl AppConfig {
    /// Load from `WELLNESS_CONFIG_PATH` (default `wellness.toml`)
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var("WELLNESS_CONFIG_PATH").unwrap_or_else(|_| "wellness.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load from `path`, falling back to [`DEFAULT_CONFIG`] when it does not exist
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(config_str) => Self::from_toml_str(&config_str)
                .with_context(|| format!("Failed to parse configuration file '{path}'")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Configuration file '{}' not found. Using default configuration.", path);
                Self::from_toml_str(DEFAULT_CONFIG).context("Failed to parse default configuration")
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read configuration file '{path}'")),
        }
    }

    pub fn from_toml_str(config_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    /// Apply `WELLNESS_*` environment variable overrides
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `lookup`; unparsable values are ignored
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring unparsable configuration override");
                    None
                }
            }
        }

        if let Some(seconds) = parsed(&lookup, "WELLNESS_TICK_INTERVAL_SECONDS") {
            self.simulation.tick_interval_seconds = seconds;
        }
        if let Some(days) = parsed(&lookup, "WELLNESS_WINDOW_DAYS") {
            self.analytics.window_days = days;
        }
        if let Some(seed) = parsed(&lookup, "WELLNESS_SEED") {
            self.simulation.seed = seed;
        }
        if let Some(user_id) = lookup("WELLNESS_USER_ID").filter(|u| !u.trim().is_empty()) {
            self.scoring.user_id = user_id;
        }
        if let Some(timeout_ms) = parsed(&lookup, "WELLNESS_EVALUATION_TIMEOUT_MS") {
            self.scoring.evaluation_timeout_ms = timeout_ms;
        }

        self
    }

    /// The subset of the configuration owned by the core
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval_seconds: self.simulation.tick_interval_seconds,
            window_days: self.analytics.window_days,
            period_boundary: self.period.boundary.clone(),
            utc_offset_minutes: self.period.utc_offset_minutes,
            rules: self.rules.clone(),
        }
    }

    /// Validate everything the process needs before starting
    pub fn validate(&self) -> anyhow::Result<ValidatedConfig> {
        if self.scoring.queue_capacity == 0 {
            anyhow::bail!("scoring.queue_capacity must be at least 1");
        }
        if self.scoring.evaluation_timeout_ms == 0 {
            anyhow::bail!("scoring.evaluation_timeout_ms must be at least 1");
        }
        if self.analytics.refresh_interval_seconds == 0 {
            anyhow::bail!("analytics.refresh_interval_seconds must be at least 1");
        }
        let validated = self.engine_config().validate().context("Invalid engine configuration")?;
        info!(user_id = %self.scoring.user_id, "Configuration loaded");
        Ok(validated)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.scoring.evaluation_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.analytics.refresh_interval_seconds)
    }
}

fn default_tick_interval_seconds() -> u64 {
    defaults::TICK_INTERVAL_SECONDS
}
fn default_window_days() -> u32 {
    defaults::WINDOW_DAYS
}
fn default_refresh_interval_seconds() -> u64 {
    defaults::REFRESH_INTERVAL_SECONDS
}
fn default_boundary() -> String {
    defaults::PERIOD_BOUNDARY.to_string()
}
fn default_user_id() -> String {
    "demo-user".to_string()
}
fn default_evaluation_timeout_ms() -> u64 {
    defaults::EVALUATION_TIMEOUT_MS
}
fn default_queue_capacity() -> usize {
    defaults::QUEUE_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wellness_core::default_rules;

    #[test]
    fn test_default_config_matches_builtin_rules() {
        let config = AppConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.rules, default_rules());
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.scoring.user_id, "demo-user");

        let validated = config.validate().unwrap();
        assert_eq!(validated.rules.len(), 5);
        assert_eq!(validated.window_days, 7);
    }

    #[test]
    fn test_overrides_replace_parsable_values_only() {
        let overrides: HashMap<&str, &str> = HashMap::from([
            ("WELLNESS_TICK_INTERVAL_SECONDS", "1"),
            ("WELLNESS_WINDOW_DAYS", "not-a-number"),
            ("WELLNESS_SEED", "7"),
            ("WELLNESS_USER_ID", "alice"),
        ]);
        let config = AppConfig::from_toml_str(DEFAULT_CONFIG)
            .unwrap()
            .apply_overrides(|key| overrides.get(key).map(|v| v.to_string()));

        assert_eq!(config.simulation.tick_interval_seconds, 1);
        assert_eq!(config.analytics.window_days, 7);
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.scoring.user_id, "alice");
        assert_eq!(config.scoring.evaluation_timeout_ms, 500);
    }

    #[test]
    fn test_missing_rules_abort_startup() {
        let config = AppConfig::from_toml_str("[simulation]\nseed = 1\n").unwrap();
        assert!(config.rules.is_empty());
        assert!(config.validate().is_err());
    }
}
