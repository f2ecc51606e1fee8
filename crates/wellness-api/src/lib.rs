#![allow(missing_docs)]
//! Wellness dashboard service runtime
//!
//! Configuration loading, logging setup and the scheduled pipeline that drives
//! the core engine.

/// TOML configuration with environment overrides
pub mod config;
/// Generator, scorer and refresh tasks
pub mod runtime;
/// Subscriber installation
pub mod tracing_setup;

pub use config::{AppConfig, DEFAULT_CONFIG};
pub use runtime::{RunReport, RuntimeSettings, build_service, run};
pub use tracing_setup::{LogFormat, TracingConfig, init_tracing};
