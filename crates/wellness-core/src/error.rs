//! Error handling for the wellness core engine
//!
//! Every failure the engine can report maps onto one of a small set of
//! categories. Callers decide what to do from the category: validation errors
//! abort startup, duplicates are swallowed, timeouts are retried, and nothing
//! raised while processing one sample is allowed to stop the next one.

use std::fmt;
use thiserror::Error;
use wellness_types::{EventKey, MetricType};

/// Error type for wellness core operations
#[derive(Error, Debug, Clone)]
pub enum WellnessError {
    /// Bad or missing rule configuration, fatal at startup
    #[error("Validation error: {message}")]
    Validation { message: String, rule_id: Option<String>, field: Option<String> },

    /// The idempotency guard rejected a second award for the same key
    #[error("Duplicate reward event: {key}")]
    DuplicateEvent { key: EventKey },

    /// A generated value fell outside the metric's declared bounds
    #[error("Range violation: {metric} value {value} outside [{lower}, {upper}]")]
    RangeViolation { metric: MetricType, value: f64, lower: f64, upper: f64 },

    /// An evaluation or aggregation call exceeded its deadline
    #[error("Timeout: {operation} exceeded its {limit_ms}ms deadline after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64, limit_ms: u64 },

    /// No samples exist for the requested window
    #[error("Data unavailable: {message}")]
    DataUnavailable { message: String, metric: Option<MetricType> },

    /// Failure reported by the persistence gateway
    #[error("Storage error: {message}")]
    Storage { message: String, operation: Option<String> },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String, component: Option<String> },
}

impl WellnessError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            WellnessError::Validation { .. } => "validation",
            WellnessError::DuplicateEvent { .. } => "duplicate_event",
            WellnessError::RangeViolation { .. } => "range_violation",
            WellnessError::Timeout { .. } => "timeout",
            WellnessError::DataUnavailable { .. } => "data_unavailable",
            WellnessError::Storage { .. } => "storage",
            WellnessError::Internal { .. } => "internal",
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            WellnessError::Validation { .. } => ErrorSeverity::Critical,
            WellnessError::DuplicateEvent { .. } => ErrorSeverity::Low,
            WellnessError::RangeViolation { .. } => ErrorSeverity::Low,
            WellnessError::Timeout { .. } => ErrorSeverity::Medium,
            WellnessError::DataUnavailable { .. } => ErrorSeverity::Low,
            WellnessError::Storage { .. } => ErrorSeverity::High,
            WellnessError::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    /// Whether the caller may simply try the same operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, WellnessError::Timeout { .. } | WellnessError::Storage { .. })
    }

    /// Whether this is the expected idempotency rejection
    pub fn is_duplicate(&self) -> bool {
        matches!(self, WellnessError::DuplicateEvent { .. })
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result type alias for core engine operations
pub type WellnessResult<T> = Result<T, WellnessError>;

/// Convenience constructors for common error scenarios
impl WellnessError {
    /// Create a configuration validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), rule_id: None, field: None }
    }

    /// Create a validation error pinned to one rule and field
    pub fn rule_validation(rule_id: &str, field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            rule_id: Some(rule_id.to_string()),
            field: Some(field.to_string()),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: &str, elapsed_ms: u64, limit_ms: u64) -> Self {
        Self::Timeout { operation: operation.to_string(), elapsed_ms, limit_ms }
    }

    /// Create a data unavailable error for a metric window
    pub fn no_data(metric: MetricType, message: impl Into<String>) -> Self {
        Self::DataUnavailable { message: message.into(), metric: Some(metric) }
    }

    /// Create a storage error
    pub fn storage(operation: &str, message: impl Into<String>) -> Self {
        Self::Storage { message: message.into(), operation: Some(operation.to_string()) }
    }

    /// Create an internal error with component context
    pub fn internal_component(component: &str, message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), component: Some(component.to_string()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellness_types::PeriodKey;

    #[test]
    fn test_error_categories_and_retryability() {
        let timeout = WellnessError::timeout("reward evaluation", 120, 100);
        assert_eq!(timeout.category(), "timeout");
        assert!(timeout.is_retryable());
        assert_eq!(timeout.severity(), ErrorSeverity::Medium);

        let validation = WellnessError::rule_validation("steps_10k", "metric_type", "unknown");
        assert_eq!(validation.category(), "validation");
        assert!(!validation.is_retryable());
        assert_eq!(validation.severity().to_string(), "CRITICAL");

        let duplicate = WellnessError::DuplicateEvent {
            key: EventKey {
                user_id: "u1".to_string(),
                rule_id: "steps_10k".to_string(),
                period_key: PeriodKey::new("daily:2026-10-16"),
            },
        };
        assert!(duplicate.is_duplicate());
        assert!(!duplicate.is_retryable());
        assert!(duplicate.to_string().contains("daily:2026-10-16"));
    }
}
