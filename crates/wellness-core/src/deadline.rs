//! Caller-supplied deadlines for evaluation and aggregation calls

use crate::error::{WellnessError, WellnessResult};
use std::time::{Duration, Instant};

/// A time budget started when the deadline is created
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// Deadline expiring `limit` from now
    pub fn after(limit: Duration) -> Self {
        Self { started: Instant::now(), limit: Some(limit) }
    }

    /// Deadline that never expires
    pub fn unbounded() -> Self {
        Self { started: Instant::now(), limit: None }
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before expiry, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_sub(self.elapsed()))
    }

    pub fn is_expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.elapsed() >= limit)
    }

    /// Fail with a retryable timeout once the budget is spent
    pub fn check(&self, operation: &str) -> WellnessResult<()> {
        if self.is_expired() {
            return Err(self.timeout_error(operation));
        }
        Ok(())
    }

    /// Timeout error describing this deadline
    pub fn timeout_error(&self, operation: &str) -> WellnessError {
        WellnessError::timeout(
            operation,
            self.elapsed().as_millis() as u64,
            self.limit.map(|l| l.as_millis() as u64).unwrap_or(u64::MAX),
        )
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_deadline_never_expires() {
        let deadline = Deadline::unbounded();
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.check("noop").is_ok());
    }

    #[test]
    fn test_zero_deadline_expires_immediately() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
        let err = deadline.check("reward evaluation").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.category(), "timeout");
    }
}
