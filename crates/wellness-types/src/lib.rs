//! Wellness Types
//!
//! This crate defines the data model shared by the wellness engine crates
//! (`wellness-core` and `wellness-api`): metric samples, reward events and the
//! keys that make reward awarding idempotent. It holds no engine logic so that
//! storage adapters and presentation layers can depend on it without pulling in
//! the simulation or scoring code.

#![deny(missing_docs)]

mod types;

pub use types::{
    EventKey, MetricSample, MetricType, ParseMetricTypeError, PeriodKey, RewardEvent,
    SampleSource, TimeRange,
};
