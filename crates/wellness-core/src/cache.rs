//! Discardable cache of rolling windows
//!
//! Holds no authoritative state: any entry can be dropped and rebuilt from the
//! stored samples at any time. Readers may see a window that is one refresh
//! behind the store.

use crate::aggregation::RollingWindow;
use dashmap::DashMap;
use wellness_types::MetricType;

#[derive(Debug, Default)]
pub struct WindowCache {
    windows: DashMap<(MetricType, u32), RollingWindow>,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric_type: MetricType, window_days: u32) -> Option<RollingWindow> {
        self.windows.get(&(metric_type, window_days)).map(|w| w.value().clone())
    }

    /// Store a window unless a newer one (by `as_of`) is already cached
    pub fn store(&self, window: RollingWindow) {
        self.windows
            .entry((window.metric_type, window.window_size_days))
            .and_modify(|cached| {
                if cached.as_of <= window.as_of {
                    *cached = window.clone();
                }
            })
            .or_insert(window);
    }

    pub fn invalidate_all(&self) {
        self.windows.clear();
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
