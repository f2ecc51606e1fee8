//! Physiological profiles of the simulated metrics

use wellness_types::MetricType;

/// How a metric evolves from one tick to the next
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    /// Bounded random walk pulled back towards the baseline
    Gauge { mean_reversion: f64 },
    /// Non-negative increments accumulated over the day, reset at the period boundary
    DailyCounter,
    /// Drawn once per day (at the boundary) and held until the next one
    Nightly { mean_reversion: f64 },
}

/// Bounds and dynamics of one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricProfile {
    pub metric_type: MetricType,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Resting level for gauges, expected daily total for counters
    pub baseline: f64,
    /// Noise scale: absolute for gauges, relative to the expected increment for counters
    pub volatility: f64,
    pub kind: MetricKind,
    /// Whether values are whole numbers
    pub integral: bool,
}

impl MetricProfile {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_bound && value <= self.upper_bound
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.lower_bound;
        }
        value.clamp(self.lower_bound, self.upper_bound)
    }

    /// Value a fresh simulation starts from
    pub fn initial_value(&self) -> f64 {
        match self.kind {
            MetricKind::DailyCounter => self.lower_bound,
            MetricKind::Gauge { .. } | MetricKind::Nightly { .. } => self.clamp(self.baseline),
        }
    }
}

/// Profile of a metric type
pub fn profile(metric_type: MetricType) -> MetricProfile {
    use MetricType::*;
    match metric_type {
        Steps => MetricProfile {
            metric_type,
            lower_bound: 0.0,
            upper_bound: 60_000.0,
            baseline: 9_000.0,
            volatility: 0.6,
            kind: MetricKind::DailyCounter,
            integral: true,
        },
        HeartRate => MetricProfile {
            metric_type,
            lower_bound: 40.0,
            upper_bound: 190.0,
            baseline: 72.0,
            volatility: 3.0,
            kind: MetricKind::Gauge { mean_reversion: 0.2 },
            integral: true,
        },
        SleepHours => MetricProfile {
            metric_type,
            lower_bound: 0.0,
            upper_bound: 14.0,
            baseline: 7.5,
            volatility: 1.5,
            kind: MetricKind::Nightly { mean_reversion: 0.5 },
            integral: false,
        },
        WaterIntake => MetricProfile {
            metric_type,
            lower_bound: 0.0,
            upper_bound: 20.0,
            baseline: 6.0,
            volatility: 0.8,
            kind: MetricKind::DailyCounter,
            integral: false,
        },
        Calories => MetricProfile {
            metric_type,
            lower_bound: 0.0,
            upper_bound: 6_000.0,
            baseline: 550.0,
            volatility: 0.5,
            kind: MetricKind::DailyCounter,
            integral: true,
        },
        MoodScore => MetricProfile {
            metric_type,
            lower_bound: 1.0,
            upper_bound: 10.0,
            baseline: 7.0,
            volatility: 0.3,
            kind: MetricKind::Gauge { mean_reversion: 0.1 },
            integral: false,
        },
        ActiveMinutes => MetricProfile {
            metric_type,
            lower_bound: 0.0,
            upper_bound: 1_440.0,
            baseline: 60.0,
            volatility: 0.7,
            kind: MetricKind::DailyCounter,
            integral: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_are_consistent() {
        for metric in MetricType::ALL {
            let p = profile(metric);
            assert_eq!(p.metric_type, metric);
            assert!(p.lower_bound < p.upper_bound, "{metric} bounds");
            assert!(p.contains(p.initial_value()), "{metric} initial value");
            assert!(p.volatility > 0.0);
        }
    }

    #[test]
    fn test_clamp_handles_nan_and_extremes() {
        let hr = profile(MetricType::HeartRate);
        assert_eq!(hr.clamp(f64::NAN), 40.0);
        assert_eq!(hr.clamp(500.0), 190.0);
        assert_eq!(hr.clamp(-3.0), 40.0);
        assert_eq!(hr.clamp(80.0), 80.0);
    }
}
