/// Core constants used throughout the wellness engine
///
/// Centralizes the default cadences and the time-of-day activity profile so
/// the generator, the configuration layer and the tests agree on them.
/// Default configuration values
pub mod defaults {
    /// Generator cadence in seconds
    pub const TICK_INTERVAL_SECONDS: u64 = 5;

    /// Rolling analytics window in days
    pub const WINDOW_DAYS: u32 = 7;

    /// Local time at which reward periods reset
    pub const PERIOD_BOUNDARY: &str = "00:00";

    /// Deadline for a single reward evaluation
    pub const EVALUATION_TIMEOUT_MS: u64 = 500;

    /// How often the analytics cache is rebuilt
    pub const REFRESH_INTERVAL_SECONDS: u64 = 60;

    /// Capacity of the sample queue between the generator and the scorer
    pub const QUEUE_CAPACITY: usize = 1024;

    /// Coins for a completed task whose type is not in the reward table
    pub const TASK_REWARD: u32 = 10;
}

/// Time-of-day activity profile applied to simulated counters
pub mod activity {
    /// Multiplier for 06:00-09:59
    pub const MORNING_MULTIPLIER: f64 = 1.2;

    /// Multiplier for 12:00-14:59
    pub const LUNCH_MULTIPLIER: f64 = 1.1;

    /// Multiplier for 17:00-19:59
    pub const EVENING_MULTIPLIER: f64 = 1.3;

    /// Multiplier for 22:00-05:59
    pub const NIGHT_MULTIPLIER: f64 = 0.3;

    /// Mood target shift for 07:00-11:59
    pub const MORNING_MOOD_SHIFT: f64 = 0.5;

    /// Mood target shift for the 14:00-16:59 dip
    pub const AFTERNOON_MOOD_SHIFT: f64 = -0.3;

    /// Mood target shift for 18:00-21:59
    pub const EVENING_MOOD_SHIFT: f64 = 0.3;

    /// Activity multiplier for a local hour of the day
    pub fn multiplier(hour: u32) -> f64 {
        match hour {
            6..=9 => MORNING_MULTIPLIER,
            12..=14 => LUNCH_MULTIPLIER,
            17..=19 => EVENING_MULTIPLIER,
            22..=23 | 0..=5 => NIGHT_MULTIPLIER,
            _ => 1.0,
        }
    }

    /// Mood target adjustment for a local hour of the day
    pub fn mood_shift(hour: u32) -> f64 {
        match hour {
            7..=11 => MORNING_MOOD_SHIFT,
            14..=16 => AFTERNOON_MOOD_SHIFT,
            18..=21 => EVENING_MOOD_SHIFT,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::activity;

    #[test]
    fn test_activity_profile_covers_every_hour() {
        assert_eq!(activity::multiplier(7), activity::MORNING_MULTIPLIER);
        assert_eq!(activity::multiplier(13), activity::LUNCH_MULTIPLIER);
        assert_eq!(activity::multiplier(18), activity::EVENING_MULTIPLIER);
        assert_eq!(activity::multiplier(23), activity::NIGHT_MULTIPLIER);
        assert_eq!(activity::multiplier(3), activity::NIGHT_MULTIPLIER);
        assert_eq!(activity::multiplier(11), 1.0);
        assert_eq!(activity::mood_shift(15), activity::AFTERNOON_MOOD_SHIFT);
        assert_eq!(activity::mood_shift(2), 0.0);
    }
}
