//! Coin rewards for completed wellness tasks
//!
//! Tasks are suggested to the user outside the core (by the insight layer).
//! Completing one is paid through the same reward event stream as metric
//! rules, keyed by the task id so a task can never be paid twice.

use crate::constants::defaults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use wellness_types::{PeriodKey, RewardEvent};

/// Task difficulty as assigned by the suggestion layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 1.3,
            Difficulty::Hard => 1.6,
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// What the user reported when completing a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    /// Self-assessed quality, 1-5
    #[serde(default)]
    pub quality_rating: Option<u8>,
    #[serde(default)]
    pub exceeded_expectations: bool,
}

impl TaskCompletion {
    fn quality_bonus(&self) -> u32 {
        let mut bonus = 0;
        if self.quality_rating.is_some_and(|rating| rating >= 4) {
            bonus += 5;
        }
        if self.exceeded_expectations {
            bonus += 3;
        }
        bonus
    }
}

/// Base coins per task type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRewardTable {
    pub base_rewards: BTreeMap<String, u32>,
    pub default_reward: u32,
}

impl Default for TaskRewardTable {
    fn default() -> Self {
        let base_rewards = [
            ("meditation", 15),
            ("exercise", 20),
            ("sleep_schedule", 10),
            ("social_connection", 12),
            ("journaling", 8),
            ("breathing_exercise", 10),
            ("nature_walk", 15),
            ("healthy_meal", 12),
            ("screen_break", 5),
            ("gratitude_practice", 8),
            ("professional_help", 25),
        ]
        .into_iter()
        .map(|(task, coins)| (task.to_string(), coins))
        .collect();

        Self { base_rewards, default_reward: defaults::TASK_REWARD }
    }
}

impl TaskRewardTable {
    pub fn base_reward(&self, task_type: &str) -> u32 {
        self.base_rewards.get(task_type).copied().unwrap_or(self.default_reward)
    }

    /// Coins for a completed task: base scaled by difficulty, plus quality bonus
    pub fn calculate(
        &self,
        task_type: &str,
        difficulty: Difficulty,
        completion: Option<&TaskCompletion>,
    ) -> u32 {
        let scaled = (f64::from(self.base_reward(task_type)) * difficulty.multiplier()) as u32;
        scaled + completion.map(TaskCompletion::quality_bonus).unwrap_or(0)
    }
}

/// Rule id under which every task completion is recorded
pub const TASK_RULE_ID: &str = "task_completion";

/// Period key of a task: the task itself is the period
pub fn task_period_key(task_id: &str) -> PeriodKey {
    PeriodKey::new(format!("task:{task_id}"))
}

/// Reward event paying out a task completion
///
/// The key holds only the user and the task id; the task type affects the
/// amount, never the identity of the payout.
pub fn task_reward_event(
    user_id: &str,
    task_id: &str,
    coins: u32,
    completed_at: DateTime<Utc>,
) -> RewardEvent {
    RewardEvent::new(TASK_RULE_ID, user_id, task_period_key(task_id), coins, completed_at)
}
