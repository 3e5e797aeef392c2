//! Task evaluation
//!
//! Tasks are unlocked either by cashing out at or above a multiplier
//! threshold, or by reaching an exact count of consecutive target hits.

use crate::games::types::ResolvedRound;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskMethod {
    Threshold,
    Streak,
}

/// A configured, claimable achievement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub index: u32,
    pub method: TaskMethod,
    pub limit: f64,
}

/// Consecutive rounds won by reaching the declared auto-stop target
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakState {
    pub consecutive_full_successes: u32,
}

impl StreakState {
    /// Apply one resolved round: a full-target win extends the streak,
    /// anything else resets it.
    pub fn record(&mut self, round: &ResolvedRound) {
        if round.reached_target() {
            self.consecutive_full_successes = self.consecutive_full_successes.saturating_add(1);
        } else {
            self.consecutive_full_successes = 0;
        }
    }
}

pub struct AchievementEvaluator;

impl AchievementEvaluator {
    /// Indices of tasks satisfied by `round`, with `streak` already updated for it
    pub fn evaluate(tasks: &[Task], round: &ResolvedRound, streak: &StreakState) -> BTreeSet<u32> {
        tasks
            .iter()
            .filter(|task| match task.method {
                TaskMethod::Threshold => {
                    round.is_win() && round.resolution.at_multiplier >= task.limit
                }
                TaskMethod::Streak => task.limit == f64::from(streak.consecutive_full_successes),
            })
            .map(|task| task.index)
            .collect()
    }
}
