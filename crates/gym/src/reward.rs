//! Per-step reward shaping.
//!
//! The reward is progress made since the previous frame (distance plus
//! score) minus a small constant penalty. Dying, or failing to push the
//! maximum distance further for too long, replaces the reward with a fixed
//! death penalty; being stuck also ends the episode.

use nes::GameInfo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub reward_death: f64,
    /// Game-clock units without a new maximum distance before the player
    /// counts as stuck.
    pub stuck_duration: i32,
    pub not_moving_penalty: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self { reward_death: -2.0, stuck_duration: 100, not_moving_penalty: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardOutcome {
    pub reward: f64,
    pub died: bool,
    pub stuck: bool,
}

#[derive(Debug, Clone)]
pub struct RewardTracker {
    config: RewardConfig,
    previous: Option<GameInfo>,
    max_distance: i32,
    max_distance_time: i32,
}

impl RewardTracker {
    #[must_use]
    pub fn new(config: RewardConfig) -> Self {
        Self { config, previous: None, max_distance: 0, max_distance_time: 0 }
    }

    /// Forgets the previous frame; the next observation becomes the baseline.
    pub fn reset(&mut self) {
        self.previous = None;
        self.max_distance = 0;
        self.max_distance_time = 0;
    }

    pub fn observe(&mut self, info: &GameInfo) -> RewardOutcome {
        let Some(prev) = self.previous.replace(*info) else {
            self.max_distance = info.distance;
            self.max_distance_time = info.time;
            return RewardOutcome::default();
        };

        let died = info.life < prev.life;
        let stuck = self.check_stuck(info);
        let reward = if died || stuck {
            self.config.reward_death
        } else {
            f64::from(info.distance - prev.distance) + f64::from(info.score - prev.score)
                - self.config.not_moving_penalty
        };
        RewardOutcome { reward, died, stuck }
    }

    fn check_stuck(&mut self, info: &GameInfo) -> bool {
        if info.distance > self.max_distance {
            self.max_distance = info.distance;
            self.max_distance_time = info.time;
            return false;
        }
        (self.max_distance_time - info.time).abs() >= self.config.stuck_duration
    }
}
