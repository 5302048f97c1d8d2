//! Level unlocking for whole-game curriculum environments.
//!
//! Only 1-1 is playable at first. Each level keeps a short history of
//! episode rewards; once a level's average reaches the passing grade the
//! next level unlocks. Episodes always start on the unlocked level with the
//! weakest average.

use std::collections::VecDeque;

use nes::LEVEL_COUNT;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurriculumConfig {
    /// Most recent episodes kept per level.
    pub average_over: usize,
    pub passing_grade: f64,
    /// Zero entries a level's history starts with.
    pub min_tries_for_avg: usize,
    pub num_levels: u8,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self { average_over: 10, passing_grade: 600.0, min_tries_for_avg: 5, num_levels: LEVEL_COUNT }
    }
}

#[derive(Debug, Clone)]
pub struct Curriculum {
    config: CurriculumConfig,
    scores: Vec<VecDeque<f64>>,
    locked: Vec<bool>,
}

impl Curriculum {
    #[must_use]
    pub fn new(config: CurriculumConfig) -> Self {
        let levels = usize::from(config.num_levels.clamp(1, LEVEL_COUNT));
        let mut locked = vec![true; levels];
        locked[0] = false;
        Self { config, scores: vec![VecDeque::new(); levels], locked }
    }

    #[must_use]
    pub fn level_count(&self) -> u8 {
        u8::try_from(self.locked.len()).unwrap_or(LEVEL_COUNT)
    }

    #[must_use]
    pub fn is_unlocked(&self, level: u8) -> bool {
        self.locked.get(usize::from(level)).is_some_and(|locked| !locked)
    }

    pub fn unlocked_levels(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.level_count()).filter(|&level| self.is_unlocked(level))
    }

    /// Opens a fresh history slot for an episode on `level`.
    pub fn begin_episode(&mut self, level: u8) {
        let cap = self.config.average_over.max(self.config.min_tries_for_avg).max(1);
        let Some(history) = self.scores.get_mut(usize::from(level)) else {
            return;
        };
        if history.is_empty() {
            history.extend(std::iter::repeat(0.0).take(self.config.min_tries_for_avg.max(1)));
        } else {
            history.push_front(0.0);
            history.truncate(cap);
        }
    }

    /// Overwrites the running episode's entry with the reward so far.
    pub fn record(&mut self, level: u8, episode_reward: f64) {
        if let Some(slot) = self.scores.get_mut(usize::from(level)).and_then(VecDeque::front_mut) {
            *slot = episode_reward;
        }
    }

    /// Average of each level's history, rounded to four decimals; levels
    /// never played average zero.
    #[must_use]
    pub fn averages(&self) -> Vec<f64> {
        self.scores
            .iter()
            .map(|history| {
                let count = history.len().min(self.config.average_over.max(1));
                if count == 0 {
                    return 0.0;
                }
                #[allow(clippy::cast_precision_loss)]
                let mean = history.iter().take(count).sum::<f64>() / count as f64;
                (mean * 10_000.0).round() / 10_000.0
            })
            .collect()
    }

    /// Unlocks every level whose predecessor passes. Returns the newly
    /// unlocked levels.
    pub fn unlock_levels(&mut self) -> Vec<u8> {
        let averages = self.averages();
        let mut unlocked = Vec::new();
        for i in (0..self.locked.len().saturating_sub(1)).rev() {
            if self.locked[i + 1] && averages[i] >= self.config.passing_grade {
                self.locked[i + 1] = false;
                let level = u8::try_from(i + 1).unwrap_or(LEVEL_COUNT);
                info!("Curriculum unlocked level {level} (average {:.1} on level {i})", averages[i]);
                unlocked.push(level);
            }
        }
        unlocked
    }

    /// Unlocked level with the lowest average, lowest index on ties.
    #[must_use]
    pub fn next_level(&self) -> u8 {
        let averages = self.averages();
        let mut best = (0, f64::INFINITY);
        for level in self.unlocked_levels() {
            let average = averages[usize::from(level)];
            if average < best.1 {
                best = (level, average);
            }
        }
        best.0
    }
}

impl Default for Curriculum {
    fn default() -> Self {
        Self::new(CurriculumConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn play(curriculum: &mut Curriculum, level: u8, reward: f64) {
        curriculum.begin_episode(level);
        curriculum.record(level, reward);
        curriculum.unlock_levels();
    }

    #[test]
    fn only_first_level_starts_unlocked() {
        let curriculum = Curriculum::default();
        assert_eq!(curriculum.unlocked_levels().collect::<Vec<_>>(), vec![0]);
        assert_eq!(curriculum.next_level(), 0);
        assert!(!curriculum.is_unlocked(1));
        assert!(!curriculum.is_unlocked(200));
    }

    #[test]
    fn new_history_is_seeded_with_zeros() {
        let mut curriculum = Curriculum::default();
        play(&mut curriculum, 0, 1_000.0);
        assert_eq!(curriculum.averages()[0], 200.0);
        assert!(!curriculum.is_unlocked(1));
    }

    #[test]
    fn passing_average_unlocks_next_level() {
        let mut curriculum = Curriculum::default();
        for _ in 0..4 {
            play(&mut curriculum, 0, 1_000.0);
        }
        assert!(!curriculum.is_unlocked(1));
        // [1000 x 5, 0 x 4] averages 555.6; the sixth episode reaches 600.
        play(&mut curriculum, 0, 1_000.0);
        assert!(!curriculum.is_unlocked(1));
        play(&mut curriculum, 0, 1_000.0);
        assert!(curriculum.is_unlocked(1));
        assert_eq!(curriculum.next_level(), 1);
    }

    #[test]
    fn history_is_capped() {
        let mut curriculum = Curriculum::new(CurriculumConfig { average_over: 3, min_tries_for_avg: 2, ..CurriculumConfig::default() });
        for reward in [10.0, 20.0, 30.0, 40.0] {
            play(&mut curriculum, 0, reward);
        }
        assert_eq!(curriculum.averages()[0], 30.0);
    }

    #[test]
    fn averages_round_to_four_decimals() {
        let mut curriculum = Curriculum::new(CurriculumConfig { min_tries_for_avg: 3, ..CurriculumConfig::default() });
        play(&mut curriculum, 0, 1.0);
        assert_eq!(curriculum.averages()[0], 0.3333);
    }
}
