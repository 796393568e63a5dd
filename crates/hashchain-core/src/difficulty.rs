use crate::{DEFAULT_DIFFICULTY, DEFAULT_TARGET_TIME_SECS, MAX_DIFFICULTY};
use std::time::Duration;
use tracing::info;

/// Reactive difficulty: each mined block moves the difficulty by one step
/// depending only on how long that block took.
#[derive(Clone, Debug, PartialEq)]
pub struct DifficultyController {
    difficulty: u32,
    target_time: Duration,
    ceiling: u32,
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(
            DEFAULT_DIFFICULTY,
            Duration::from_secs_f64(DEFAULT_TARGET_TIME_SECS),
        )
    }
}

impl DifficultyController {
    pub fn new(initial: u32, target_time: Duration) -> Self {
        Self {
            difficulty: initial.clamp(1, MAX_DIFFICULTY),
            target_time,
            ceiling: MAX_DIFFICULTY,
        }
    }

    /// Caps the difficulty. Values outside `1..=MAX_DIFFICULTY` are clamped.
    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = ceiling.clamp(1, MAX_DIFFICULTY);
        self.difficulty = self.difficulty.min(self.ceiling);
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target_time(&self) -> Duration {
        self.target_time
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Too fast raises the cost by one, too slow lowers it by one (never below 1),
    /// exactly on target leaves it alone.
    pub fn adjust(current: u32, observed: Duration, target: Duration) -> u32 {
        if observed < target {
            current.saturating_add(1)
        } else if observed > target {
            current.saturating_sub(1).max(1)
        } else {
            current
        }
    }

    /// Feeds the time taken by the last block and returns the difficulty for the next one.
    pub fn observe(&mut self, elapsed: Duration) -> u32 {
        let previous = self.difficulty;
        self.difficulty = Self::adjust(previous, elapsed, self.target_time).min(self.ceiling);
        if self.difficulty != previous {
            info!(
                from = previous,
                to = self.difficulty,
                elapsed = ?elapsed,
                target = ?self.target_time,
                "difficulty adjusted"
            );
        }
        self.difficulty
    }
}
