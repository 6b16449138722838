//! Completion-polling backoff with a hard deadline.
//!
//! The original collection loop slept a fixed second between polls with
//! no cap, so an upstream job that never completed would poll forever.
//! `PollBackoff` replaces that with a doubling interval capped at a
//! maximum, and a deadline after which polling stops and the job is
//! reported as stalled.

use std::time::Duration;

/// Polling parameters for waiting on measurement completion.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first re-poll.
    pub base_interval: Duration,
    /// Cap on the per-poll delay.
    pub max_interval: Duration,
    /// Total time budget across all polls.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            deadline: Duration::from_secs(120),
        }
    }
}

/// Tracks accumulated wait time and the next delay for one job.
///
/// Deliberately clock-free: the waited total is the sum of delays it has
/// handed out, so the schedule is fully unit-testable.
#[derive(Debug)]
pub struct PollBackoff {
    current: Duration,
    max: Duration,
    deadline: Duration,
    waited: Duration,
}

impl PollBackoff {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            current: config.base_interval,
            max: config.max_interval,
            deadline: config.deadline,
            waited: Duration::ZERO,
        }
    }

    /// Next delay to sleep before re-polling, or `None` once the
    /// deadline budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.waited >= self.deadline {
            return None;
        }
        // Never overshoot the deadline by more than the remaining budget.
        let delay = self.current.min(self.deadline - self.waited);
        self.waited += delay;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }

    /// Total time handed out so far.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}
