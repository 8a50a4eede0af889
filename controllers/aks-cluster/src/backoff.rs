//! # Fibonacci Backoff
//!
//! Requeue delays for AKSClusterConfigs whose last pass failed with a
//! retryable error. Grows more slowly than exponential backoff, which suits
//! Azure throttling and "another operation is in progress" conflicts.
//!
//! Sequence with the defaults: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).

use std::time::Duration;

/// Fibonacci backoff calculator, tracked in whole minutes
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes: max_minutes.max(min_minutes),
        }
    }

    /// Current delay; advances the sequence, capped at the maximum
    pub fn next_backoff(&mut self) -> Duration {
        let delay = Duration::from_secs(self.current_minutes * 60);
        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);
        delay
    }

    /// Back to the first delay, after a successful pass
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}
