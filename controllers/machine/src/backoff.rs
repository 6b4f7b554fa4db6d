//! # Fibonacci Backoff
//!
//! Per-object retry delays for Kubernetes API failures. The sequence runs in
//! whole minutes: 1m, 1m, 2m, 3m, 5m, 8m, then stays at the 10m cap.

use std::time::Duration;

/// Fibonacci backoff calculator, in minutes
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    max_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
}

impl FibonacciBackoff {
    /// Sequence starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
        }
    }

    /// Current delay; advances the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let delay = Duration::from_secs(self.current_minutes * 60);
        let next = self.prev_minutes.saturating_add(self.current_minutes);
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next.min(self.max_minutes);
        delay
    }

    /// Back to the first delay
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

/// Consecutive failures of one object and the delay before its next retry
#[derive(Debug, Clone)]
pub struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 10), // 1 minute min, 10 minutes max
            error_count: 0,
        }
    }
}

impl BackoffState {
    /// Record a failure and return the delay before the retry
    pub fn record_failure(&mut self) -> (Duration, u32) {
        self.error_count += 1;
        (self.backoff.next_backoff(), self.error_count)
    }

    /// Forget earlier failures after a successful pass
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(backoff: &mut FibonacciBackoff, n: usize) -> Vec<u64> {
        (0..n).map(|_| backoff.next_backoff().as_secs() / 60).collect()
    }

    #[test]
    fn test_sequence_is_capped() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        assert_eq!(minutes(&mut backoff, 9), vec![1, 1, 2, 3, 5, 8, 10, 10, 10]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        minutes(&mut backoff, 4);
        backoff.reset();
        assert_eq!(minutes(&mut backoff, 3), vec![1, 1, 2]);
    }

    #[test]
    fn test_state_counts_failures() {
        let mut state = BackoffState::default();
        assert_eq!(state.record_failure(), (Duration::from_secs(60), 1));
        assert_eq!(state.record_failure(), (Duration::from_secs(60), 2));
        assert_eq!(state.record_failure(), (Duration::from_secs(120), 3));
        state.reset();
        assert_eq!(state.record_failure(), (Duration::from_secs(60), 1));
    }
}
