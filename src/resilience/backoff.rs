//! Exponential backoff schedule.

use std::time::Duration;

/// Calculate the delay that precedes retry number `retry` (1-indexed).
///
/// The first retry waits `initial`, and every subsequent retry multiplies the
/// previous delay by `multiplier`. Saturates instead of overflowing.
pub fn calculate_backoff(retry: u32, initial: Duration, multiplier: u32) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let factor = multiplier.saturating_pow(retry - 1);
    initial.saturating_mul(factor)
}

/// Stateful backoff interval, advanced after every retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    multiplier: u32,
    retry: u32,
}

impl Backoff {
    pub fn new(initial: Duration, multiplier: u32) -> Self {
        Self {
            initial,
            multiplier,
            retry: 1,
        }
    }

    /// The interval to wait before the next attempt.
    pub fn current(&self) -> Duration {
        calculate_backoff(self.retry, self.initial, self.multiplier)
    }

    /// Move on to the interval for the following attempt.
    pub fn advance(&mut self) {
        self.retry = self.retry.saturating_add(1);
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current();
        self.advance();
        Some(delay)
    }
}
