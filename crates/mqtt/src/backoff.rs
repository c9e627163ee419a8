//! Exponential backoff for reconnection attempts.
//!
//! Delays grow as `initial * multiplier^n`, capped at `max_delay`. The
//! attempt budget is either set explicitly or derived from the point where
//! the schedule saturates at the cap; once exceeded, `next_sleep` reports
//! exhaustion and the kernel gives up.

use std::time::Duration;

use thiserror::Error;

/// Raised when the retry budget is spent.
#[derive(Debug, Error)]
pub enum BackoffError {
    /// Maximum number of attempts exceeded; the value is the effective limit.
    #[error("Maximum number of attempts exceeded: {0}")]
    MaxAttemptsExceeded(u32),
}

/// Retry-delay schedule with an attempt cap.
///
/// Not shared between tasks directly; the connection kernel wraps it in a
/// mutex.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    attempt: u32,
    /// Explicit attempt cap. When `None`, `saturation_attempts` applies.
    max_attempts: Option<u32>,
    /// Attempts until the delay plateaus at `max_delay`.
    saturation_attempts: u32,
}

impl Backoff {
    /// Creates a schedule starting at `initial`, growing by `multiplier`
    /// per attempt, capped at `max`.
    ///
    /// Degenerate parameters (`initial >= max` or `multiplier <= 1.0`)
    /// collapse the schedule to a single attempt.
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let saturation_attempts = Self::saturation_attempts(initial, max, multiplier);
        Self {
            initial_delay: initial,
            current_delay: initial,
            max_delay: max,
            multiplier,
            attempt: 0,
            max_attempts: None,
            saturation_attempts,
        }
    }

    // Solve initial * multiplier^n = max for n.
    fn saturation_attempts(initial: Duration, max: Duration, multiplier: f64) -> u32 {
        if initial >= max || multiplier <= 1.0 {
            return 1;
        }

        let n = (max.as_secs_f64() / initial.as_secs_f64()).log(multiplier);
        n.floor() as u32 + 1
    }

    /// Caps the number of attempts explicitly. `0` means fail on the first
    /// call to `next_sleep`.
    pub fn set_max_attempts(&mut self, max: u32) {
        self.max_attempts = Some(max);
    }

    /// Returns the schedule to its initial state. Called after a successful
    /// connection so the next outage starts from the minimum delay.
    pub fn reset(&mut self) {
        self.current_delay = self.initial_delay;
        self.attempt = 0;
    }

    /// Returns the delay to sleep before the next attempt and advances the
    /// schedule.
    pub fn next_sleep(&mut self) -> Result<Duration, BackoffError> {
        self.attempt += 1;
        let effective_max = self.max_attempts.unwrap_or(self.saturation_attempts);

        if self.attempt > effective_max {
            return Err(BackoffError::MaxAttemptsExceeded(effective_max));
        }

        let sleep = self.current_delay;

        let grown = self.current_delay.as_secs_f64() * self.multiplier;
        self.current_delay = Duration::from_secs_f64(grown).min(self.max_delay);

        Ok(sleep)
    }

    /// Attempts consumed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The cap on a single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for Backoff {
    /// 1 s initial, 60 s cap, 10% growth per attempt. Gentle enough for a
    /// network hiccup, saturating within roughly a minute of delay.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 1.1)
    }
}
