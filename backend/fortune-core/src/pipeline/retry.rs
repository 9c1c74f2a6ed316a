//! Bounded exponential retry.
//!
//! Delay before retry `n` (n >= 1) is `base_delay * 2^n`, no jitter.

use crate::pipeline::classifier::{ClassifiedOutcome, FailureReason};
use crate::transport::TransportFailureKind;

use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

const BACKOFF_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// A single attempt; nothing is retried.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn schedule(&self) -> RetrySchedule {
        let first = self.base_delay.saturating_mul(2).min(self.max_delay);
        let backoff = ExponentialBackoff {
            current_interval: first,
            initial_interval: first,
            randomization_factor: 0.0,
            multiplier: BACKOFF_MULTIPLIER,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        };

        RetrySchedule {
            backoff,
            attempts_made: 1,
            max_attempts: self.max_attempts.max(1),
        }
    }
}

/// Whether `outcome` may be re-issued automatically.
///
/// Only retryable failures qualify. A non-idempotent request additionally
/// needs proof that nothing reached the server, which only a connect
/// failure gives.
pub fn is_retry_eligible(outcome: &ClassifiedOutcome, idempotent: bool) -> bool {
    match outcome {
        ClassifiedOutcome::RetryableFailure(reason) => idempotent || is_send_side(reason),
        _ => false,
    }
}

fn is_send_side(reason: &FailureReason) -> bool {
    matches!(
        reason,
        FailureReason::Network(failure) if failure.kind == TransportFailureKind::Connect
    )
}

/// Per-call retry state. The first attempt is counted on creation.
#[derive(Debug)]
pub struct RetrySchedule {
    backoff: ExponentialBackoff,
    attempts_made: u32,
    max_attempts: u32,
}

impl RetrySchedule {
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    /// Calling this records the next attempt.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts_made >= self.max_attempts {
            return None;
        }
        let delay = self.backoff.next_backoff()?;
        self.attempts_made += 1;
        // backoff adds up to a nanosecond even with zero randomization.
        Some(Duration::from_millis(delay.as_millis() as u64))
    }
}
