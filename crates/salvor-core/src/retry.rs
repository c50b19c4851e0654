// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared backoff schedule for retryable operations.
//!
//! The policy is pure computation; call sites own their retry loops and
//! sleep between attempts, gating every retry on
//! [`SalvorError::is_retryable`](crate::SalvorError::is_retryable).

use std::time::Duration;

use rand::Rng;

/// Ceiling on a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff schedule with full jitter on top.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay after the first failure; doubles per subsequent failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay to sleep after `failed_attempt` (1-based) before the next try.
    ///
    /// Exponential in the attempt number, capped at sixty seconds, with up
    /// to one extra base-delay of random jitter.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(exp))
            .min(MAX_DELAY);
        let jitter_ms = if self.base_delay.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.base_delay.as_millis() as u64)
        };
        backoff + Duration::from_millis(jitter_ms)
    }

    /// Whether another attempt remains after `failed_attempt` failures.
    pub fn has_next(&self, failed_attempt: u32) -> bool {
        failed_attempt < self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_failure() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        let d1 = policy.delay_after(1);
        let d2 = policy.delay_after(2);
        let d3 = policy.delay_after(3);

        // Each delay is backoff plus up to one base-delay of jitter.
        assert!(d1 >= Duration::from_millis(500) && d1 <= Duration::from_millis(1000));
        assert!(d2 >= Duration::from_millis(1000) && d2 <= Duration::from_millis(1500));
        assert!(d3 >= Duration::from_millis(2000) && d3 <= Duration::from_millis(2500));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::new(50, Duration::from_secs(10));
        let d = policy.delay_after(30);
        assert!(d <= MAX_DELAY + Duration::from_secs(10));
    }

    #[test]
    fn has_next_counts_total_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        assert!(policy.has_next(1));
        assert!(policy.has_next(2));
        assert!(!policy.has_next(3));
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.attempts, 1);
        assert!(!policy.has_next(1));
    }
}
