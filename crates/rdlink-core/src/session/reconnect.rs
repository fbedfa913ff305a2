//! Reconnect backoff policy.
//!
//! Exponential backoff with a bounded attempt budget: delays double from
//! [`INITIAL_RECONNECT_DELAY`] up to [`MAX_RECONNECT_DELAY`], with ±25%
//! jitter so a fleet of clients does not reconvene in lockstep after a
//! gateway restart. After [`MAX_RECONNECT_ATTEMPTS`] failures the session
//! transitions to its error state instead of retrying forever.

use std::time::Duration;

use rand::Rng;

use crate::constants::{INITIAL_RECONNECT_DELAY, MAX_RECONNECT_ATTEMPTS, MAX_RECONNECT_DELAY};

/// Jitter spread as a fraction of the nominal delay.
const JITTER_FRACTION: f64 = 0.25;

/// Exponential backoff schedule for reconnect attempts.
#[derive(Debug)]
pub struct BackoffPolicy {
    initial: Duration,
    max_delay: Duration,
    max_attempts: u32,
    /// Failed attempts so far in the current reconnect episode.
    attempt: u32,
    /// Seed for the jitter sequence; fixed at construction so a given
    /// policy instance produces a reproducible schedule.
    jitter_seed: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffPolicy {
    /// Create a policy with the default schedule.
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// Create a policy with a fixed jitter seed, for reproducible schedules.
    pub fn with_seed(jitter_seed: u64) -> Self {
        Self {
            initial: INITIAL_RECONNECT_DELAY,
            max_delay: MAX_RECONNECT_DELAY,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            attempt: 0,
            jitter_seed,
        }
    }

    /// Override the schedule bounds.
    pub fn with_limits(mut self, initial: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        self.initial = initial;
        self.max_delay = max_delay;
        self.max_attempts = max_attempts;
        self
    }

    /// Number of attempts consumed in the current episode.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// True once the attempt budget is spent.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Delay before the next attempt, or `None` when the budget is spent.
    ///
    /// Consumes one attempt from the budget.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        let delay = self.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// Reset the episode, called after a successful connection or a manual
    /// `connect()`.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Nominal delay for attempt `n`: `initial * 2^n`, capped, then jittered.
    fn delay_for(&self, n: u32) -> Duration {
        let nominal = self
            .initial
            .checked_mul(1u32.checked_shl(n).unwrap_or(u32::MAX))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        // splitmix64 over (seed, attempt) gives a stable jitter factor in
        // [1 - JITTER_FRACTION, 1 + JITTER_FRACTION].
        let mut z = self
            .jitter_seed
            .wrapping_add(u64::from(n).wrapping_mul(0x9e37_79b9_7f4a_7c15));
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        let unit = (z >> 11) as f64 / (1u64 << 53) as f64;
        let factor = 1.0 - JITTER_FRACTION + 2.0 * JITTER_FRACTION * unit;

        Duration::from_secs_f64(nominal.as_secs_f64() * factor)
    }
}

// =============================================================================
// Tests
// =============================================================================
