// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with full jitter.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff policy: `delay(n)` is uniform in
/// `[0, min(cap, base * 2^n)]`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Policy for retrying an unreachable broker: base 250 ms, cap 30 s.
    pub fn broker() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(30))
    }

    /// Policy for idle claim loops: short sleeps that still desynchronize
    /// a pool's workers.
    pub fn idle() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(2))
    }

    /// Ceiling for the given attempt (0-based), without jitter.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let exp = self
            .base
            .saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
        exp.min(self.cap)
    }

    /// Full-jitter delay for the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if ceiling.is_zero() {
            return ceiling;
        }
        let ms = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
