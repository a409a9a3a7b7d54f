// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policies for the two retryable fault classes
//!
//! - **Transient** faults (timeouts, service hiccups) back off on a fixed
//!   exponential schedule and give up after a hard attempt ceiling.
//! - **Contention** faults (version conflicts) wait the time since the
//!   previous conflict (at least the base delay), scaled by a doubling
//!   factor and a random multiplier in `[0, 2)`, so racing writers spread
//!   out instead of colliding again in lockstep. The ceiling is optional.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Upper bound on the contention factor, keeps the multiplication finite
const MAX_CONTENTION_FACTOR: u32 = 1 << 16;

/// Exponential backoff for timeouts and other transient faults
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientRetry {
    /// Delay after the first failed attempt
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Cap on any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Total attempts, including the first, before the call fails
    pub max_attempts: u32,
}

impl Default for TransientRetry {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

/// Jittered multiplicative backoff for version conflicts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentionRetry {
    /// Floor on the time between conflicts that the delay is scaled from
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Total attempts before giving up; `None` retries until a deadline, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for ContentionRetry {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

/// Both retry policies, as configured for an engine
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub transient: TransientRetry,
    pub contention: ContentionRetry,
}

/// Tracks attempts against a [`TransientRetry`] policy
#[derive(Debug)]
pub struct TransientBackoff {
    policy: TransientRetry,
    attempts: u32,
}

impl TransientBackoff {
    pub fn new(policy: &TransientRetry) -> Self {
        Self {
            policy: policy.clone(),
            attempts: 0,
        }
    }

    /// Record a failed attempt and return the delay before the next one,
    /// or `None` once the ceiling is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let exponent = (self.attempts - 1).min(31);
        let delay = self
            .policy
            .initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.policy.max_delay);
        Some(delay.min(self.policy.max_delay))
    }

    /// Failed attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Tracks retries against a [`ContentionRetry`] policy
#[derive(Debug)]
pub struct ContentionBackoff<R = StdRng> {
    policy: ContentionRetry,
    retries: u32,
    factor: u32,
    last_conflict: Option<Instant>,
    rng: R,
}

impl ContentionBackoff<StdRng> {
    pub fn new(policy: &ContentionRetry) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }
}

impl<R: Rng> ContentionBackoff<R> {
    pub fn with_rng(policy: &ContentionRetry, rng: R) -> Self {
        Self {
            policy: policy.clone(),
            retries: 0,
            factor: 1,
            last_conflict: None,
            rng,
        }
    }

    /// Record a race lost at `now` and return the delay before retrying,
    /// or `None` once the attempt ceiling (if any) is reached
    pub fn next_delay(&mut self, now: Instant) -> Option<Duration> {
        self.retries += 1;
        let since_last = self
            .last_conflict
            .replace(now)
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        if let Some(max) = self.policy.max_attempts {
            if self.retries >= max {
                return None;
            }
        }
        let basis = since_last.max(self.policy.base_delay);
        let multiplier: f64 = self.rng.gen_range(0.0..2.0);
        let scaled = basis
            .checked_mul(self.factor)
            .unwrap_or(self.policy.max_delay)
            .min(self.policy.max_delay);
        let delay = scaled.mul_f64(multiplier);
        self.factor = self.factor.saturating_mul(2).min(MAX_CONTENTION_FACTOR);
        Some(delay.min(self.policy.max_delay))
    }

    /// Lost races recorded so far
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
