//! Retry policy with exponential backoff.
//!
//! Provides:
//! - Exponential backoff (delay doubles each attempt), capped by `max_delay`
//! - Optional jitter to prevent thundering herd
//! - An extra doubling for network-classified failures
//! - Policy selection from the current connectivity status

use crate::config::RetryDefaults;
use crate::network::status::ConnectivityStatus;
use rand::Rng;
use std::time::Duration;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay cap, applied before the network doubling.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: RetryDefaults::MAX_RETRIES,
            base_delay: RetryDefaults::BASE_DELAY,
            max_delay: RetryDefaults::MAX_DELAY,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Policy used while connectivity is limited.
    pub fn limited() -> Self {
        Self::new(
            RetryDefaults::LIMITED_MAX_RETRIES,
            RetryDefaults::LIMITED_BASE_DELAY,
        )
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        // base * 2^attempt
        let multiplier = 2f64.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_secs = self.base_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());

        let final_secs = if self.jitter {
            // Multiply by a factor in [0.5, 1.5): same mean, never near zero.
            let mut rng = rand::rng();
            let jitter_factor = rng.random_range(0.5..1.5);
            (capped_secs * jitter_factor).min(self.max_delay.as_secs_f64())
        } else {
            capped_secs
        };

        // A cap near Duration::MAX does not survive the f64 round trip.
        Duration::try_from_secs_f64(final_secs).unwrap_or(self.max_delay)
    }

    /// Backoff for a failed attempt, doubled again for network failures.
    pub fn backoff(&self, attempt: u32, network_classified: bool) -> Duration {
        let delay = self.calculate_delay(attempt);
        if network_classified {
            delay.saturating_mul(2)
        } else {
            delay
        }
    }
}

/// Policies keyed by connectivity status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicies {
    pub default: RetryPolicy,
    pub limited: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            default: RetryPolicy::default(),
            limited: RetryPolicy::limited(),
        }
    }
}

impl RetryPolicies {
    /// Pick the policy for the current status.
    pub fn select(&self, status: ConnectivityStatus) -> RetryPolicy {
        match status {
            ConnectivityStatus::Limited => self.limited,
            _ => self.default,
        }
    }
}
