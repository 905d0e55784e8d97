//! Exponential backoff delay policy.

use crate::error::{RelaisError, Result};
use rand::Rng;
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay after the first failed attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default ceiling for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default growth factor between consecutive delays.
pub const DEFAULT_EXPONENTIAL_BASE: f64 = 2.0;

/// Immutable retry/backoff parameters.
///
/// Construct with [`RetryPolicy::builder`]; the builder rejects inconsistent
/// values so every policy in circulation is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            exponential_base: DEFAULT_EXPONENTIAL_BASE,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Start building a policy from the defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts the executor may make (`max_retries + 1`).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the first failure, before capping and jitter.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Upper bound of the deterministic delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor between consecutive delays.
    pub fn exponential_base(&self) -> f64 {
        self.exponential_base
    }

    /// Whether delays are randomised.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Deterministic delay for a zero-based failed attempt.
    ///
    /// `min(initial_delay * base^attempt, max_delay)`. Large attempts saturate
    /// to `max_delay` instead of overflowing.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let growth = self.exponential_base.powi(exponent);
        let secs = (self.initial_delay.as_secs_f64() * growth).min(self.max_delay.as_secs_f64());
        // f64 seconds near `Duration::MAX` round past it
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay to wait after the zero-based `attempt` failed.
    ///
    /// With jitter enabled the deterministic delay is scaled by a uniform
    /// factor in `[0.5, 1.5)`.
    pub fn get_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if !self.jitter {
            return delay;
        }

        let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

/// Builder for [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set the number of retries after the first attempt
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Set the delay after the first failure
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the delay ceiling
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set the exponential growth factor
    pub fn exponential_base(mut self, base: f64) -> Self {
        self.policy.exponential_base = base;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.policy.jitter = jitter;
        self
    }

    /// Validate and freeze the policy
    pub fn build(self) -> Result<RetryPolicy> {
        let policy = self.policy;

        if policy.initial_delay.is_zero() {
            return Err(RelaisError::config_error(
                "initial_delay must be positive",
                Some("Use at least a few milliseconds".to_string()),
            ));
        }

        if policy.max_delay < policy.initial_delay {
            return Err(RelaisError::config_error(
                format!(
                    "max_delay ({:?}) must be >= initial_delay ({:?})",
                    policy.max_delay, policy.initial_delay
                ),
                None,
            ));
        }

        if !policy.exponential_base.is_finite() || policy.exponential_base <= 1.0 {
            return Err(RelaisError::config_error(
                format!("exponential_base must be > 1.0, got {}", policy.exponential_base),
                Some("2.0 doubles the delay after every failure".to_string()),
            ));
        }

        Ok(policy)
    }
}
