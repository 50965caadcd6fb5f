//! Reconnect policy with exponential backoff.
//!
//! After an unclean close the connection manager waits
//! `min(base_delay * multiplier^attempt, max_delay)` before reopening the
//! channel, up to `max_attempts` times. A successful open resets the count.
//!
//! # Example
//!
//! ```
//! use prosocket_client::ReconnectPolicy;
//! use std::time::Duration;
//!
//! let policy = ReconnectPolicy::new()
//!     .max_attempts(10)
//!     .base_delay(Duration::from_millis(250))
//!     .notify_exhausted(true);
//!
//! assert_eq!(policy.delay_for(0), Duration::from_millis(250));
//! assert_eq!(policy.delay_for(2), Duration::from_secs(1));
//! ```

use std::time::Duration;

/// Default reconnect settings.
pub mod defaults {
    use std::time::Duration;

    /// Delay before the first reconnect attempt.
    pub const BASE_DELAY: Duration = Duration::from_secs(1);

    /// Growth factor between consecutive attempts.
    pub const MULTIPLIER: f64 = 2.0;

    /// No jitter: delays are deterministic.
    pub const JITTER: f64 = 0.0;

    /// Upper bound for a single delay.
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    /// Attempts before giving up.
    pub const MAX_ATTEMPTS: u32 = 5;
}

/// Configuration for automatic reconnection.
///
/// # Default Values
///
/// - `base_delay`: 1 second
/// - `multiplier`: 2.0
/// - `jitter`: 0.0
/// - `max_delay`: 30 seconds
/// - `max_attempts`: 5
/// - `notify_exhausted`: false
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub base_delay: Duration,

    /// Multiplier for exponential backoff. Should be >= 1.0.
    pub multiplier: f64,

    /// Jitter factor between 0.0 and 1.0. A value of 0.2 spreads each delay
    /// within +/- 20% of the computed value, never above `max_delay`.
    pub jitter: f64,

    /// Maximum delay between attempts.
    pub max_delay: Duration,

    /// Maximum number of consecutive attempts.
    pub max_attempts: u32,

    /// Report [`ConnectionError::ReconnectExhausted`](crate::ConnectionError::ReconnectExhausted)
    /// to error subscribers when the attempts run out.
    pub notify_exhausted: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: defaults::BASE_DELAY,
            multiplier: defaults::MULTIPLIER,
            jitter: defaults::JITTER,
            max_delay: defaults::MAX_DELAY,
            max_attempts: defaults::MAX_ATTEMPTS,
            notify_exhausted: false,
        }
    }
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never reconnects.
    pub fn no_reconnect() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is less than 1.0.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        assert!(multiplier >= 1.0, "multiplier must be >= 1.0");
        self.multiplier = multiplier;
        self
    }

    /// Set the jitter factor.
    ///
    /// # Panics
    ///
    /// Panics if `jitter` is not between 0.0 and 1.0.
    pub fn jitter(mut self, jitter: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&jitter),
            "jitter must be between 0.0 and 1.0"
        );
        self.jitter = jitter;
        self
    }

    pub fn notify_exhausted(mut self, notify: bool) -> Self {
        self.notify_exhausted = notify;
        self
    }

    /// Validate the policy configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.base_delay > self.max_delay {
            return Err("base_delay must not exceed max_delay");
        }
        if self.multiplier < 1.0 {
            return Err("multiplier must be >= 1.0");
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("jitter must be between 0.0 and 1.0");
        }
        Ok(())
    }

    /// Whether another attempt is allowed after `attempts` consecutive ones.
    pub fn can_reconnect(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before attempt number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let max = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (self.base_delay.as_secs_f64() * self.multiplier.powi(exponent)).min(max);

        // delay * (1 + jitter * random(-1, 1))
        let jittered = if self.jitter > 0.0 {
            let random_factor = rand::random::<f64>() * self.jitter * 2.0 - self.jitter;
            delay * (1.0 + random_factor)
        } else {
            delay
        };

        Duration::from_secs_f64(jittered.clamp(0.0, max))
    }
}
