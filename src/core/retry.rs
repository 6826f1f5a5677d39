//! Retry policy for failed downloads.
//!
//! The worker drives attempts itself (each re-attempt is an observable
//! `Retrying` transition on the task), so this module only supplies the
//! policy: how many retries, how long to wait, and which errors qualify.

use std::time::Duration;

use crate::core::config;

/// Retry strategy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (beyond the initial attempt)
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff; 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for media transfers: a fixed pause between attempts, no
    /// jitter, seeded from `config::retry`.
    pub fn transfer() -> Self {
        Self {
            max_retries: config::retry::MAX_RETRIES,
            initial_delay: config::retry::retry_delay(),
            max_delay: config::retry::retry_delay(),
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter.
    #[must_use]
    pub fn no_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates delay for a given attempt number (zero-based: attempt 0 is
    /// the wait before the first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.add_jitter {
            // Up to 25% jitter
            let jitter = rand::random::<f64>() * 0.25 * capped_delay;
            capped_delay + jitter
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Determines if an error is retryable.
pub trait Retryable {
    /// Returns true if the error should be retried.
    fn is_retryable(&self) -> bool;

    /// Returns an optional hint for retry delay (e.g., from rate limit headers).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::TimedOut
                | ErrorKind::Interrupted
                | ErrorKind::WouldBlock
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_preset_is_fixed_interval() {
        let config = RetryConfig::transfer();
        assert!(!config.add_jitter);
        assert_eq!(config.max_retries, 3);

        // Multiplier 1.0 keeps every attempt on the same delay.
        for attempt in 0..5 {
            assert_eq!(config.delay_for_attempt(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_delay_grows_exponentially_without_jitter() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(1))
            .backoff_multiplier(2.0)
            .max_delay(Duration::from_secs(60))
            .no_jitter();

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_respects_max_cap() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(10))
            .backoff_multiplier(10.0)
            .max_delay(Duration::from_secs(30))
            .no_jitter();

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(4))
            .backoff_multiplier(1.0)
            .max_delay(Duration::from_secs(4));

        for _ in 0..100 {
            let delay = config.delay_for_attempt(0);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_io_error_retryability() {
        use std::io::{Error, ErrorKind};

        assert!(Error::new(ErrorKind::TimedOut, "t").is_retryable());
        assert!(Error::new(ErrorKind::ConnectionReset, "r").is_retryable());
        assert!(!Error::new(ErrorKind::PermissionDenied, "p").is_retryable());
        assert!(!Error::new(ErrorKind::NotFound, "n").is_retryable());
    }

    #[test]
    fn test_retry_after_defaults_to_none() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "t");
        assert_eq!(err.retry_after(), None);
    }
}
