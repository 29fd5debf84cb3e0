//! Retry policy for endpoint and feed calls

use std::fmt::Display;
use std::time::Duration;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff: base * 2^attempt (2s, 4s, 8s, ... for a 1s base)
pub fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// How often a failed call is repeated.
///
/// The default is [`RetryPolicy::none`]: one attempt, and a failure is final.
/// [`RetryPolicy::exponential`] repeats retryable failures with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Up to `max_retries` extra attempts with exponential backoff.
    pub const fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `attempt_fn` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent.
    pub fn run<T, E>(&self, label: &str, mut attempt_fn: impl FnMut() -> Result<T, E>) -> Result<T, E>
    where
        E: Retryable + Display,
    {
        let mut attempt = 0u32;
        loop {
            match attempt_fn() {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    attempt += 1;
                    let delay = backoff_duration(self.base_delay, attempt);
                    log::warn!(
                        "{label}: attempt {attempt}/{} failed: {e}, retrying in {delay:?}",
                        self.max_retries
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => {
                    if self.max_retries > 0 {
                        log::debug!("{label}: giving up after {} attempt(s): {e}", attempt + 1);
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky (retryable: {})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn backoff_exponential() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_duration(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_duration(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_duration(base, 3), Duration::from_secs(8));
    }

    #[test]
    fn default_is_single_attempt() {
        let mut calls = 0;
        let result: Result<(), Flaky> = RetryPolicy::default().run("test", || {
            calls += 1;
            Err(Flaky(true))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn exponential_retries_until_success() {
        let policy = RetryPolicy::exponential(3).with_base_delay(Duration::ZERO);
        let mut calls = 0;
        let result = policy.run("test", || {
            calls += 1;
            if calls < 3 { Err(Flaky(true)) } else { Ok(calls) }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn exponential_stops_at_budget() {
        let policy = RetryPolicy::exponential(2).with_base_delay(Duration::ZERO);
        let mut calls = 0;
        let result: Result<(), Flaky> = policy.run("test", || {
            calls += 1;
            Err(Flaky(true))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_retryable_fails_fast() {
        let policy = RetryPolicy::exponential(5).with_base_delay(Duration::ZERO);
        let mut calls = 0;
        let result: Result<(), Flaky> = policy.run("test", || {
            calls += 1;
            Err(Flaky(false))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
