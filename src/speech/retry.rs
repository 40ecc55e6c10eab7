//! Reusable retry policy: bounded retries, a backoff schedule and a retryable-error predicate.

use std::fmt;
use std::time::Duration;

/// Upper bound for a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Blocking sleep, abstracted so tests can observe delays without waiting.
pub trait Sleep: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleep`] on the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Delay schedule between attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base_secs ^ retry` seconds before retry number `retry` (1-based).
    Exponential { base_secs: f64 },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => d.min(MAX_DELAY),
            Self::Exponential { base_secs } => {
                let exp = i32::try_from(retry).unwrap_or(i32::MAX);
                let secs = base_secs.powi(exp);
                if !secs.is_finite() || secs <= 0.0 {
                    return if secs.is_infinite() {
                        MAX_DELAY
                    } else {
                        Duration::ZERO
                    };
                }
                Duration::from_secs_f64(secs.min(MAX_DELAY.as_secs_f64()))
            }
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// A non-retryable error; no retry was attempted after it.
    Fatal { attempt: u32, error: E },
    /// Every allowed attempt hit a retryable error.
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// Number of attempts made in total.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempt, .. } => *attempt,
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Fatal { error, .. } => error,
            Self::Exhausted { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal { attempt, error } => write!(f, "attempt {attempt} failed: {error}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Bounded retry with backoff.
///
/// With `max_retries = 3` an operation runs at most 4 times. No delay follows the final
/// failure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::Exponential { base_secs: 2.0 },
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with a non-retryable error, or runs out of retries.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E>(
        &self,
        sleeper: &dyn Sleep,
        retryable: impl Fn(&E) -> bool,
        mut op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<T, RetryError<E>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            if !retryable(&error) {
                return Err(RetryError::Fatal { attempt, error });
            }
            if attempt > self.max_retries {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }
            let delay = self.backoff.delay(attempt);
            tracing::debug!(attempt, delay_secs = delay.as_secs_f64(), "retrying after backoff");
            sleeper.sleep(delay);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/speech/retry.rs"]
mod tests;
