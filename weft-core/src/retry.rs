//! Adapter-local retry for transient server-side failures.
//!
//! Only a narrow allow-list of error signatures is retried. "Overloaded"
//! signatures back off linearly (5s, 10s, ...), generic internal errors back off
//! exponentially (1s, 2s, 4s, ...). Anything else fails on the first attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySignal {
    /// Service overloaded; long linear backoff
    Overloaded,
    /// Generic internal server error; short exponential backoff
    Internal,
    /// Not retryable
    Fatal,
}

/// Bounded retry policy with two backoff schedules
#[derive(Debug, Clone)]
pub struct StreamRetryPolicy {
    max_attempts: u32,
    overloaded_step: Duration,
    internal_base: Duration,
}

impl StreamRetryPolicy {
    /// Create a policy with default settings (3 attempts, 5s linear, 1s exponential)
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            overloaded_step: Duration::from_secs(5),
            internal_base: Duration::from_secs(1),
        }
    }

    /// Set the total number of attempts (the first call included)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the linear step used for overloaded signatures
    pub fn with_overloaded_step(mut self, step: Duration) -> Self {
        self.overloaded_step = step;
        self
    }

    /// Set the exponential base used for internal-error signatures
    pub fn with_internal_base(mut self, base: Duration) -> Self {
        self.internal_base = base;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Classify an error message.
    ///
    /// Matches substrings of the provider's current error wording; keep the
    /// list here and nowhere else.
    pub fn classify(message: &str) -> RetrySignal {
        let retryable = message.contains("500 INTERNAL")
            || message.contains("503 UNAVAILABLE")
            || message.contains("ServerError");

        if !retryable {
            RetrySignal::Fatal
        } else if message.contains("503") {
            RetrySignal::Overloaded
        } else {
            RetrySignal::Internal
        }
    }

    /// Delay before the next attempt; `attempt` is zero-based
    pub fn delay(&self, signal: RetrySignal, attempt: u32) -> Option<Duration> {
        match signal {
            RetrySignal::Overloaded => Some(self.overloaded_step.saturating_mul(attempt + 1)),
            RetrySignal::Internal => {
                Some(self.internal_base.saturating_mul(2u32.saturating_pow(attempt)))
            }
            RetrySignal::Fatal => None,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error or
    /// the attempt bound is reached. Cancelling the returned future stops the
    /// loop, including during a backoff sleep.
    pub async fn execute<T, E, F, Fut>(&self, provider: &str, mut operation: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let message = e.to_string();
                    let signal = Self::classify(&message);
                    let delay = match self.delay(signal, attempt) {
                        Some(delay) if attempt + 1 < self.max_attempts => delay,
                        Some(_) => {
                            tracing::error!(
                                provider,
                                attempts = self.max_attempts,
                                error = %truncate(&message, 200),
                                "giving up after retries"
                            );
                            return Err(e);
                        }
                        None => return Err(e),
                    };

                    tracing::warn!(
                        provider,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        ?delay,
                        error = %truncate(&message, 200),
                        "transient provider error, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for StreamRetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate a message on a char boundary for logging
pub(crate) fn truncate(message: &str, max_chars: usize) -> &str {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}
