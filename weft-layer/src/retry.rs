//! Retry layer with exponential backoff.
//!
//! This is caller-side retry: it re-issues the whole generation when the
//! adapter reports an error classified as retryable (timeout, rate limit,
//! quota). Adapter-local retry of transient server errors is separate.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use weft_core::error::WeftError;
use weft_core::impl_layered_provider;
use weft_core::layer::{Layer, LayeredProvider};
use weft_core::provider::Provider;
use weft_core::types::{GenerationRequest, GenerationResponse, ProviderInfo};

/// Retry layer configuration
#[derive(Debug, Clone)]
pub struct RetryLayer {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryLayer {
    /// Create a new retry layer with default settings
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt` (zero-based), capped at `max_delay`
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64)
    }
}

impl Default for RetryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Provider> Layer<P> for RetryLayer {
    type LayeredProvider = RetryProvider<P>;

    fn layer(&self, inner: P) -> Self::LayeredProvider {
        RetryProvider {
            inner,
            config: self.clone(),
        }
    }
}

/// Provider wrapped with retry logic
#[derive(Debug)]
pub struct RetryProvider<P> {
    inner: P,
    config: RetryLayer,
}

impl<P: Provider> RetryProvider<P> {
    /// Execute with retry logic
    async fn execute_with_retry<T, F, Fut>(&self, mut operation: F) -> Result<T, WeftError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, WeftError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.config.max_retries {
                        if attempt > 0 {
                            tracing::warn!(
                                provider = e.provider_name().unwrap_or_default(),
                                attempts = attempt + 1,
                                error = %e,
                                "retry layer giving up"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.config.calculate_delay(attempt);
                    tracing::debug!(
                        provider = e.provider_name().unwrap_or_default(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        ?delay,
                        error = %e,
                        "retrying"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<P: Provider> LayeredProvider for RetryProvider<P> {
    type Inner = P;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    fn layered_info(&self) -> Arc<ProviderInfo> {
        self.inner.info()
    }

    async fn layered_generate(
        &self,
        req: &GenerationRequest,
    ) -> Result<GenerationResponse, WeftError> {
        self.execute_with_retry(|| self.inner.generate(req)).await
    }
}

impl_layered_provider!(RetryProvider);
