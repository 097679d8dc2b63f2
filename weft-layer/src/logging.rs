//! Logging layer for provider operations.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use weft_core::error::WeftError;
use weft_core::impl_layered_provider;
use weft_core::layer::{Layer, LayeredProvider};
use weft_core::provider::Provider;
use weft_core::types::{GenerationRequest, GenerationResponse, ProviderInfo};

/// Logging layer that records every generation and health probe with its
/// elapsed time.
#[derive(Debug, Clone, Default)]
pub struct LoggingLayer {
    slow_threshold: Option<Duration>,
}

impl LoggingLayer {
    /// Create a new logging layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Log successful generations slower than `threshold` at warn level
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }
}

impl<P: Provider> Layer<P> for LoggingLayer {
    type LayeredProvider = LoggingProvider<P>;

    fn layer(&self, inner: P) -> Self::LayeredProvider {
        LoggingProvider {
            inner,
            slow_threshold: self.slow_threshold,
        }
    }
}

/// Provider wrapped with logging
#[derive(Debug)]
pub struct LoggingProvider<P> {
    inner: P,
    slow_threshold: Option<Duration>,
}

impl<P> LoggingProvider<P> {
    fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_threshold.is_some_and(|t| elapsed > t)
    }
}

#[async_trait]
impl<P: Provider> LayeredProvider for LoggingProvider<P> {
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
        let provider = self.inner.info().id.clone();
        tracing::debug!(
            provider = %provider,
            model = req.model.as_deref().unwrap_or("default"),
            prompt_chars = req.prompt.len(),
            stream = req.stream,
            "generate request"
        );

        let start = Instant::now();
        let result = self.inner.generate(req).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) if self.is_slow(elapsed) => {
                tracing::warn!(
                    provider = %provider,
                    model = %response.model,
                    ?elapsed,
                    "slow generate"
                );
            }
            Ok(response) => {
                tracing::debug!(
                    provider = %provider,
                    model = %response.model,
                    chars = response.text.len(),
                    tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0),
                    placeholder = response.is_placeholder(),
                    ?elapsed,
                    "generate success"
                );
            }
            Err(e) => {
                tracing::error!(provider = %provider, error = %e, ?elapsed, "generate error");
            }
        }

        result
    }

    async fn layered_health_check(&self) -> bool {
        let start = Instant::now();
        let healthy = self.inner.health_check().await;
        tracing::debug!(
            provider = %self.inner.info().id,
            healthy,
            elapsed = ?start.elapsed(),
            "health check"
        );
        healthy
    }
}

impl_layered_provider!(LoggingProvider);
