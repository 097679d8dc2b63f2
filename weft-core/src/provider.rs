//! Provider trait and core abstractions.

use crate::error::WeftError;
use crate::types::*;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default time bound for a generation call
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time bound for a health probe
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Type-erased provider that can be shared across threads
pub type BoxedProvider = Arc<dyn Provider>;

/// Core provider trait.
///
/// Every adapter translates the canonical request into its provider's wire
/// format, performs the remote call under a bounded timeout and maps the reply
/// back into a [`GenerationResponse`]. Adapters are built once and never
/// mutated afterwards.
#[async_trait]
pub trait Provider: Send + Sync + Debug + 'static {
    /// Get provider information
    fn info(&self) -> Arc<ProviderInfo>;

    /// Generate text for a request.
    ///
    /// Validation failures are returned as [`WeftError::InvalidRequest`] before
    /// any remote call is attempted.
    async fn generate(&self, req: &GenerationRequest) -> Result<GenerationResponse, WeftError>;

    /// Probe the provider with a minimal generation.
    ///
    /// Never fails: any error is reported as `false`.
    async fn health_check(&self) -> bool;

    /// Static catalog of model keys
    fn list_models(&self) -> Vec<String>;

    /// Model used when a request names none or an unknown one
    fn default_model(&self) -> String;
}

#[async_trait]
impl Provider for BoxedProvider {
    fn info(&self) -> Arc<ProviderInfo> {
        self.as_ref().info()
    }

    async fn generate(&self, req: &GenerationRequest) -> Result<GenerationResponse, WeftError> {
        self.as_ref().generate(req).await
    }

    async fn health_check(&self) -> bool {
        self.as_ref().health_check().await
    }

    fn list_models(&self) -> Vec<String> {
        self.as_ref().list_models()
    }

    fn default_model(&self) -> String {
        self.as_ref().default_model()
    }
}

/// Run a remote call under a time bound, converting expiry into
/// [`WeftError::Timeout`]. Dropping the returned future cancels the call.
pub async fn with_timeout<T, F>(provider: &str, limit: Duration, fut: F) -> Result<T, WeftError>
where
    F: Future<Output = Result<T, WeftError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(WeftError::timeout(
            provider,
            format!("Request timed out after {:?}", limit),
        )),
    }
}

/// Build the synthetic request used by health probes
pub fn health_probe_request(provider: &str, model: &str) -> GenerationRequest {
    GenerationRequest::new(provider, "Hello")
        .with_model(model)
        .with_max_tokens(10)
}

/// Shared health-check routine: generate the probe under `limit`, healthy
/// only when non-empty text comes back.
pub async fn probe<P: Provider + ?Sized>(provider: &P, model: &str, limit: Duration) -> bool {
    let info = provider.info();
    let probe = health_probe_request(&info.id, model);

    match with_timeout(&info.id, limit, provider.generate(&probe)).await {
        Ok(response) => !response.text.is_empty(),
        Err(e) => {
            tracing::warn!(provider = %info.id, error = %e, "health check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn with_timeout_maps_elapsed_to_timeout_error() {
        let result: Result<(), WeftError> = with_timeout("bedrock", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(WeftError::Timeout { provider, .. }) => assert_eq!(provider, "bedrock"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn with_timeout_passes_through_inner_errors() {
        let result: Result<(), WeftError> = with_timeout("openai", Duration::from_secs(1), async {
            Err(WeftError::rate_limit("openai", "slow down"))
        })
        .await;
        assert_eq!(result, Err(WeftError::rate_limit("openai", "slow down")));
    }

    #[test]
    fn probe_request_is_small() {
        let req = health_probe_request("google", "gemini-2.5-flash-lite");
        assert_eq!(req.max_tokens, Some(10));
        assert_eq!(req.model.as_deref(), Some("gemini-2.5-flash-lite"));
        assert!(req.validate().is_ok());
    }
}
