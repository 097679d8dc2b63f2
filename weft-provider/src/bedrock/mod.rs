//! AWS Bedrock adapter.
//!
//! One runtime endpoint serves three model families (Claude, Llama, Titan),
//! each with its own body schema. Authentication is ambient, so the factory
//! registers this adapter without a credential requirement.

mod family;
mod transport;

pub use family::{ModelFamily, ParsedReply};
pub use transport::{
    BedrockCallError, BedrockRuntime, HttpBedrockRuntime, InvokeOutput, BEARER_TOKEN_ENV,
};

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use weft_core::config::DEFAULT_AWS_REGION;
use weft_core::provider::{probe, with_timeout, GENERATION_TIMEOUT, HEALTH_CHECK_TIMEOUT};
use weft_core::{
    GenerationRequest, GenerationResponse, ModelCatalog, Provider, ProviderConfig, ProviderInfo,
    WeftError,
};

/// Registry name of this adapter
pub const PROVIDER_ID: &str = "bedrock";

/// Model used by health probes
pub const HEALTH_CHECK_MODEL: &str = "claude-3-haiku";

const PLACEHOLDER_TEXT: &str =
    "[Content temporarily unavailable - Bedrock returned empty response]";

/// Model catalog: key -> runtime model id
pub fn catalog() -> ModelCatalog {
    ModelCatalog::new(
        [
            ("claude-3-opus", "anthropic.claude-3-opus-20240229-v1:0"),
            ("claude-3-sonnet", "anthropic.claude-3-sonnet-20240229-v1:0"),
            ("claude-3-haiku", "anthropic.claude-3-haiku-20240307-v1:0"),
            ("llama3-8b", "meta.llama3-8b-instruct-v1:0"),
            ("llama3-70b", "meta.llama3-70b-instruct-v1:0"),
            ("titan-text-lite", "amazon.titan-text-lite-v1"),
            ("titan-text-express", "amazon.titan-text-express-v1"),
        ],
        "claude-3-haiku",
    )
}

/// Map a runtime failure onto the error taxonomy
fn map_call_error(err: BedrockCallError) -> WeftError {
    match err {
        BedrockCallError::Service { code, message } => match code.as_str() {
            "ThrottlingException" | "TooManyRequestsException" => WeftError::rate_limit(
                PROVIDER_ID,
                format!("Rate limit exceeded: {}", message),
            ),
            "ServiceQuotaExceededException" | "QuotaExceededException" => {
                WeftError::quota_exceeded(PROVIDER_ID, format!("Quota exceeded: {}", message))
            }
            _ => WeftError::provider_with_code(
                PROVIDER_ID,
                format!("AWS Bedrock error ({}): {}", code, message),
                code,
            ),
        },
        BedrockCallError::Transport(message) => {
            WeftError::provider(PROVIDER_ID, format!("Generation failed: {}", message))
        }
    }
}

/// AWS Bedrock provider
#[derive(Clone)]
pub struct BedrockProvider {
    runtime: Arc<dyn BedrockRuntime>,
    catalog: ModelCatalog,
    region: String,
    timeout: Duration,
    health_timeout: Duration,
    info: Arc<ProviderInfo>,
}

impl std::fmt::Debug for BedrockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockProvider")
            .field("info", &self.info)
            .field("region", &self.region)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl BedrockProvider {
    /// Create a provider talking HTTP to the regional runtime
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        let runtime = HttpBedrockRuntime::new(&region);
        Self::with_runtime(runtime, region)
    }

    /// Create a provider over an arbitrary runtime
    pub fn with_runtime(runtime: impl BedrockRuntime + 'static, region: impl Into<String>) -> Self {
        Self {
            runtime: Arc::new(runtime),
            catalog: catalog(),
            region: region.into(),
            timeout: GENERATION_TIMEOUT,
            health_timeout: HEALTH_CHECK_TIMEOUT,
            info: Arc::new(ProviderInfo::new(PROVIDER_ID, "AWS Bedrock")),
        }
    }

    /// Build from factory configuration
    pub fn from_config(config: ProviderConfig) -> Result<Self, WeftError> {
        let region = config
            .options
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

        let mut runtime = HttpBedrockRuntime::new(&region);
        if let Some(base_url) = &config.options.base_url {
            runtime = runtime.with_endpoint(base_url.clone());
        }

        Ok(Self::with_runtime(runtime, region)
            .with_timeouts(
                config.options.generation_timeout(),
                config.options.health_check_timeout(),
            ))
    }

    /// Override generation and health-probe time bounds
    pub fn with_timeouts(mut self, timeout: Duration, health_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.health_timeout = health_timeout;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn invoke(&self, model_id: &str, body: serde_json::Value) -> Result<InvokeOutput, WeftError> {
        let call = async move {
            self.runtime
                .invoke_model(model_id, body)
                .await
                .map_err(map_call_error)
        };
        with_timeout(PROVIDER_ID, self.timeout, call).await
    }
}

#[async_trait]
impl Provider for BedrockProvider {
    fn info(&self) -> Arc<ProviderInfo> {
        self.info.clone()
    }

    async fn generate(&self, req: &GenerationRequest) -> Result<GenerationResponse, WeftError> {
        req.validate()?;

        let model = self.catalog.resolve(req.model.as_deref());
        if model.fell_back {
            tracing::warn!(
                provider = PROVIDER_ID,
                requested = req.model.as_deref().unwrap_or_default(),
                model = %model.key,
                "unknown model, using default"
            );
        }

        let family = ModelFamily::detect(&model.wire_id)?;
        let body = family.build_request(req);

        tracing::debug!(provider = PROVIDER_ID, model_id = %model.wire_id, ?family, "invoking model");
        let output = self.invoke(&model.wire_id, body).await?;
        let parsed = family.parse_response(output.body)?;

        let mut response = if parsed.text.is_empty() {
            tracing::warn!(
                provider = PROVIDER_ID,
                model_id = %model.wire_id,
                "empty response, returning placeholder"
            );
            GenerationResponse::placeholder(PLACEHOLDER_TEXT, PROVIDER_ID, &model.key)
        } else {
            let mut response = GenerationResponse::new(parsed.text, PROVIDER_ID, &model.key);
            response.usage = parsed.usage;
            response.finish_reason = parsed.finish_reason;
            response.metadata.extend(parsed.metadata);
            response
        };

        response
            .metadata
            .insert("model_id".into(), json!(model.wire_id));
        response
            .metadata
            .insert("region".into(), json!(self.region));
        response.request_id = output.request_id;

        Ok(response)
    }

    async fn health_check(&self) -> bool {
        probe(self, HEALTH_CHECK_MODEL, self.health_timeout).await
    }

    fn list_models(&self) -> Vec<String> {
        self.catalog.keys()
    }

    fn default_model(&self) -> String {
        self.catalog.default_model().to_string()
    }
}
