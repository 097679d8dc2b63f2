//! OpenAI chat adapter using the async-openai crate.
//!
//! A single round-trip under the generation time bound, with no retry loop of
//! its own. An empty reply is a hard provider error; unlike the other
//! adapters there is no placeholder fallback.

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CompletionUsage, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FinishReason,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use weft_core::provider::{probe, with_timeout, GENERATION_TIMEOUT, HEALTH_CHECK_TIMEOUT};
use weft_core::{
    GenerationRequest, GenerationResponse, ModelCatalog, Provider, ProviderConfig, ProviderInfo,
    Usage, WeftError,
};

/// Registry name of this adapter
pub const PROVIDER_ID: &str = "openai";

/// Model used by health probes
pub const HEALTH_CHECK_MODEL: &str = "gpt-3.5-turbo";

const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Model catalog: key -> API model name
pub fn catalog() -> ModelCatalog {
    ModelCatalog::new(
        [
            ("gpt-4-turbo", "gpt-4-turbo-preview"),
            ("gpt-4", "gpt-4"),
            ("gpt-3.5-turbo", "gpt-3.5-turbo"),
        ],
        "gpt-3.5-turbo",
    )
}

/// Wire spelling of a finish reason (`stop`, `length`, ...)
fn finish_reason_str(reason: FinishReason) -> String {
    serde_json::to_value(reason)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn usage_from(usage: CompletionUsage) -> Usage {
    Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}

fn empty_response() -> WeftError {
    WeftError::provider(PROVIDER_ID, "Empty response from OpenAI")
}

/// Map an SDK failure onto the error taxonomy
fn map_sdk_error(err: OpenAIError) -> WeftError {
    match err {
        OpenAIError::ApiError(api) => {
            let kind = api.code.clone().or_else(|| api.r#type.clone());
            match kind.as_deref() {
                Some("insufficient_quota") => WeftError::quota_exceeded(
                    PROVIDER_ID,
                    format!("Quota exceeded: {}", api.message),
                ),
                Some("rate_limit_exceeded") => WeftError::rate_limit(
                    PROVIDER_ID,
                    format!("Rate limit exceeded: {}", api.message),
                ),
                _ => WeftError::Provider {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("Generation failed: {}", api.message),
                    code: kind,
                },
            }
        }
        other => WeftError::provider(PROVIDER_ID, format!("Generation failed: {}", other)),
    }
}

/// Reply collected from either the unary or the streamed endpoint
#[derive(Debug, Default)]
struct ChatReply {
    id: String,
    model: String,
    object: String,
    text: String,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl ChatReply {
    fn from_response(response: CreateChatCompletionResponse) -> Result<Self, WeftError> {
        let choice = response.choices.into_iter().next().ok_or_else(empty_response)?;
        Ok(Self {
            id: response.id,
            model: response.model,
            object: response.object,
            text: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.map(finish_reason_str),
            usage: response.usage.map(usage_from),
        })
    }
}

/// OpenAI provider using async-openai
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    catalog: ModelCatalog,
    timeout: Duration,
    health_timeout: Duration,
    info: Arc<ProviderInfo>,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("info", &self.info)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a new OpenAI provider with default configuration
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key))
    }

    /// Create a builder for more configuration options
    pub fn builder() -> OpenAiBuilder {
        OpenAiBuilder::default()
    }

    /// One attempt per call: the SDK backoff is disabled
    fn with_config(config: OpenAIConfig) -> Self {
        let single_attempt = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config).with_backoff(single_attempt),
            catalog: catalog(),
            timeout: GENERATION_TIMEOUT,
            health_timeout: HEALTH_CHECK_TIMEOUT,
            info: Arc::new(ProviderInfo::new(PROVIDER_ID, "OpenAI")),
        }
    }

    /// Build from factory configuration
    pub fn from_config(config: ProviderConfig) -> Result<Self, WeftError> {
        let mut builder = Self::builder()
            .api_key(config.require_api_key()?)
            .timeouts(
                config.options.generation_timeout(),
                config.options.health_check_timeout(),
            );
        if let Some(base_url) = &config.options.base_url {
            builder = builder.api_base(base_url.clone());
        }
        builder.build()
    }

    /// Optional system message, then the user prompt
    fn build_messages(
        req: &GenerationRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, WeftError> {
        let mut messages = Vec::with_capacity(2);

        if let Some(system) = &req.system_message {
            let msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(system.as_str())
                .build()
                .map_err(|e| {
                    WeftError::provider(PROVIDER_ID, format!("Failed to build system message: {}", e))
                })?;
            messages.push(ChatCompletionRequestMessage::System(msg));
        }

        let msg = ChatCompletionRequestUserMessageArgs::default()
            .content(req.prompt.as_str())
            .build()
            .map_err(|e| {
                WeftError::provider(PROVIDER_ID, format!("Failed to build user message: {}", e))
            })?;
        messages.push(ChatCompletionRequestMessage::User(msg));

        Ok(messages)
    }

    /// Build CreateChatCompletionRequest from a generation request
    #[allow(deprecated)]
    fn build_request(
        req: &GenerationRequest,
        model: &str,
    ) -> Result<CreateChatCompletionRequest, WeftError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(model)
            .messages(Self::build_messages(req)?)
            .temperature(req.temperature)
            .max_tokens(req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS))
            .stream(req.stream);

        builder.build().map_err(|e| {
            WeftError::provider(PROVIDER_ID, format!("Failed to build request: {}", e))
        })
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Result<ChatReply, WeftError> {
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_sdk_error)?;
        ChatReply::from_response(response)
    }

    /// Drain a streamed completion into one reply
    async fn complete_streamed(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<ChatReply, WeftError> {
        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(map_sdk_error)?;

        let mut reply = ChatReply::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_sdk_error)?;
            reply.id = chunk.id;
            reply.model = chunk.model;
            reply.object = chunk.object;
            if let Some(usage) = chunk.usage {
                reply.usage = Some(usage_from(usage));
            }
            if let Some(choice) = chunk.choices.into_iter().next() {
                if let Some(content) = choice.delta.content {
                    reply.text.push_str(&content);
                }
                if let Some(reason) = choice.finish_reason {
                    reply.finish_reason = Some(finish_reason_str(reason));
                }
            }
        }
        Ok(reply)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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

        let request = Self::build_request(req, &model.wire_id)?;
        let reply = if req.stream {
            with_timeout(PROVIDER_ID, self.timeout, self.complete_streamed(request)).await?
        } else {
            with_timeout(PROVIDER_ID, self.timeout, self.complete(request)).await?
        };

        if reply.text.is_empty() {
            return Err(empty_response());
        }

        let mut response = GenerationResponse::new(reply.text, PROVIDER_ID, &model.key)
            .with_metadata_entry("response_id", json!(reply.id))
            .with_metadata_entry("model", json!(reply.model))
            .with_metadata_entry("object", json!(reply.object));
        response.usage = reply.usage;
        response.finish_reason = reply.finish_reason;
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

/// Builder for OpenAI provider with custom configuration
#[derive(Default)]
pub struct OpenAiBuilder {
    api_key: Option<String>,
    api_base: Option<String>,
    org_id: Option<String>,
    timeouts: Option<(Duration, Duration)>,
}

impl OpenAiBuilder {
    /// Set API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set API base URL (for OpenAI-compatible endpoints)
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set organization ID
    pub fn organization(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Set generation and health-probe time bounds
    pub fn timeouts(mut self, timeout: Duration, health_timeout: Duration) -> Self {
        self.timeouts = Some((timeout, health_timeout));
        self
    }

    /// Build the provider
    pub fn build(self) -> Result<OpenAiProvider, WeftError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| WeftError::configuration("API key not found for provider 'openai'"))?;

        let mut config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(api_base) = self.api_base {
            config = config.with_api_base(api_base);
        }

        if let Some(org_id) = self.org_id {
            config = config.with_org_id(org_id);
        }

        let mut provider = OpenAiProvider::with_config(config);
        if let Some((timeout, health_timeout)) = self.timeouts {
            provider.timeout = timeout;
            provider.health_timeout = health_timeout;
        }
        Ok(provider)
    }
}
