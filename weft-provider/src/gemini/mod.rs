//! Google Gemini adapter with search and maps grounding.
//!
//! Generation goes through the streaming endpoint. Text is concatenated across
//! chunks and aggregate usage is read from the terminal chunk. Transient
//! server-side failures are retried per [`StreamRetryPolicy`]; an empty
//! aggregate degrades to a placeholder response.

mod transport;
mod types;

pub use transport::{
    ChunkStream, GeminiCallError, GeminiTransport, HttpGeminiTransport, GEMINI_API_BASE,
};
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use weft_core::provider::{probe, with_timeout, GENERATION_TIMEOUT, HEALTH_CHECK_TIMEOUT};
use weft_core::{
    GenerationRequest, GenerationResponse, Metadata, ModelCatalog, Provider, ProviderConfig,
    ProviderInfo, StreamRetryPolicy, Usage, WeftError,
};

/// Registry name of this adapter
pub const PROVIDER_ID: &str = "google";

/// Model used by health probes
pub const HEALTH_CHECK_MODEL: &str = "gemini-2.5-flash-lite";

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8000;
const TOP_P: f32 = 0.95;
const DEFAULT_FINISH_REASON: &str = "stop";

const PLACEHOLDER_TEXT: &str =
    "[Content temporarily unavailable - Gemini API returned empty response]";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// Model catalog with backward-compatible aliases
pub fn catalog() -> ModelCatalog {
    ModelCatalog::new(
        [
            ("gemini-2.5-flash", "gemini-2.5-flash"),
            ("gemini-2.5-flash-lite", "gemini-2.5-flash-lite"),
            ("gemini-3-flash-preview", "gemini-3-flash-preview"),
        ],
        "gemini-3-flash-preview",
    )
    .with_alias("gemini-2.0-flash", "gemini-2.5-flash")
    .with_alias("gemini-2.0-flash-lite", "gemini-2.5-flash-lite")
}

fn map_call_error(err: GeminiCallError) -> WeftError {
    match err {
        GeminiCallError::Api { code: 429, .. } => {
            WeftError::rate_limit(PROVIDER_ID, format!("Rate limit exceeded: {}", err))
        }
        other => WeftError::provider(PROVIDER_ID, format!("Generation failed: {}", other)),
    }
}

/// Build the call body for a request
pub fn build_request(req: &GenerationRequest) -> GenerateContentRequest {
    let mut tools = Vec::new();
    if req.use_search {
        tracing::info!(provider = PROVIDER_ID, "enabling search grounding");
        tools.push(Tool::GoogleSearch {});
    }
    if req.use_maps {
        tracing::info!(provider = PROVIDER_ID, "enabling maps grounding");
        tools.push(Tool::GoogleMaps {});
    }

    GenerateContentRequest {
        contents: vec![Content::user(req.prompt_with_system())],
        tools,
        generation_config: GenerationConfig {
            temperature: req.temperature,
            top_p: TOP_P,
            max_output_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
        },
        safety_settings: HARM_CATEGORIES
            .iter()
            .map(|category| SafetySetting {
                category: category.to_string(),
                threshold: "BLOCK_NONE".to_string(),
            })
            .collect(),
    }
}

/// Google Gemini provider
#[derive(Clone)]
pub struct GeminiProvider {
    transport: Arc<dyn GeminiTransport>,
    catalog: ModelCatalog,
    retry: StreamRetryPolicy,
    timeout: Duration,
    health_timeout: Duration,
    info: Arc<ProviderInfo>,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("info", &self.info)
            .field("transport", &self.transport)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_transport(HttpGeminiTransport::new(api_key))
    }

    /// Create a provider over an arbitrary transport
    pub fn with_transport(transport: impl GeminiTransport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            catalog: catalog(),
            retry: StreamRetryPolicy::default(),
            timeout: GENERATION_TIMEOUT,
            health_timeout: HEALTH_CHECK_TIMEOUT,
            info: Arc::new(ProviderInfo::new(PROVIDER_ID, "Google Gemini")),
        }
    }

    /// Build from factory configuration
    pub fn from_config(config: ProviderConfig) -> Result<Self, WeftError> {
        let mut transport = HttpGeminiTransport::new(config.require_api_key()?);
        if let Some(base_url) = &config.options.base_url {
            transport = transport.with_base_url(base_url.clone());
        }

        Ok(Self::with_transport(transport).with_timeouts(
            config.options.generation_timeout(),
            config.options.health_check_timeout(),
        ))
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: StreamRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override generation and health-probe time bounds
    pub fn with_timeouts(mut self, timeout: Duration, health_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.health_timeout = health_timeout;
        self
    }

    /// One attempt: open the stream and drain it under the time bound
    async fn attempt(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<StreamSummary, WeftError> {
        let drain = async {
            let mut stream = self
                .transport
                .stream_generate(model, request)
                .await
                .map_err(map_call_error)?;

            let mut summary = StreamSummary::default();
            while let Some(chunk) = stream.next().await {
                summary.absorb(chunk.map_err(map_call_error)?);
            }
            Ok::<_, WeftError>(summary)
        };
        with_timeout(PROVIDER_ID, self.timeout, drain).await
    }
}

fn grounding_metadata(last: Option<&GeminiChunk>) -> serde_json::Value {
    match last.and_then(GeminiChunk::grounding_metadata) {
        Some(g) => json!({
            "grounding_supports": g.grounding_supports,
            "web_search_queries": g.web_search_queries,
            "maps_queries": g.maps_queries,
        }),
        None => json!({
            "grounding_supports": null,
            "web_search_queries": [],
            "maps_queries": [],
        }),
    }
}

#[async_trait]
impl Provider for GeminiProvider {
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

        let request = build_request(req);
        tracing::debug!(
            provider = PROVIDER_ID,
            model = %model.wire_id,
            max_output_tokens = request.generation_config.max_output_tokens,
            tools = request.tools.len(),
            "calling streaming endpoint"
        );

        let summary = self
            .retry
            .execute(PROVIDER_ID, || self.attempt(&model.wire_id, &request))
            .await?;

        tracing::info!(
            provider = PROVIDER_ID,
            chunks = summary.chunks,
            chars = summary.text.len(),
            "stream finished"
        );

        if summary.text.is_empty() {
            tracing::warn!(
                provider = PROVIDER_ID,
                chunks = summary.chunks,
                finish_reason = summary.last.as_ref().and_then(|c| c.finish_reason()),
                "empty response, returning placeholder"
            );
            return Ok(GenerationResponse::placeholder(
                PLACEHOLDER_TEXT,
                PROVIDER_ID,
                &model.key,
            ));
        }

        let last = summary.last.as_ref();
        let usage = last.and_then(|c| c.usage_metadata).map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });
        let finish_reason = last
            .and_then(GeminiChunk::finish_reason)
            .unwrap_or(DEFAULT_FINISH_REASON)
            .to_string();

        let mut metadata = Metadata::new();
        metadata.insert(
            "safety_ratings".into(),
            json!(last.map(GeminiChunk::safety_ratings).unwrap_or_default()),
        );
        metadata.insert(
            "candidates".into(),
            json!(last.map(|c| c.candidates.len()).unwrap_or(0)),
        );
        metadata.insert("search_enabled".into(), json!(req.use_search));
        metadata.insert("maps_enabled".into(), json!(req.use_maps));
        metadata.insert(
            "grounding_metadata".into(),
            if req.use_search || req.use_maps {
                grounding_metadata(last)
            } else {
                serde_json::Value::Null
            },
        );
        metadata.insert("chunks".into(), json!(summary.chunks));

        let mut response = GenerationResponse::new(summary.text, PROVIDER_ID, &model.key)
            .with_finish_reason(finish_reason);
        response.usage = usage;
        response.metadata = metadata;
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
