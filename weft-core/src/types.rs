//! Canonical request and response types shared by every provider.

use crate::error::WeftError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form metadata map attached to requests and responses
pub type Metadata = HashMap<String, serde_json::Value>;

/// Finish reason used by placeholder responses
pub const EMPTY_RESPONSE_FINISH_REASON: &str = "empty_response";

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message in a conversation, for chat-style providers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// Provider-agnostic generation request.
///
/// Built once per call and never mutated by adapters. `validate` enforces the
/// caller-side invariants: non-blank prompt, temperature in `[0, 2]` and a
/// positive `max_tokens` when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct GenerationRequest {
    /// The prompt to send to the model
    pub prompt: String,

    /// Registered provider name (`bedrock`, `google`, `openai`, ...)
    pub provider: String,

    /// Model key; the adapter default is used when absent or unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum number of tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// System message for context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Ordered chat messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,

    /// Whether the caller asked for streaming
    #[serde(default)]
    pub stream: bool,

    /// Enable search grounding (provider-specific)
    #[serde(default)]
    pub use_search: bool,

    /// Enable maps grounding (provider-specific)
    #[serde(default)]
    pub use_maps: bool,

    /// Advanced grounding configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_config: Option<Metadata>,

    /// Additional caller metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl GenerationRequest {
    /// Create a new request for a provider
    pub fn new(provider: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider: provider.into(),
            model: None,
            temperature: default_temperature(),
            max_tokens: None,
            system_message: None,
            messages: None,
            stream: false,
            use_search: false,
            use_maps: false,
            grounding_config: None,
            metadata: None,
        }
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set system message
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    /// Set chat messages
    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Enable streaming
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Enable search grounding
    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }

    /// Enable maps grounding
    pub fn with_maps(mut self, use_maps: bool) -> Self {
        self.use_maps = use_maps;
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check caller-side invariants before any remote call is made
    pub fn validate(&self) -> Result<(), WeftError> {
        if self.prompt.trim().is_empty() {
            return Err(WeftError::invalid_request("Prompt cannot be empty"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(WeftError::invalid_request(
                "Temperature must be between 0 and 2",
            ));
        }

        if self.max_tokens == Some(0) {
            return Err(WeftError::invalid_request("Max tokens must be positive"));
        }

        Ok(())
    }

    /// System message followed by the prompt, separated by a blank line
    pub fn prompt_with_system(&self) -> String {
        match &self.system_message {
            Some(system) => format!("{}\n\n{}", system, self.prompt),
            None => self.prompt.clone(),
        }
    }
}

/// Usage statistics, normalized across providers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage where the total is the sum of both sides
    pub fn from_counts(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// All counters at zero
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Provider-agnostic generation response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct GenerationResponse {
    /// Generated text, or a placeholder on empty-result fallback
    pub text: String,

    /// Provider that produced the response
    pub provider: String,

    /// Model actually used, after mapping and fallback
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Provider vocabulary, preserved as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl GenerationResponse {
    /// Create a response stamped with the current time
    pub fn new(
        text: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            provider: provider.into(),
            model: model.into(),
            usage: None,
            finish_reason: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
            request_id: None,
        }
    }

    /// Placeholder returned when a provider yields an empty reply
    pub fn placeholder(
        text: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::new(text, provider, model)
            .with_usage(Usage::zero())
            .with_finish_reason(EMPTY_RESPONSE_FINISH_REASON)
    }

    /// Set usage
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Set finish reason
    pub fn with_finish_reason(mut self, finish_reason: impl Into<String>) -> Self {
        self.finish_reason = Some(finish_reason.into());
        self
    }

    /// Set request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Insert a metadata entry
    pub fn with_metadata_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether this response is an empty-result placeholder
    pub fn is_placeholder(&self) -> bool {
        self.finish_reason.as_deref() == Some(EMPTY_RESPONSE_FINISH_REASON)
    }
}

/// Provider information
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
}

impl ProviderInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
