//! Wire types for the streaming generative API.
//!
//! Reply chunks are decoded into explicit structs. Every optional field has a
//! serde default, so a field the API omits is an empty collection or `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a `streamGenerateContent` call
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A single-part user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.into()),
                thought: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on reasoning parts, which are not part of the answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

/// Grounding tool descriptor
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum Tool {
    #[serde(rename = "googleSearch")]
    GoogleSearch {},
    #[serde(rename = "googleMaps")]
    GoogleMaps {},
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

/// One streamed reply chunk
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub probability: String,
    #[serde(default)]
    pub blocked: bool,
}

/// Token counts; absent counters are zero
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_supports: Vec<Value>,
    #[serde(default)]
    pub web_search_queries: Vec<String>,
    #[serde(default)]
    pub maps_queries: Vec<String>,
    #[serde(default)]
    pub grounding_chunks: Vec<Value>,
}

impl GeminiChunk {
    /// Text of the first candidate, excluding reasoning parts
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.first_candidate()?.finish_reason.as_deref()
    }

    pub fn safety_ratings(&self) -> &[SafetyRating] {
        self.first_candidate()
            .map(|c| c.safety_ratings.as_slice())
            .unwrap_or_default()
    }

    pub fn grounding_metadata(&self) -> Option<&GroundingMetadata> {
        self.first_candidate()?.grounding_metadata.as_ref()
    }
}

/// Aggregate of a consumed chunk stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    /// Concatenated text of every chunk exposing text
    pub text: String,
    /// Number of chunks seen
    pub chunks: usize,
    /// The terminal chunk, which carries aggregate usage
    pub last: Option<GeminiChunk>,
}

impl StreamSummary {
    /// Fold one chunk into the summary
    pub fn absorb(&mut self, chunk: GeminiChunk) {
        self.chunks += 1;
        if let Some(text) = chunk.text() {
            self.text.push_str(&text);
        }
        self.last = Some(chunk);
    }
}
