//! Model families served by the managed-inference runtime.
//!
//! Each family has its own request body and reply schema. The family is
//! chosen by substring match on the wire model id.

use serde::Deserialize;
use serde_json::{json, Value};
use weft_core::{GenerationRequest, Metadata, Usage, WeftError};

use super::PROVIDER_ID;

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const CLAUDE_MAX_TOKENS: u32 = 4096;
const LLAMA_MAX_GEN_LEN: u32 = 2048;
const TITAN_MAX_TOKEN_COUNT: u32 = 4096;
const NUCLEUS_TOP_P: f32 = 0.9;

/// Request/response schema group within the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Anthropic chat-completion models
    Claude,
    /// Meta instruction-completion models
    Llama,
    /// Amazon text-generation models
    Titan,
}

/// A reply parsed out of a family-specific body.
///
/// `text` may be empty; the adapter decides how to degrade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    pub text: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
    pub metadata: Metadata,
}

impl ModelFamily {
    /// Detect the family of a wire model id
    pub fn detect(model_id: &str) -> Result<Self, WeftError> {
        if model_id.contains("claude") {
            Ok(Self::Claude)
        } else if model_id.contains("llama") {
            Ok(Self::Llama)
        } else if model_id.contains("titan") {
            Ok(Self::Titan)
        } else {
            Err(WeftError::provider(
                PROVIDER_ID,
                format!("Unknown model family: {}", model_id),
            ))
        }
    }

    /// Build the family's request body
    pub fn build_request(self, req: &GenerationRequest) -> Value {
        match self {
            Self::Claude => {
                let mut body = json!({
                    "anthropic_version": ANTHROPIC_VERSION,
                    "messages": [{ "role": "user", "content": req.prompt }],
                    "max_tokens": req.max_tokens.unwrap_or(CLAUDE_MAX_TOKENS),
                    "temperature": req.temperature,
                });
                if let Some(system) = &req.system_message {
                    body["system"] = json!(system);
                }
                body
            }
            Self::Llama => {
                let prompt = match &req.system_message {
                    Some(system) => format!("System: {}\n\nUser: {}", system, req.prompt),
                    None => req.prompt.clone(),
                };
                json!({
                    "prompt": prompt,
                    "max_gen_len": req.max_tokens.unwrap_or(LLAMA_MAX_GEN_LEN),
                    "temperature": req.temperature,
                    "top_p": NUCLEUS_TOP_P,
                })
            }
            Self::Titan => json!({
                "inputText": req.prompt_with_system(),
                "textGenerationConfig": {
                    "maxTokenCount": req.max_tokens.unwrap_or(TITAN_MAX_TOKEN_COUNT),
                    "temperature": req.temperature,
                    "topP": NUCLEUS_TOP_P,
                },
            }),
        }
    }

    /// Parse the family's reply body
    pub fn parse_response(self, body: Value) -> Result<ParsedReply, WeftError> {
        match self {
            Self::Claude => decode::<ClaudeReply>(body, self).map(ClaudeReply::into_parsed),
            Self::Llama => decode::<LlamaReply>(body, self).map(LlamaReply::into_parsed),
            Self::Titan => decode::<TitanReply>(body, self).map(TitanReply::into_parsed),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: Value, family: ModelFamily) -> Result<T, WeftError> {
    serde_json::from_value(body).map_err(|e| {
        WeftError::provider(
            PROVIDER_ID,
            format!("Malformed {:?} response: {}", family, e),
        )
    })
}

fn total(prompt: u32, completion: u32) -> Usage {
    Usage::from_counts(prompt, completion)
}

#[derive(Debug, Deserialize)]
struct ClaudeReply {
    #[serde(default)]
    content: Vec<ClaudeBlock>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl ClaudeReply {
    fn into_parsed(self) -> ParsedReply {
        let text = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<String>();

        let mut metadata = Metadata::new();
        metadata.insert("model".into(), json!(self.model));
        metadata.insert("stop_reason".into(), json!(self.stop_reason));

        ParsedReply {
            text,
            usage: self
                .usage
                .map(|u| total(u.input_tokens, u.output_tokens)),
            finish_reason: self.stop_reason,
            metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LlamaReply {
    #[serde(default)]
    generation: String,
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    generation_token_count: Option<u32>,
    #[serde(default)]
    stop_reason: Option<String>,
}

impl LlamaReply {
    fn into_parsed(self) -> ParsedReply {
        let usage = match (self.prompt_token_count, self.generation_token_count) {
            (None, None) => None,
            (prompt, completion) => Some(total(prompt.unwrap_or(0), completion.unwrap_or(0))),
        };

        let mut metadata = Metadata::new();
        metadata.insert("stop_reason".into(), json!(self.stop_reason));

        ParsedReply {
            text: self.generation,
            usage,
            finish_reason: self.stop_reason,
            metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanReply {
    #[serde(default)]
    input_text_token_count: Option<u32>,
    #[serde(default)]
    results: Vec<TitanResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResult {
    #[serde(default)]
    output_text: String,
    #[serde(default)]
    token_count: u32,
    #[serde(default)]
    completion_reason: Option<String>,
}

impl TitanReply {
    fn into_parsed(self) -> ParsedReply {
        let input_tokens = self.input_text_token_count;
        let Some(first) = self.results.into_iter().next() else {
            return ParsedReply::default();
        };

        let mut metadata = Metadata::new();
        metadata.insert("completion_reason".into(), json!(first.completion_reason));

        ParsedReply {
            text: first.output_text,
            usage: input_tokens.map(|input| total(input, first.token_count)),
            finish_reason: first.completion_reason,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::new("bedrock", "Name a color")
            .with_system_message("Be brief")
            .with_temperature(0.2)
    }

    #[test]
    fn detects_family_from_wire_id() {
        assert_eq!(
            ModelFamily::detect("anthropic.claude-3-haiku-20240307-v1:0").unwrap(),
            ModelFamily::Claude
        );
        assert_eq!(
            ModelFamily::detect("meta.llama3-8b-instruct-v1:0").unwrap(),
            ModelFamily::Llama
        );
        assert_eq!(
            ModelFamily::detect("amazon.titan-text-lite-v1").unwrap(),
            ModelFamily::Titan
        );
        assert!(matches!(
            ModelFamily::detect("cohere.command-r-v1:0"),
            Err(WeftError::Provider { .. })
        ));
    }

    #[test]
    fn claude_body_carries_system_field() {
        let body = ModelFamily::Claude.build_request(&request());
        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Name a color");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"], "Be brief");
    }

    #[test]
    fn claude_body_omits_absent_system() {
        let body = ModelFamily::Claude.build_request(&GenerationRequest::new("bedrock", "hi"));
        assert!(body.get("system").is_none());
    }

    #[test]
    fn llama_body_flattens_roles() {
        let body = ModelFamily::Llama.build_request(&request().with_max_tokens(64));
        assert_eq!(body["prompt"], "System: Be brief\n\nUser: Name a color");
        assert_eq!(body["max_gen_len"], 64);

        let body = ModelFamily::Llama.build_request(&GenerationRequest::new("bedrock", "hi"));
        assert_eq!(body["prompt"], "hi");
        assert_eq!(body["max_gen_len"], 2048);
    }

    #[test]
    fn titan_body_concatenates_without_markers() {
        let body = ModelFamily::Titan.build_request(&request());
        assert_eq!(body["inputText"], "Be brief\n\nName a color");
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], 4096);
    }

    #[test]
    fn claude_reply_ignores_non_text_blocks() {
        let parsed = ModelFamily::Claude
            .parse_response(json!({
                "content": [
                    { "type": "text", "text": "Blue" },
                    { "type": "tool_use", "id": "t1" },
                    { "type": "text", "text": "." }
                ],
                "usage": { "input_tokens": 12, "output_tokens": 3 },
                "stop_reason": "end_turn",
                "model": "claude-3-haiku-20240307"
            }))
            .unwrap();
        assert_eq!(parsed.text, "Blue.");
        assert_eq!(parsed.usage, Some(Usage::from_counts(12, 3)));
        assert_eq!(parsed.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(parsed.metadata["model"], "claude-3-haiku-20240307");
    }

    #[test]
    fn titan_without_results_parses_empty() {
        let parsed = ModelFamily::Titan
            .parse_response(json!({ "inputTextTokenCount": 4, "results": [] }))
            .unwrap();
        assert!(parsed.text.is_empty());
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn malformed_body_is_provider_error() {
        let err = ModelFamily::Llama
            .parse_response(json!({ "generation": 42 }))
            .unwrap_err();
        assert_eq!(err.provider_name(), Some("bedrock"));
    }
}
