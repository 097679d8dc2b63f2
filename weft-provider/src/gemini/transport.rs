//! Transport seam for the streaming generative API.

use super::types::{GeminiChunk, GenerateContentRequest};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use std::fmt::Debug;

/// Default API base
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Stream of decoded reply chunks
pub type ChunkStream = BoxStream<'static, Result<GeminiChunk, GeminiCallError>>;

/// Failure of a streaming call.
///
/// The `Display` output follows the API's `"<code> <STATUS>. <message>"`
/// wording, which the retry policy classifies.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeminiCallError {
    /// The API answered with an error status
    #[error("{code} {status}. {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
    },

    /// Connection or body failure
    #[error("transport error: {0}")]
    Transport(String),

    /// A chunk could not be decoded
    #[error("stream error: {0}")]
    Stream(String),
}

impl GeminiCallError {
    pub fn api(code: u16, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            status: status.into(),
            message: message.into(),
        }
    }
}

/// Opens a streamed generation.
#[async_trait]
pub trait GeminiTransport: Send + Sync + Debug {
    async fn stream_generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ChunkStream, GeminiCallError>;
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// HTTP transport using server-sent events
#[derive(Clone)]
pub struct HttpGeminiTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpGeminiTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Send requests to a different API base
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Debug for HttpGeminiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGeminiTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl GeminiTransport for HttpGeminiTransport {
    async fn stream_generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ChunkStream, GeminiCallError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| GeminiCallError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(status = %status, error = %e, "failed to read error body");
                    String::new()
                }
            };
            return Err(error_from_body(status, &text));
        }

        let chunks = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) if event.data.trim().is_empty() => None,
                    Ok(event) => Some(
                        serde_json::from_str::<GeminiChunk>(&event.data)
                            .map_err(|e| GeminiCallError::Stream(e.to_string())),
                    ),
                    Err(e) => Some(Err(GeminiCallError::Stream(e.to_string()))),
                }
            });

        Ok(Box::pin(chunks))
    }
}

/// Map an error status and its body to a call error.
///
/// JSON envelopes keep the API's status name; anything else is classed by
/// the HTTP status so retry classification still sees a server error.
fn error_from_body(status: reqwest::StatusCode, text: &str) -> GeminiCallError {
    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(envelope) => GeminiCallError::api(
            if envelope.error.code == 0 {
                status.as_u16()
            } else {
                envelope.error.code
            },
            envelope.error.status,
            envelope.error.message,
        ),
        Err(_) => GeminiCallError::api(
            status.as_u16(),
            if status.is_server_error() {
                "ServerError"
            } else {
                "ClientError"
            },
            text,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_matches_status_wording() {
        let err = GeminiCallError::api(503, "UNAVAILABLE", "The model is overloaded.");
        assert_eq!(err.to_string(), "503 UNAVAILABLE. The model is overloaded.");
    }

    #[test]
    fn unreadable_error_body_keeps_status_class() {
        let err = error_from_body(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err, GeminiCallError::api(503, "ServerError", ""));

        let err = error_from_body(reqwest::StatusCode::BAD_REQUEST, "");
        assert_eq!(err, GeminiCallError::api(400, "ClientError", ""));
    }

    #[test]
    fn json_envelope_keeps_api_status() {
        let body = r#"{"error":{"code":429,"message":"Resource exhausted.","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = error_from_body(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(
            err.to_string(),
            "429 RESOURCE_EXHAUSTED. Resource exhausted."
        );
    }
}
