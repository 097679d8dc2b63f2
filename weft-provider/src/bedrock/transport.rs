//! Transport seam for the managed-inference runtime.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

/// Environment variable holding a runtime API key (bearer token)
pub const BEARER_TOKEN_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

/// Raw reply of an `InvokeModel` call
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOutput {
    /// Decoded JSON body
    pub body: Value,
    /// Request id reported by the runtime
    pub request_id: Option<String>,
}

impl InvokeOutput {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Failure of an `InvokeModel` call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BedrockCallError {
    /// The runtime answered with a vendor error code
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The call never produced a usable reply
    #[error("{0}")]
    Transport(String),
}

impl BedrockCallError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Invokes a model on the runtime.
#[async_trait]
pub trait BedrockRuntime: Send + Sync + Debug {
    async fn invoke_model(&self, model_id: &str, body: Value)
        -> Result<InvokeOutput, BedrockCallError>;
}

/// HTTP runtime client.
///
/// Authenticates with the ambient bearer token when one is present in the
/// environment; otherwise the request is sent unsigned and relies on a
/// signing proxy in front of `endpoint`.
#[derive(Clone)]
pub struct HttpBedrockRuntime {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpBedrockRuntime {
    /// Client for the regional runtime endpoint
    pub fn new(region: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("https://bedrock-runtime.{}.amazonaws.com", region),
            bearer_token: std::env::var(BEARER_TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }

    /// Send requests to a different endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Use an explicit bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Debug for HttpBedrockRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBedrockRuntime")
            .field("endpoint", &self.endpoint)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Strip namespace and URI decorations from a vendor error type.
///
/// `com.amazon.coral.service#ThrottlingException` and
/// `ThrottlingException:http://internal.amazon.com/...` both yield
/// `ThrottlingException`.
pub(crate) fn error_code(raw: &str) -> String {
    let name = raw.rsplit('#').next().unwrap_or(raw);
    name.split(':').next().unwrap_or(name).trim().to_string()
}

#[async_trait]
impl BedrockRuntime for HttpBedrockRuntime {
    async fn invoke_model(
        &self,
        model_id: &str,
        body: Value,
    ) -> Result<InvokeOutput, BedrockCallError> {
        let url = format!("{}/model/{}/invoke", self.endpoint, model_id);

        let mut request = self
            .client
            .post(&url)
            .header("accept", "application/json")
            .json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BedrockCallError::Transport(e.to_string()))?;

        let status = response.status();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let request_id = header("x-amzn-RequestId");
        let error_type = header("x-amzn-ErrorType");

        let text = response
            .text()
            .await
            .map_err(|e| BedrockCallError::Transport(e.to_string()))?;

        if !status.is_success() {
            let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let code = parsed
                .get("__type")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(error_type)
                .map(|raw| error_code(&raw))
                .unwrap_or_else(|| status.as_u16().to_string());
            let message = parsed
                .get("message")
                .or_else(|| parsed.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(text);

            tracing::debug!(%status, %code, "runtime returned an error");
            return Err(BedrockCallError::Service { code, message });
        }

        let body = serde_json::from_str(&text)
            .map_err(|e| BedrockCallError::Transport(format!("Invalid response body: {}", e)))?;

        Ok(InvokeOutput { body, request_id })
    }
}
