//! Bedrock adapter against a stub runtime.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weft_core::{GenerationRequest, Provider, Usage, WeftError};
use weft_provider::bedrock::{BedrockCallError, BedrockRuntime, InvokeOutput};
use weft_provider::BedrockProvider;

type Handler = dyn Fn(&str, &Value) -> Result<InvokeOutput, BedrockCallError> + Send + Sync;

/// Runtime answering through a closure and recording every call
#[derive(Clone)]
struct StubRuntime {
    handler: Arc<Handler>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    seen_models: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for StubRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubRuntime")
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish()
    }
}

impl StubRuntime {
    fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<InvokeOutput, BedrockCallError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_models: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn replying(body: Value) -> Self {
        Self::new(move |_, _| Ok(InvokeOutput::new(body.clone()).with_request_id("req-123")))
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn provider(&self) -> BedrockProvider {
        BedrockProvider::with_runtime(self.clone(), "us-west-2")
    }
}

#[async_trait]
impl BedrockRuntime for StubRuntime {
    async fn invoke_model(
        &self,
        model_id: &str,
        body: Value,
    ) -> Result<InvokeOutput, BedrockCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_models.lock().unwrap().push(model_id.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(model_id, &body)
    }
}

fn request(model: &str) -> GenerationRequest {
    GenerationRequest::new("bedrock", "Name a color")
        .with_model(model)
        .with_system_message("Be brief")
        .with_temperature(0.2)
}

#[tokio::test]
async fn claude_round_trip() {
    let stub = StubRuntime::new(|model_id, body| {
        assert_eq!(model_id, "anthropic.claude-3-sonnet-20240229-v1:0");
        assert_eq!(body["system"], "Be brief");
        assert_eq!(body["messages"][0]["content"], "Name a color");
        Ok(InvokeOutput::new(json!({
            "content": [{ "type": "text", "text": "Blue" }],
            "usage": { "input_tokens": 12, "output_tokens": 1 },
            "stop_reason": "end_turn",
            "model": "claude-3-sonnet-20240229"
        }))
        .with_request_id("req-claude"))
    });

    let resp = stub.provider().generate(&request("claude-3-sonnet")).await.unwrap();

    assert_eq!(resp.text, "Blue");
    assert_eq!(resp.provider, "bedrock");
    assert_eq!(resp.model, "claude-3-sonnet");
    assert_eq!(resp.usage, Some(Usage::from_counts(12, 1)));
    assert_eq!(resp.usage.unwrap().total_tokens, 13);
    assert_eq!(resp.finish_reason.as_deref(), Some("end_turn"));
    assert_eq!(resp.request_id.as_deref(), Some("req-claude"));
    assert_eq!(
        resp.metadata["model_id"],
        "anthropic.claude-3-sonnet-20240229-v1:0"
    );
    assert_eq!(resp.metadata["region"], "us-west-2");
    assert_eq!(resp.metadata["stop_reason"], "end_turn");
}

#[tokio::test]
async fn llama_round_trip_echoes_flattened_prompt() {
    let stub = StubRuntime::new(|_, body| {
        Ok(InvokeOutput::new(json!({
            "generation": format!("Echo: {}", body["prompt"].as_str().unwrap()),
            "prompt_token_count": 9,
            "generation_token_count": 4,
            "stop_reason": "stop"
        })))
    });

    let resp = stub.provider().generate(&request("llama3-70b")).await.unwrap();

    assert_eq!(resp.text, "Echo: System: Be brief\n\nUser: Name a color");
    assert_eq!(resp.model, "llama3-70b");
    assert_eq!(
        resp.usage,
        Some(Usage {
            prompt_tokens: 9,
            completion_tokens: 4,
            total_tokens: 13
        })
    );
    assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    assert!(resp.request_id.is_none());
}

#[tokio::test]
async fn titan_round_trip() {
    let stub = StubRuntime::new(|_, body| {
        assert_eq!(body["inputText"], "Be brief\n\nName a color");
        assert_eq!(body["textGenerationConfig"]["topP"], json!(0.9f32));
        Ok(InvokeOutput::new(json!({
            "inputTextTokenCount": 7,
            "results": [{
                "outputText": "Blue",
                "tokenCount": 2,
                "completionReason": "FINISH"
            }]
        })))
    });

    let resp = stub.provider().generate(&request("titan-text-lite")).await.unwrap();

    assert_eq!(resp.text, "Blue");
    assert_eq!(resp.usage, Some(Usage::from_counts(7, 2)));
    assert_eq!(resp.finish_reason.as_deref(), Some("FINISH"));
    assert_eq!(resp.metadata["completion_reason"], "FINISH");
}

#[tokio::test]
async fn invalid_requests_never_reach_the_runtime() {
    let stub = StubRuntime::replying(json!({ "generation": "never" }));
    let provider = stub.provider();

    let invalid = [
        GenerationRequest::new("bedrock", "   "),
        GenerationRequest::new("bedrock", "hi").with_temperature(2.5),
        GenerationRequest::new("bedrock", "hi").with_temperature(-0.1),
        GenerationRequest::new("bedrock", "hi").with_max_tokens(0),
    ];
    for req in &invalid {
        let err = provider.generate(req).await.unwrap_err();
        assert!(matches!(err, WeftError::InvalidRequest(_)), "{:?}", err);
        assert!(err.is_caller_error());
    }
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn empty_reply_degrades_to_placeholder() {
    let stub = StubRuntime::replying(json!({ "content": [], "stop_reason": "end_turn" }));

    let resp = stub
        .provider()
        .generate(&GenerationRequest::new("bedrock", "hi"))
        .await
        .unwrap();

    assert!(!resp.text.is_empty());
    assert!(resp.is_placeholder());
    assert_eq!(resp.finish_reason.as_deref(), Some("empty_response"));
    assert_eq!(resp.usage, Some(Usage::zero()));
    assert_eq!(resp.model, "claude-3-haiku");
    assert_eq!(resp.provider, "bedrock");
}

#[tokio::test]
async fn runtime_errors_map_to_taxonomy() {
    let cases = [
        ("ThrottlingException", "rate"),
        ("ServiceQuotaExceededException", "quota"),
        ("AccessDeniedException", "provider"),
    ];

    for (code, expected) in cases {
        let stub = StubRuntime::new(move |_, _| Err(BedrockCallError::service(code, "nope")));
        let err = stub
            .provider()
            .generate(&GenerationRequest::new("bedrock", "hi"))
            .await
            .unwrap_err();

        match (expected, &err) {
            ("rate", WeftError::RateLimit { provider, .. })
            | ("quota", WeftError::QuotaExceeded { provider, .. }) => {
                assert_eq!(provider, "bedrock")
            }
            ("provider", WeftError::Provider { code: Some(c), .. }) => {
                assert_eq!(c, "AccessDeniedException")
            }
            _ => panic!("{} mapped to {:?}", code, err),
        }
        assert!(!err.is_caller_error());
    }
}

#[tokio::test]
async fn transport_failure_is_generic_provider_error() {
    let stub =
        StubRuntime::new(|_, _| Err(BedrockCallError::Transport("connection reset".into())));
    let err = stub
        .provider()
        .generate(&GenerationRequest::new("bedrock", "hi"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WeftError::provider("bedrock", "Generation failed: connection reset")
    );
}

#[tokio::test(start_paused = true)]
async fn slow_runtime_times_out() {
    let stub = StubRuntime::replying(json!({ "generation": "late" }))
        .with_delay(Duration::from_secs(120));
    let provider = stub
        .provider()
        .with_timeouts(Duration::from_secs(60), Duration::from_secs(10));

    let err = provider
        .generate(&GenerationRequest::new("bedrock", "hi").with_model("llama3-8b"))
        .await
        .unwrap_err();
    assert!(matches!(err, WeftError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unknown_model_falls_back_to_default() {
    let stub = StubRuntime::replying(json!({
        "content": [{ "type": "text", "text": "ok" }]
    }));

    let resp = stub
        .provider()
        .generate(&GenerationRequest::new("bedrock", "hi").with_model("claude-9"))
        .await
        .unwrap();

    assert_eq!(resp.model, "claude-3-haiku");
    assert_eq!(
        stub.seen_models.lock().unwrap().as_slice(),
        ["anthropic.claude-3-haiku-20240307-v1:0"]
    );
}

#[tokio::test]
async fn health_check_probes_haiku() {
    let stub = StubRuntime::new(|_, body| {
        assert_eq!(body["max_tokens"], 10);
        Ok(InvokeOutput::new(json!({
            "content": [{ "type": "text", "text": "Hi" }]
        })))
    });
    assert!(stub.provider().health_check().await);
    assert_eq!(
        stub.seen_models.lock().unwrap().as_slice(),
        ["anthropic.claude-3-haiku-20240307-v1:0"]
    );

    let failing = StubRuntime::new(|_, _| Err(BedrockCallError::service("InternalServerException", "x")));
    assert!(!failing.provider().health_check().await);
}

#[test]
fn list_models_is_stable() {
    let provider = StubRuntime::replying(json!({})).provider();
    let first = provider.list_models();
    assert_eq!(first, provider.list_models());
    assert_eq!(first.len(), 7);
    assert!(first.contains(&provider.default_model()));
}
