//! OpenAI adapter against a mock chat-completions endpoint.

use serde_json::json;
use std::time::Duration;
use weft_core::{GenerationRequest, Provider, Usage, WeftError};
use weft_provider::OpenAiProvider;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::builder()
        .api_key("sk-test")
        .api_base(server.uri())
        .build()
        .unwrap()
}

fn completion(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "gpt-4-0125-preview",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 11, "completion_tokens": 3, "total_tokens": 14 }
    })
}

fn api_error(message: &str, kind: &str, code: &str) -> serde_json::Value {
    json!({ "error": { "message": message, "type": kind, "param": null, "code": code } })
}

#[tokio::test]
async fn generate_maps_reply_and_sends_wire_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4-turbo-preview",
            "max_tokens": 128,
            "messages": [
                { "role": "system", "content": "Be brief" },
                { "role": "user", "content": "Name a color" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("Blue"))))
        .expect(1)
        .mount(&server)
        .await;

    let req = GenerationRequest::new("openai", "Name a color")
        .with_model("gpt-4-turbo")
        .with_system_message("Be brief")
        .with_max_tokens(128);
    let resp = provider(&server).generate(&req).await.unwrap();

    assert_eq!(resp.text, "Blue");
    assert_eq!(resp.provider, "openai");
    assert_eq!(resp.model, "gpt-4-turbo");
    assert_eq!(resp.usage, Some(Usage::from_counts(11, 3)));
    assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    assert_eq!(resp.metadata["response_id"], "chatcmpl-123");
    assert_eq!(resp.metadata["model"], "gpt-4-0125-preview");
    assert_eq!(resp.metadata["object"], "chat.completion");
}

#[tokio::test]
async fn unknown_model_uses_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-3.5-turbo", "max_tokens": 2048 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("ok"))))
        .expect(1)
        .mount(&server)
        .await;

    let resp = provider(&server)
        .generate(&GenerationRequest::new("openai", "hi").with_model("gpt-5-ultra"))
        .await
        .unwrap();
    assert_eq!(resp.model, "gpt-3.5-turbo");
}

#[tokio::test]
async fn empty_content_is_a_hard_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!(""))))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate(&GenerationRequest::new("openai", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err, WeftError::provider("openai", "Empty response from OpenAI"));
}

#[tokio::test]
async fn missing_choices_is_a_hard_error() {
    let server = MockServer::start().await;
    let mut body = completion(json!("unused"));
    body["choices"] = json!([]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate(&GenerationRequest::new("openai", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err, WeftError::provider("openai", "Empty response from OpenAI"));
}

#[tokio::test]
async fn insufficient_quota_maps_to_quota_exceeded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(api_error(
            "You exceeded your current quota.",
            "insufficient_quota",
            "insufficient_quota",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate(&GenerationRequest::new("openai", "hi"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WeftError::quota_exceeded("openai", "Quota exceeded: You exceeded your current quota.")
    );
}

#[tokio::test]
async fn rate_limit_returns_after_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(api_error(
            "Rate limit reached for requests.",
            "requests",
            "rate_limit_exceeded",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::builder()
        .api_key("sk-test")
        .api_base(server.uri())
        .timeouts(Duration::from_secs(30), Duration::from_secs(5))
        .build()
        .unwrap();
    let err = provider
        .generate(&GenerationRequest::new("openai", "hi"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WeftError::rate_limit("openai", "Rate limit exceeded: Rate limit reached for requests.")
    );
}

#[tokio::test]
async fn server_error_returns_after_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(api_error(
            "The server had an error while processing your request.",
            "server_error",
            "server_error",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate(&GenerationRequest::new("openai", "hi"))
        .await
        .unwrap_err();
    match err {
        WeftError::Provider { provider, message, .. } => {
            assert_eq!(provider, "openai");
            assert!(message.starts_with("Generation failed: "), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn api_rejection_keeps_error_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(api_error(
            "The model does not exist.",
            "invalid_request_error",
            "model_not_found",
        )))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate(&GenerationRequest::new("openai", "hi"))
        .await
        .unwrap_err();
    match err {
        WeftError::Provider {
            provider,
            message,
            code,
        } => {
            assert_eq!(provider, "openai");
            assert_eq!(message, "Generation failed: The model does not exist.");
            assert_eq!(code.as_deref(), Some("model_not_found"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn invalid_requests_never_reach_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("never"))))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider(&server);
    for req in [
        GenerationRequest::new("openai", " \n"),
        GenerationRequest::new("openai", "hi").with_temperature(2.1),
        GenerationRequest::new("openai", "hi").with_max_tokens(0),
    ] {
        let err = provider.generate(&req).await.unwrap_err();
        assert!(matches!(err, WeftError::InvalidRequest(_)), "{:?}", err);
    }
}

#[tokio::test]
async fn streamed_reply_is_aggregated() {
    let server = MockServer::start().await;
    let chunk = |content: &str, finish: serde_json::Value| {
        json!({
            "id": "chatcmpl-s1",
            "object": "chat.completion.chunk",
            "created": 1700000000,
            "model": "gpt-3.5-turbo-0125",
            "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": finish }]
        })
    };
    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
        chunk("Hel", json!(null)),
        chunk("lo", json!("stop"))
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let resp = provider(&server)
        .generate(&GenerationRequest::new("openai", "hi").with_stream(true))
        .await
        .unwrap();

    assert_eq!(resp.text, "Hello");
    assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    assert_eq!(resp.metadata["object"], "chat.completion.chunk");
    assert!(resp.usage.is_none());
}

#[tokio::test]
async fn health_check_reports_probe_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-3.5-turbo", "max_tokens": 10 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("Hello!"))))
        .mount(&server)
        .await;
    assert!(provider(&server).health_check().await);

    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(api_error(
            "Incorrect API key provided.",
            "invalid_request_error",
            "invalid_api_key",
        )))
        .mount(&failing)
        .await;
    assert!(!provider(&failing).health_check().await);
}

#[test]
fn builder_requires_api_key() {
    let err = OpenAiProvider::builder().build().unwrap_err();
    assert!(matches!(err, WeftError::Configuration(_)));
}
