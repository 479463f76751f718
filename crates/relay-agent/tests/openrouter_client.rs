//! OpenRouterClient against a mock HTTP server.

use std::time::Duration;

use relay_agent::{CompletionBackend, CompletionResult, Failure, ModelListResult, OpenRouterClient};
use relay_core::Turn;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenRouterClient {
    OpenRouterClient::new("sk-or-test".to_string(), Some(server.uri()))
        .with_timeouts(Duration::from_millis(300), Duration::from_millis(300))
}

#[tokio::test]
async fn completion_success_returns_reply_and_sends_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "gen-123",
            "model": "openai/gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "pong" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![Turn::user("hi"), Turn::assistant("hello")];
    let result = client(&server)
        .complete(&history, "ping", "openai/gpt-4o-mini")
        .await;

    assert_eq!(
        result,
        CompletionResult::Success {
            reply: "pong".to_string()
        }
    );

    let requests = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "openai/gpt-4o-mini");
    assert_eq!(body["max_tokens"], 1000);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"], "ping");
}

#[tokio::test]
async fn error_envelope_becomes_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": { "message": "Insufficient credits", "code": 402 }
        })))
        .mount(&server)
        .await;

    let result = client(&server).complete(&[], "ping", "any/model").await;

    assert_eq!(
        result,
        CompletionResult::Failure(Failure::new(402, "Insufficient credits"))
    );
}

#[tokio::test]
async fn malformed_success_body_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "unexpected": true
        })))
        .mount(&server)
        .await;

    let result = client(&server).complete(&[], "ping", "any/model").await;

    match result {
        CompletionResult::Failure(f) => assert_eq!(f.code, 500),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_service_times_out_with_408() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "choices": [{ "message": { "content": "too late" } }]
                }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let result = client(&server).complete(&[], "ping", "any/model").await;

    assert_eq!(result, CompletionResult::Failure(Failure::timeout()));
}

#[tokio::test]
async fn unreachable_service_is_a_500_failure() {
    // Port 1 is reserved (tcpmux) and refuses connections on test hosts.
    let client = OpenRouterClient::new(
        "sk-or-test".to_string(),
        Some("http://127.0.0.1:1".to_string()),
    );

    match client.complete(&[], "ping", "any/model").await {
        CompletionResult::Failure(f) => {
            assert_eq!(f.code, 500);
            assert!(f.message.starts_with("Request failed"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn model_listing_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "id": "openai/gpt-4o-mini", "name": "GPT-4o mini", "description": "Small and fast" },
                { "id": "meta-llama/llama-3-8b-instruct", "name": "Llama 3 8B" }
            ]
        })))
        .mount(&server)
        .await;

    match client(&server).list_models().await {
        ModelListResult::Success { models } => {
            assert_eq!(models.len(), 2);
            assert_eq!(models[0].id, "openai/gpt-4o-mini");
            assert_eq!(models[1].description, "");
        }
        other => panic!("expected models, got {other:?}"),
    }
}

#[tokio::test]
async fn model_listing_non_success_status_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    match client(&server).list_models().await {
        ModelListResult::Failure(f) => assert_eq!(f.code, 503),
        other => panic!("expected failure, got {other:?}"),
    }
}
