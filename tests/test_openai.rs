//! Integration tests for the OpenAI provider
//!
//! Tests behavioral contracts against a mock server:
//! - request/response handling
//! - error classification (auth, rate limits, server errors)
//! - retry on transient failures
//! - structured output requests

use notion_taskrunner::handlers::research::QueryPlan;
use notion_taskrunner::handlers::research::schema::response_format;
use notion_taskrunner::llm::provider::{CompletionRequest, FinishReason, LlmError, LlmProvider, Message};
use notion_taskrunner::llm::providers::openai::{OpenAiConfig, OpenAiProvider};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> OpenAiConfig {
    OpenAiConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn test_request() -> CompletionRequest {
    CompletionRequest::new(
        "gpt-4o-mini",
        vec![Message::system("You are terse."), Message::user("Hello")],
    )
    .with_temperature(Some(0.2))
    .with_max_tokens(Some(100))
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 15, "total_tokens": 25}
    })
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 100,
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  Hi.  ")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(test_config(&server.uri())).unwrap();
    let response = provider.complete(test_request()).await.unwrap();

    assert_eq!(response.model, "gpt-4o-mini");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.total_tokens, 25);
    assert_eq!(response.text().unwrap(), "Hi.");
}

#[tokio::test]
async fn test_structured_output_request_carries_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "query_plan"}
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body(r#"{"queries": ["a"]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(test_config(&server.uri())).unwrap();
    let request = test_request().with_response_format(response_format::<QueryPlan>("query_plan"));

    let response = provider.complete(request).await.unwrap();
    assert_eq!(response.text().unwrap(), r#"{"queries": ["a"]}"#);
}

#[tokio::test]
async fn test_authentication_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(test_config(&server.uri())).unwrap();
    let result = provider.complete(test_request()).await;

    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Recovered")))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(test_config(&server.uri())).unwrap();
    let response = provider.complete(test_request()).await.unwrap();

    assert_eq!(response.text().unwrap(), "Recovered");
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(4)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(test_config(&server.uri())).unwrap();
    let result = provider.complete(test_request()).await;

    assert!(matches!(result, Err(LlmError::RateLimitExceeded(_))));
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": []
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(test_config(&server.uri())).unwrap();
    let result = provider.complete(test_request()).await;

    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_health_check_lists_models() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(test_config(&server.uri())).unwrap();
    provider.health_check().await.unwrap();
}
