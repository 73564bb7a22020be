//! Integration tests for the Cohere client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use student_counsellor::cohere::{CohereClient, GenerateRequest, TextGenerator};
use student_counsellor::config::{CohereConfig, GenerationConfig, RequestConfig};
use student_counsellor::error::LlmError;

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str) -> CohereClient {
    create_client_with_timeout(base_url, 5000)
}

fn create_client_with_timeout(base_url: &str, timeout_ms: u64) -> CohereClient {
    let config = CohereConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
    };

    CohereClient::new(&config, RequestConfig { timeout_ms }).expect("Failed to create client")
}

fn generations(texts: &[&str]) -> serde_json::Value {
    json!({
        "id": "gen-batch-1",
        "generations": texts
            .iter()
            .enumerate()
            .map(|(i, text)| json!({"id": format!("gen-{}", i), "text": text}))
            .collect::<Vec<_>>(),
        "prompt": "ignored"
    })
}

mod generate_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_generate_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(header("Content-Type", "application/json"))
            .and(header("Cohere-Version", "2022-12-06"))
            .respond_with(ResponseTemplate::new(200).set_body_json(generations(&["Hello there"])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.generate(GenerateRequest::new("Say hello")).await;

        assert!(result.is_ok(), "Generate should succeed: {:?}", result.err());
        let response = result.unwrap();
        assert_eq!(response.id.as_deref(), Some("gen-batch-1"));
        assert_eq!(response.first_text(), Some("Hello there"));
    }

    #[tokio::test]
    async fn test_request_body_carries_sampling_parameters() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(body_partial_json(json!({
                "model": "command",
                "prompt": "Analyze this",
                "max_tokens": 1500,
                "temperature": 0.7,
                "k": 0,
                "stop_sequences": [],
                "return_likelihoods": "NONE"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(generations(&["{}"])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let request = GenerateRequest::from_config("Analyze this", &GenerationConfig::default(), 1500);

        assert!(client.generate(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_complete_returns_first_candidate_only() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(generations(&["first", "second"])),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let text = client.complete(GenerateRequest::new("Hi")).await.unwrap();

        assert_eq!(text, "first");
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(generations(&["ok"])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&format!("{}/", mock_server.uri()));
        assert!(client.complete(GenerateRequest::new("Hi")).await.is_ok());
    }
}

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_api_error_carries_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "invalid api token"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.generate(GenerateRequest::new("Hi")).await;

        match result {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid api token"));
            }
            other => panic!("Expected Api error, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.complete(GenerateRequest::new("Hi")).await;

        assert!(matches!(result, Err(LlmError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_missing_generations_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.complete(GenerateRequest::new("Hi")).await;

        match result {
            Err(LlmError::InvalidResponse { message }) => {
                assert_eq!(message, "Response contained no generations");
            }
            other => panic!("Expected InvalidResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.generate(GenerateRequest::new("Hi")).await;

        assert!(matches!(result, Err(LlmError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(generations(&["late"]))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = create_client_with_timeout(&mock_server.uri(), 50);
        let result = client.generate(GenerateRequest::new("Hi")).await;

        assert!(
            matches!(result, Err(LlmError::Timeout { timeout_ms: 50 })),
            "Expected timeout error"
        );
    }
}
