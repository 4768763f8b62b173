//! Adapter tests against a mocked OpenAI-compatible endpoint.

use maestro_domain::config::{LlmConfig, LlmKind};
use maestro_providers::{LlmProvider, OpenAiCompatProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> LlmConfig {
    std::env::set_var("MAESTRO_TEST_PROVIDER_KEY", "sk-test");
    LlmConfig {
        kind: LlmKind::Openai,
        api_key_env: "MAESTRO_TEST_PROVIDER_KEY".into(),
        base_url: server.uri(),
        ..LlmConfig::default()
    }
}

#[tokio::test]
async fn chat_sends_bearer_auth_and_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "안녕하세요" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::from_config(&config_for(&server)).unwrap();
    let answer = provider
        .chat(maestro_providers::ChatRequest::prompt("인사해줘"))
        .await
        .unwrap();
    assert_eq!(answer, "안녕하세요");
}

#[tokio::test]
async fn non_2xx_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::from_config(&config_for(&server)).unwrap();
    let err = provider
        .chat(maestro_providers::ChatRequest::prompt("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "provider_error");
}

#[tokio::test]
async fn embed_returns_one_vector_per_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 0, "embedding": [0.1, 0.2] },
                { "index": 1, "embedding": [0.3, 0.4] }
            ]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::from_config(&config_for(&server)).unwrap();
    let vectors = provider
        .embed(&["하나".to_string(), "둘".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], vec![0.1, 0.2]);
}

#[test]
fn missing_key_is_a_config_error() {
    std::env::remove_var("MAESTRO_TEST_MISSING_KEY");
    let cfg = LlmConfig {
        kind: LlmKind::Openai,
        api_key_env: "MAESTRO_TEST_MISSING_KEY".into(),
        ..LlmConfig::default()
    };
    let err = OpenAiCompatProvider::from_config(&cfg).unwrap_err();
    assert_eq!(err.kind(), "config");
}
