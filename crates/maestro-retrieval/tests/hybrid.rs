//! Hybrid engine tests against a mocked Qdrant + embeddings endpoint.

use std::sync::Arc;

use maestro_domain::config::{LlmConfig, LlmKind, RetrievalConfig};
use maestro_providers::{EmbeddingGateway, ProviderRegistry};
use maestro_retrieval::{RetrievalEngine, VectorStore};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIM: usize = 4;

async fn mock_backend() -> MockServer {
    let server = MockServer::start().await;

    // Embeddings (OpenAI-compatible contract).
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3, 0.4] }]
        })))
        .mount(&server)
        .await;

    // Collection description with a matching dimension.
    Mock::given(method("GET"))
        .and(path("/collections/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "config": { "params": { "vectors": { "size": DIM, "distance": "Cosine" } } } }
        })))
        .mount(&server)
        .await;

    // Vector candidates: a then b.
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                { "id": "a", "score": 0.92,
                  "payload": { "text": "서울 날씨 안내", "source": "docs/weather.md", "docset": "docs" } },
                { "id": "b", "score": 0.81,
                  "payload": { "text": "부산 일정 안내", "source": "docs/calendar.md", "docset": "docs" } }
            ]
        })))
        .mount(&server)
        .await;

    // Scroll feeds the BM25 rebuild: both points plus one more that only
    // the lexical side will surface.
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "points": [
                    { "id": "a", "payload": { "text": "서울 날씨 안내", "source": "docs/weather.md", "docset": "docs" } },
                    { "id": "b", "payload": { "text": "부산 일정 안내", "source": "docs/calendar.md", "docset": "docs" } },
                    { "id": "c", "payload": { "text": "서울 맛집 지도", "source": "docs/food.md", "docset": "docs" } }
                ],
                "next_page_offset": null
            }
        })))
        .mount(&server)
        .await;

    server
}

fn engine_for(server: &MockServer) -> RetrievalEngine {
    std::env::set_var("MAESTRO_TEST_OPENAI_KEY", "test-key");
    let llm = LlmConfig {
        kind: LlmKind::Openai,
        api_key_env: "MAESTRO_TEST_OPENAI_KEY".into(),
        base_url: server.uri(),
        ..LlmConfig::default()
    };
    let registry = Arc::new(ProviderRegistry::from_config(&llm));
    assert!(registry.is_enabled());

    let embedder = Arc::new(EmbeddingGateway::new(registry, DIM));
    let store = Arc::new(
        VectorStore::new(&server.uri(), "docs", DIM, embedder).unwrap(),
    );
    let cfg = RetrievalConfig {
        collection: "docs".into(),
        vector_dim: DIM,
        ..RetrievalConfig::default()
    };
    RetrievalEngine::new(store, &cfg)
}

#[tokio::test]
async fn hybrid_search_merges_vector_and_bm25() {
    let server = mock_backend().await;
    let engine = engine_for(&server);

    let hits = engine.search("서울 날씨", 3, None).await.unwrap();
    assert!(!hits.is_empty());

    // "a" matches both legs, so it must lead.
    assert_eq!(hits[0].id, "a");
    assert!(hits[0].vector_rank.is_some());
    assert!(hits[0].bm25_rank.is_some());

    // "c" is absent from the vector list but reachable via BM25.
    assert!(hits.iter().any(|h| h.id == "c" && h.vector_rank.is_none()));

    // Fused scores are sorted descending.
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn exact_filters_push_down_and_post_filters_apply() {
    let server = mock_backend().await;
    let engine = engine_for(&server);

    // A contains-filter survives only on matching payloads.
    let filters = json!({ "source__contains": "weather" });
    let hits = engine
        .search("서울", 3, filters.as_object())
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.id == "a"));
}

#[tokio::test]
async fn empty_store_yields_empty_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.0, 0.0, 0.0, 0.0] }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "config": { "params": { "vectors": { "size": DIM } } } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "points": [], "next_page_offset": null }
        })))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let hits = engine.search("아무거나", 5, None).await.unwrap();
    assert!(hits.is_empty());
}
