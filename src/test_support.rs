// Shared fixtures for unit tests that talk to mock Ollama and Pinecone servers

use serde_json::{Value, json};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::config::Config;

pub const TEST_DIMENSION: usize = 4;

/// Config pointing at the given mock servers, with delays and retries shortened
pub fn config_for(ollama: &MockServer, pinecone: Option<&MockServer>, base_dir: &Path) -> Config {
    let mut config = Config {
        base_dir: base_dir.to_path_buf(),
        ..Config::default()
    };

    let address = ollama.address();
    config.ollama.host = address.ip().to_string();
    config.ollama.port = address.port();
    config.ollama.embedding_dimension = TEST_DIMENSION;
    config.ollama.batch_size = 2;

    if let Some(pinecone) = pinecone {
        config.pinecone.controller_url = pinecone.uri();
    }
    config.pinecone.api_key = "test-key".to_string();
    config.pinecone.index_name = "test-index".to_string();
    config.pinecone.readiness_delay_secs = 0;
    config.llm.timeout_secs = 5;

    config
}

/// Deterministic embedding: text length followed by ones
pub fn fake_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![1.0; TEST_DIMENSION];
    if let Some(first) = vector.first_mut() {
        *first = text.chars().count() as f32;
    }
    vector
}

/// `/api/embed` answering one vector per input
pub async fn mount_embed(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(|request: &Request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let embeddings: Vec<Vec<f32>> = body["input"]
                .as_array()
                .map(|inputs| {
                    inputs
                        .iter()
                        .map(|text| fake_embedding(text.as_str().unwrap_or_default()))
                        .collect()
                })
                .unwrap_or_default();
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
        })
        .mount(server)
        .await;
}

pub async fn mount_tags(server: &MockServer, models: &[&str]) {
    let models: Vec<Value> = models.iter().map(|name| json!({ "name": name })).collect();
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
        .mount(server)
        .await;
}

/// Control plane reporting `test-index` as ready at `data_plane`
pub async fn mount_existing_index(control_plane: &MockServer, data_plane: &MockServer) {
    let description = json!({
        "name": "test-index",
        "dimension": TEST_DIMENSION,
        "metric": "cosine",
        "host": data_plane.uri(),
        "status": { "ready": true, "state": "Ready" }
    });

    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "indexes": [description.clone()] })),
        )
        .mount(control_plane)
        .await;

    Mock::given(method("GET"))
        .and(path("/indexes/test-index"))
        .respond_with(ResponseTemplate::new(200).set_body_json(description))
        .mount(control_plane)
        .await;
}

pub async fn mount_stats(data_plane: &MockServer, total: usize) {
    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dimension": TEST_DIMENSION,
            "totalVectorCount": total,
            "namespaces": {}
        })))
        .mount(data_plane)
        .await;
}

pub fn match_json(id: &str, score: f32, source: &str, text: &str) -> Value {
    json!({
        "id": id,
        "score": score,
        "metadata": { "text": text, "source": source, "chunk_index": 0 }
    })
}

/// `/vectors/upsert` acknowledging every vector it receives
pub async fn mount_upsert(data_plane: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(|request: &Request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let count = body["vectors"].as_array().map_or(0, Vec::len);
            ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": count }))
        })
        .mount(data_plane)
        .await;
}
