// In-memory stand-ins for Ollama and Pinecone used by the end-to-end tests

#![allow(dead_code, reason = "each test binary uses a different subset")]

use docs_rag::config::Config;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const DIMENSION: usize = 4;
pub const INDEX: &str = "e2e-index";

/// Letter-frequency embedding so related texts land near each other
pub fn embed(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let count = |set: &str| lower.chars().filter(|c| set.contains(*c)).count() as f32;
    vec![count("aeiou"), count("lmnr"), count("stdk"), 1.0]
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

fn body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

/// Ollama answering embed requests and a fixed generate reply
pub struct FakeOllama {
    pub server: MockServer,
}

impl FakeOllama {
    pub async fn start(answer: &str) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(|request: &Request| {
                let embeddings: Vec<Vec<f32>> = body(request)["input"]
                    .as_array()
                    .map(|inputs| {
                        inputs
                            .iter()
                            .map(|t| embed(t.as_str().unwrap_or_default()))
                            .collect()
                    })
                    .unwrap_or_default();
                ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
            })
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "response": answer, "done": true })),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{ "name": "all-minilm:latest" }, { "name": "qwen2.5:7b" }]
            })))
            .mount(&server)
            .await;

        Self { server }
    }

    pub async fn generate_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/api/generate")
            .count()
    }
}

/// Pinecone control and data planes backed by an in-memory vector map
pub struct FakePinecone {
    pub control: MockServer,
    pub data: MockServer,
    vectors: Arc<Mutex<BTreeMap<String, Value>>>,
    created: Arc<AtomicBool>,
}

impl FakePinecone {
    pub async fn start() -> Self {
        let control = MockServer::start().await;
        let data = MockServer::start().await;
        let vectors: Arc<Mutex<BTreeMap<String, Value>>> = Arc::default();
        let created = Arc::new(AtomicBool::new(false));

        let description = json!({
            "name": INDEX,
            "dimension": DIMENSION,
            "metric": "cosine",
            "host": data.uri(),
            "status": { "ready": true, "state": "Ready" }
        });

        let listed = Arc::clone(&created);
        let listed_description = description.clone();
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(move |_: &Request| {
                let indexes = if listed.load(Ordering::SeqCst) {
                    vec![listed_description.clone()]
                } else {
                    Vec::new()
                };
                ResponseTemplate::new(200).set_body_json(json!({ "indexes": indexes }))
            })
            .mount(&control)
            .await;

        let creator = Arc::clone(&created);
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(move |_: &Request| {
                if creator.swap(true, Ordering::SeqCst) {
                    ResponseTemplate::new(409)
                } else {
                    ResponseTemplate::new(201)
                }
            })
            .mount(&control)
            .await;

        let describer = Arc::clone(&created);
        Mock::given(method("GET"))
            .and(path(format!("/indexes/{INDEX}")))
            .respond_with(move |_: &Request| {
                if describer.load(Ordering::SeqCst) {
                    ResponseTemplate::new(200).set_body_json(description.clone())
                } else {
                    ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" }))
                }
            })
            .mount(&control)
            .await;

        let store = Arc::clone(&vectors);
        Mock::given(method("POST"))
            .and(path("/describe_index_stats"))
            .respond_with(move |_: &Request| {
                let total = store.lock().unwrap_or_else(PoisonError::into_inner).len();
                ResponseTemplate::new(200).set_body_json(json!({
                    "dimension": DIMENSION,
                    "totalVectorCount": total
                }))
            })
            .mount(&data)
            .await;

        let store = Arc::clone(&vectors);
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(move |request: &Request| {
                let incoming = body(request)["vectors"].as_array().cloned().unwrap_or_default();
                let mut vectors = store.lock().unwrap_or_else(PoisonError::into_inner);
                for vector in &incoming {
                    if let Some(id) = vector["id"].as_str() {
                        vectors.insert(id.to_string(), vector.clone());
                    }
                }
                ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": incoming.len() }))
            })
            .mount(&data)
            .await;

        let store = Arc::clone(&vectors);
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(move |request: &Request| {
                let query = body(request);
                let top_k = query["topK"].as_u64().unwrap_or(10) as usize;
                let query_vector: Vec<f32> = query["vector"]
                    .as_array()
                    .map(|v| v.iter().filter_map(Value::as_f64).map(|x| x as f32).collect())
                    .unwrap_or_default();

                let vectors = store.lock().unwrap_or_else(PoisonError::into_inner);
                let mut matches: Vec<(f32, Value)> = vectors
                    .values()
                    .map(|v| {
                        let values: Vec<f32> = v["values"]
                            .as_array()
                            .map(|a| a.iter().filter_map(Value::as_f64).map(|x| x as f32).collect())
                            .unwrap_or_default();
                        let score = cosine(&query_vector, &values);
                        (score, json!({ "id": v["id"], "score": score, "metadata": v["metadata"] }))
                    })
                    .collect();
                matches.sort_by(|a, b| b.0.total_cmp(&a.0));
                let matches: Vec<Value> = matches.into_iter().take(top_k).map(|(_, m)| m).collect();

                ResponseTemplate::new(200).set_body_json(json!({ "matches": matches }))
            })
            .mount(&data)
            .await;

        let store = Arc::clone(&vectors);
        Mock::given(method("POST"))
            .and(path("/vectors/delete"))
            .respond_with(move |request: &Request| {
                let request = body(request);
                let mut vectors = store.lock().unwrap_or_else(PoisonError::into_inner);
                if request["deleteAll"].as_bool().unwrap_or(false) {
                    vectors.clear();
                } else if let Some(ids) = request["ids"].as_array() {
                    for id in ids.iter().filter_map(Value::as_str) {
                        vectors.remove(id);
                    }
                }
                ResponseTemplate::new(200).set_body_json(json!({}))
            })
            .mount(&data)
            .await;

        Self {
            control,
            data,
            vectors,
            created,
        }
    }

    pub fn vector_count(&self) -> usize {
        self.vectors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn sources(&self) -> Vec<String> {
        let vectors = self.vectors.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sources: Vec<String> = vectors
            .values()
            .filter_map(|v| v["metadata"]["source"].as_str().map(str::to_string))
            .collect();
        sources.dedup();
        sources
    }

    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }
}

/// Config wired to the fakes with delays removed
pub fn config(ollama: &FakeOllama, pinecone: &FakePinecone, base_dir: &Path) -> Config {
    let mut config = Config {
        base_dir: base_dir.to_path_buf(),
        ..Config::default()
    };

    let address = ollama.server.address();
    config.ollama.host = address.ip().to_string();
    config.ollama.port = address.port();
    config.ollama.embedding_dimension = DIMENSION;
    config.pinecone.controller_url = pinecone.control.uri();
    config.pinecone.api_key = "e2e-key".to_string();
    config.pinecone.index_name = INDEX.to_string();
    config.pinecone.readiness_delay_secs = 0;
    config.llm.timeout_secs = 5;
    config
}
