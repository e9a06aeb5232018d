use super::*;
use crate::documents::chunking::{ChunkingConfig, chunk_id, chunk_text};
use tempfile::TempDir;

fn sample_chunks() -> Vec<Chunk> {
    let config = ChunkingConfig {
        chunk_size: 40,
        chunk_overlap: 0,
    };
    let mut chunks = chunk_text(
        "Vacation policy. Employees accrue two days per month. Requests go to HR.",
        "policy.md",
        &config,
    );
    chunks.extend(chunk_text("Badge access is 24/7.", "security.txt", &config));
    chunks
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let cache = ChunkCache::new(temp_dir.path().join("processed").join("chunks.json"));
    let chunks = sample_chunks();

    cache.save(&chunks).expect("should save chunks");
    assert!(cache.path().exists());

    let loaded = cache.load().expect("should load chunks");
    assert_eq!(loaded, chunks);
}

#[test]
fn cache_is_readable_json() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let cache = ChunkCache::new(temp_dir.path().join("chunks.json"));
    cache.save(&sample_chunks()).expect("should save chunks");

    let raw = std::fs::read_to_string(cache.path()).expect("should read cache file");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("cache is valid json");
    let first = value
        .as_array()
        .and_then(|items| items.first())
        .expect("cache has entries");
    assert_eq!(first["source"], "policy.md");
    assert_eq!(first["chunk_id"], chunk_id("policy.md", 0).as_str());
    assert_eq!(first["chunk_index"], 0);
}

#[test]
fn missing_cache_loads_empty() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let cache = ChunkCache::new(temp_dir.path().join("absent.json"));
    assert!(cache.load().expect("missing cache is not an error").is_empty());
}

#[test]
fn corrupt_cache_is_an_error() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let path = temp_dir.path().join("chunks.json");
    std::fs::write(&path, "{not json").expect("should write file");
    assert!(ChunkCache::new(path).load().is_err());
}

#[test]
fn stats_summarize_chunks() {
    let chunks = vec![
        Chunk {
            text: "abcd".to_string(),
            source: "b.txt".to_string(),
            chunk_id: "b_txt__chunk_0".to_string(),
            chunk_index: 0,
            total_chunks: 2,
        },
        Chunk {
            text: "ab".to_string(),
            source: "b.txt".to_string(),
            chunk_id: "b_txt__chunk_1".to_string(),
            chunk_index: 1,
            total_chunks: 2,
        },
        Chunk {
            text: "abcdef".to_string(),
            source: "a.txt".to_string(),
            chunk_id: "a_txt__chunk_0".to_string(),
            chunk_index: 0,
            total_chunks: 1,
        },
    ];

    let stats = ChunkStats::from_chunks(&chunks).expect("non-empty chunks have stats");
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.total_sources, 2);
    assert_eq!(stats.sources, vec!["a.txt", "b.txt"]);
    assert_eq!(stats.min_chunk_length, 2);
    assert_eq!(stats.max_chunk_length, 6);
    assert!((stats.avg_chunk_length - 4.0).abs() < f64::EPSILON);
}

#[test]
fn stats_of_nothing() {
    assert!(ChunkStats::from_chunks(&[]).is_none());
}
