use super::*;
use crate::test_support::{
    config_for, match_json, mount_embed, mount_existing_index, mount_stats, mount_upsert,
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    ollama: MockServer,
    data: MockServer,
    indexer: DocumentIndexer,
    temp_dir: TempDir,
    control: MockServer,
}

async fn fixture() -> Fixture {
    let ollama = MockServer::start().await;
    let control = MockServer::start().await;
    let data = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create TempDir successfully");

    mount_embed(&ollama).await;
    mount_existing_index(&control, &data).await;
    mount_stats(&data, 0).await;
    mount_upsert(&data).await;

    let config = config_for(&ollama, Some(&control), temp_dir.path());
    let embedder = Arc::new(Embedder::load(&config).expect("embedder loads"));
    let store = VectorStore::new(&config).expect("store builds");

    Fixture {
        ollama,
        data,
        indexer: DocumentIndexer::from_parts(&config, embedder, store),
        temp_dir,
        control,
    }
}

fn write_raw(fixture: &Fixture, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(fixture.indexer.raw_dir()).expect("raw dir");
    let path = fixture.indexer.raw_dir().join(name);
    fs::write(&path, content).expect("write raw file");
    path
}

async fn upserted_sources(data: &MockServer) -> Vec<String> {
    let requests = data.received_requests().await.unwrap_or_default();
    requests
        .iter()
        .filter(|r| r.url.path() == "/vectors/upsert")
        .flat_map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap_or(Value::Null);
            body["vectors"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|v| v["metadata"]["source"].as_str().unwrap_or_default().to_string())
        })
        .collect()
}

#[tokio::test]
async fn process_files_tolerates_missing_and_empty() {
    let fixture = fixture().await;
    let good = write_raw(&fixture, "handbook.txt", "Employees get fifteen days of leave.");
    let blank = write_raw(&fixture, "blank.md", "   \n\n  ");
    let missing = fixture.indexer.raw_dir().join("missing.txt");

    let report = fixture
        .indexer
        .process_files(&[good, blank.clone(), missing.clone()])
        .expect("ingest succeeds");

    assert_eq!(report.processed, vec!["handbook.txt".to_string()]);
    assert_eq!(report.skipped, vec![blank, missing]);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.upserted, 1);
    assert_eq!(report.message(), "Successfully processed 1 chunks");
    assert_eq!(upserted_sources(&fixture.data).await, vec!["handbook.txt"]);
}

#[tokio::test]
async fn nothing_extracted_is_an_error() {
    let fixture = fixture().await;
    let blank = write_raw(&fixture, "blank.txt", "");

    let result = fixture.indexer.process_files(&[blank]);
    assert!(matches!(result, Err(RagError::Document(ref msg)) if msg.contains("No text could be extracted")));

    let embeds = fixture
        .ollama
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/api/embed")
        .count();
    // only the dimension probe from Embedder::load
    assert_eq!(embeds, 1);
}

#[tokio::test]
async fn process_directory_writes_cache() {
    let fixture = fixture().await;
    write_raw(&fixture, "a.txt", "Alpha document body text.");
    write_raw(&fixture, "b.md", "# Beta\n\nBeta document body text.");
    write_raw(&fixture, "ignored.csv", "x,y\n1,2");

    let raw_dir = fixture.indexer.raw_dir().to_path_buf();
    let report = fixture
        .indexer
        .process_directory(&raw_dir)
        .expect("ingest succeeds");
    assert_eq!(report.processed, vec!["a.txt".to_string(), "b.md".to_string()]);

    let cached = fixture.indexer.cache().load().expect("cache loads");
    assert_eq!(cached.len(), report.chunks);
    assert!(cached.iter().any(|c| c.source == "b.md"));
}

#[tokio::test]
async fn empty_directory_is_an_error() {
    let fixture = fixture().await;
    let dir = fixture.temp_dir.path().join("nothing-here");
    assert!(matches!(
        fixture.indexer.process_directory(&dir),
        Err(RagError::Document(_))
    ));
}

#[tokio::test]
async fn store_text_saves_then_ingests() {
    let fixture = fixture().await;

    let (path, report) = fixture
        .indexer
        .store_text("Leave Policy: 2024", "Staff receive fifteen paid days off.")
        .expect("text stored");

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    assert!(name.starts_with("Leave Policy_ 2024_"));
    assert!(name.ends_with(".txt"));
    assert_eq!(
        fs::read_to_string(&path).expect("saved text"),
        "Staff receive fifteen paid days off."
    );
    assert_eq!(report.processed, vec![name.clone()]);
    assert_eq!(upserted_sources(&fixture.data).await, vec![name]);
}

#[tokio::test]
async fn store_text_validates_input() {
    let fixture = fixture().await;

    let missing_title = fixture.indexer.store_text("  ", "long enough content");
    assert!(matches!(missing_title, Err(RagError::Document(ref msg)) if msg.contains("title")));

    let too_short = fixture.indexer.store_text("Title", "   short   ");
    assert!(matches!(too_short, Err(RagError::Document(ref msg)) if msg.contains("at least 10")));

    assert!(!fixture.indexer.raw_dir().exists());
}

#[tokio::test]
async fn save_upload_strips_directories() {
    let fixture = fixture().await;

    let path = fixture
        .indexer
        .save_upload("../../etc/notes.md", b"# Notes")
        .expect("upload saved");
    assert_eq!(path, fixture.indexer.raw_dir().join("notes.md"));
    assert_eq!(fs::read(&path).expect("saved bytes"), b"# Notes");

    assert!(fixture.indexer.save_upload("payload.exe", b"MZ").is_err());
    assert!(fixture.indexer.save_upload("dir/", b"").is_err());
}

#[tokio::test]
async fn delete_document_removes_vectors_and_file() {
    let fixture = fixture().await;
    fixture.data.reset().await;
    mount_stats(&fixture.data, 2).await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                match_json("a_txt__chunk_0", 0.0, "a.txt", "a0"),
                match_json("b_txt__chunk_0", 0.0, "b.txt", "b0"),
            ]
        })))
        .mount(&fixture.data)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/delete"))
        .and(body_partial_json(json!({ "ids": ["a_txt__chunk_0"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&fixture.data)
        .await;

    let raw = write_raw(&fixture, "a.txt", "a0");
    let outcome = fixture
        .indexer
        .delete_document("a.txt")
        .expect("delete succeeds");

    assert!(outcome.is_deleted());
    assert!(!outcome.possibly_incomplete);
    assert!(!raw.exists());
}

#[tokio::test]
async fn delete_document_keeps_file_when_nothing_matches() {
    let fixture = fixture().await;
    fixture.data.reset().await;
    mount_stats(&fixture.data, 1).await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [match_json("b_txt__chunk_0", 0.0, "b.txt", "b0")]
        })))
        .mount(&fixture.data)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/delete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&fixture.data)
        .await;

    let raw = write_raw(&fixture, "a.txt", "a0");
    let outcome = fixture
        .indexer
        .delete_document("a.txt")
        .expect("delete succeeds");

    assert_eq!(outcome.found, 0);
    assert!(!outcome.is_deleted());
    assert!(raw.exists());
}

#[tokio::test]
async fn delete_document_never_creates_the_index() {
    let fixture = fixture().await;
    fixture.control.reset().await;
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "indexes": [] })))
        .mount(&fixture.control)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/test-index"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
        .mount(&fixture.control)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&fixture.control)
        .await;

    let raw = write_raw(&fixture, "a.txt", "a0");
    assert!(fixture.indexer.delete_document("a.txt").is_err());
    assert!(raw.exists());
}

#[test]
fn safe_title_replaces_punctuation() {
    assert_eq!(safe_title("Q3 report: draft/v2"), "Q3 report_ draft_v2");
    assert_eq!(safe_title("keep-this_one"), "keep-this_one");
    assert_eq!(safe_title("Résumé"), "Résumé");
}

#[test]
fn text_document_filename_uses_timestamp() {
    let at = NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(14, 5, 7))
        .expect("valid timestamp");
    assert_eq!(
        text_document_filename("On-call guide", at),
        "On-call guide_20240309_140507.txt"
    );
}

#[test]
fn upload_file_name_variants() {
    assert_eq!(upload_file_name("report.pdf").as_deref(), Some("report.pdf"));
    assert_eq!(
        upload_file_name("C:\\Users\\me\\report.docx").as_deref(),
        Some("report.docx")
    );
    assert_eq!(upload_file_name("a/b/c.txt").as_deref(), Some("c.txt"));
    assert_eq!(upload_file_name(".."), None);
    assert_eq!(upload_file_name(""), None);
}

#[test]
fn validate_text_counts_non_blank_chars() {
    assert!(validate_text_document("t", "0123456789").is_ok());
    assert!(validate_text_document("t", "   012345678   ").is_err());
}

#[test]
fn collect_documents_filters_and_sorts() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    for name in ["z.txt", "a.PDF", "notes.docx", "skip.json"] {
        fs::write(temp_dir.path().join(name), "x").expect("write");
    }
    fs::create_dir_all(temp_dir.path().join("nested.txt")).expect("dir");

    let names: Vec<String> = collect_documents(temp_dir.path())
        .expect("listing works")
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["a.PDF", "notes.docx", "z.txt"]);

    assert!(
        collect_documents(&temp_dir.path().join("absent"))
            .expect("missing dir is empty")
            .is_empty()
    );
}
