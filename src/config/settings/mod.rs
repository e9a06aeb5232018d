
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::documents::chunking::ChunkingConfig;

pub const CONFIG_DIR_ENV: &str = "DOCS_RAG_HOME";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const MAX_INDEX_NAME_LENGTH: usize = 45;
const MAX_SCAN_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub pinecone: PineconeConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Hosted vector index settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
    pub metric: String,
    pub controller_url: String,
    pub api_version: String,
    pub upsert_batch_size: usize,
    pub delete_batch_size: usize,
    /// Upper bound on vectors scanned when enumerating sources
    pub scan_limit: usize,
    pub readiness_delay_secs: u64,
    pub metadata_text_limit: usize,
    pub timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: "enterprise-jarvis".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            metric: "cosine".to_string(),
            controller_url: "https://api.pinecone.io".to_string(),
            api_version: "2024-07".to_string(),
            upsert_batch_size: 100,
            delete_batch_size: 100,
            scan_limit: MAX_SCAN_LIMIT,
            readiness_delay_secs: 5,
            metadata_text_limit: 1000,
            timeout_secs: 30,
        }
    }
}

/// Local Ollama runtime used for both embeddings and generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub batch_size: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "all-minilm".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 32,
        }
    }
}

/// Decoding parameters for answer generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen2.5:7b".to_string(),
            temperature: 0.3,
            max_tokens: 512,
            top_k: 40,
            top_p: 0.9,
            repeat_penalty: 1.1,
            timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    /// Defaults to `<config dir>/data` when unset
    pub data_dir: Option<PathBuf>,
    pub default_top_k: usize,
    pub default_user_name: String,
    /// Answers containing any of these (case-insensitive) are replaced by the not-found template
    pub not_found_phrases: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Enterprise JARVIS".to_string(),
            version: "1.0.0".to_string(),
            data_dir: None,
            default_top_k: 3,
            default_user_name: "there".to_string(),
            not_found_phrases: [
                "couldn't find",
                "don't have",
                "no information",
                "not found",
                "not available",
                "please upload",
            ]
            .iter()
            .map(|phrase| (*phrase).to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid {name}: {value} (must be between 1 and 1000)")]
    InvalidBatchSize { name: &'static str, value: usize },
    #[error("Invalid embedding dimension: {0} (must be between 1 and 20000)")]
    InvalidEmbeddingDimension(usize),
    #[error(
        "Invalid index name: {0:?} (lowercase letters, digits and '-' only, at most 45 characters)"
    )]
    InvalidIndexName(String),
    #[error("Invalid metric: {0} (must be 'cosine', 'euclidean' or 'dotproduct')")]
    InvalidMetric(String),
    #[error("Invalid scan limit: {0} (must be between 1 and 10000)")]
    InvalidScanLimit(usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid top_p: {0} (must be greater than 0.0 and at most 1.0)")]
    InvalidTopP(f32),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(u32),
    #[error("Invalid max tokens: {0} (must be at least 1)")]
    InvalidMaxTokens(u32),
    #[error("Invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid default top_k: {0} (must be between 1 and 100)")]
    InvalidDefaultTopK(usize),
    #[error("Not-found phrases cannot contain empty entries")]
    EmptyNotFoundPhrase,
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnvValue { key: String, value: String },
    #[error("PINECONE_API_KEY is not set")]
    MissingApiKey,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `config.toml` from `config_dir`, falling back to defaults when absent
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Load from the default config directory and apply environment overrides
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to resolve config directory")?;
        let mut config = Self::load(&config_dir)?;
        config
            .apply_env_overrides()
            .context("Invalid environment override")?;
        config
            .validate()
            .context("Configuration validation failed after environment overrides")?;

        if config.pinecone.api_key.trim().is_empty() {
            warn!("PINECONE_API_KEY not found in config or environment");
        }

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// `$DOCS_RAG_HOME`, or the platform config directory
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }

        dirs::config_dir()
            .map(|dir| dir.join("docs-rag"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn data_dir(&self) -> PathBuf {
        self.app
            .data_dir
            .clone()
            .unwrap_or_else(|| self.get_base_dir().join("data"))
    }

    /// Directory holding uploaded and pasted documents
    #[inline]
    pub fn raw_documents_dir(&self) -> PathBuf {
        self.data_dir().join("raw_documents")
    }

    #[inline]
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir().join("processed")
    }

    #[inline]
    pub fn chunk_cache_path(&self) -> PathBuf {
        self.processed_dir().join("chunks.json")
    }

    #[inline]
    pub fn ensure_data_dirs(&self) -> Result<()> {
        for dir in [self.raw_documents_dir(), self.processed_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        }
        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pinecone.validate()?;
        self.ollama.validate()?;
        self.llm.validate()?;
        self.validate_chunking_config()?;
        self.validate_app_config()?;

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_app_config(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.app.default_top_k) {
            return Err(ConfigError::InvalidDefaultTopK(self.app.default_top_k));
        }

        if self
            .app
            .not_found_phrases
            .iter()
            .any(|phrase| phrase.trim().is_empty())
        {
            return Err(ConfigError::EmptyNotFoundPhrase);
        }

        Ok(())
    }

    #[inline]
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to resolve environment variable names
    #[inline]
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("PINECONE_API_KEY") {
            self.pinecone.api_key = value;
        }
        if let Some(value) = get("PINECONE_ENVIRONMENT") {
            self.pinecone.region = value;
        }
        if let Some(value) = get("PINECONE_INDEX_NAME") {
            self.pinecone.index_name = value;
        }
        if let Some(value) = get("EMBEDDING_MODEL") {
            self.ollama.embedding_model = value;
        }
        if let Some(value) = get("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_env("CHUNK_SIZE", &value)?;
        }
        if let Some(value) = get("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_env("CHUNK_OVERLAP", &value)?;
        }
        if let Some(value) = get("LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = get("LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = get("LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_env("LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = get("APP_NAME") {
            self.app.name = value;
        }
        if let Some(value) = get("APP_VERSION") {
            self.app.version = value;
        }

        Ok(())
    }

    /// Returns the API key, or an error when none has been configured
    #[inline]
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        let key = self.pinecone.api_key.trim();
        if key.is_empty() {
            Err(ConfigError::MissingApiKey)
        } else {
            Ok(key)
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn validate_batch_size(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 || value > 1000 {
        return Err(ConfigError::InvalidBatchSize { name, value });
    }
    Ok(())
}

impl PineconeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_index_name(&self.index_name)?;

        if !matches!(self.metric.as_str(), "cosine" | "euclidean" | "dotproduct") {
            return Err(ConfigError::InvalidMetric(self.metric.clone()));
        }

        Url::parse(&self.controller_url)
            .map_err(|_| ConfigError::InvalidUrl(self.controller_url.clone()))?;

        validate_batch_size("upsert batch size", self.upsert_batch_size)?;
        validate_batch_size("delete batch size", self.delete_batch_size)?;

        if !(1..=MAX_SCAN_LIMIT).contains(&self.scan_limit) {
            return Err(ConfigError::InvalidScanLimit(self.scan_limit));
        }

        Ok(())
    }

    pub fn set_index_name(&mut self, index_name: String) -> Result<(), ConfigError> {
        validate_index_name(&index_name)?;
        self.index_name = index_name;
        Ok(())
    }

    pub fn set_region(&mut self, region: String) -> Result<(), ConfigError> {
        if region.trim().is_empty() {
            return Err(ConfigError::InvalidModel(region));
        }
        self.region = region;
        Ok(())
    }
}

fn validate_index_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_INDEX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIndexName(name.to_string()))
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if !(1..=20_000).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        validate_batch_size("embedding batch size", self.batch_size)?;

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<(), ConfigError> {
        validate_batch_size("embedding batch size", batch_size)?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ConfigError::InvalidTopP(self.top_p));
        }

        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }

        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature));
        }
        self.temperature = temperature;
        Ok(())
    }
}
