
use anyhow::{Context, Result, anyhow, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const BACKOFF_START_MS: u64 = 1000;

const TAGS_PATH: &str = "/api/tags";
const EMBED_PATH: &str = "/api/embed";
const GENERATE_PATH: &str = "/api/generate";

/// Blocking client for a local Ollama server.
///
/// Embedding and generation share this type. Transient failures (5xx, dropped
/// connections, timeouts) are retried with doubling delays up to
/// `retry_attempts`; anything in the 4xx range fails on the first try.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Sampling parameters passed through to the model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// A locally pulled model as reported by `/api/tags`
#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Whether a listed model name refers to `wanted`, treating a missing tag as `:latest`
#[inline]
pub fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || listed.strip_suffix(":latest") == Some(wanted)
}

/// `Some(reason)` when the failure is worth another attempt
fn transient(error: &ureq::Error) -> Option<String> {
    match error {
        ureq::Error::StatusCode(status) if *status >= 500 => Some(format!("HTTP {status}")),
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => Some(error.to_string()),
        _ => None,
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

impl OllamaClient {
    /// Client for the configured embedding model
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Invalid Ollama host or port in config")?;

        Ok(Self {
            base_url,
            model: config.ollama.embedding_model.clone(),
            batch_size: config.ollama.batch_size,
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        model.clone_into(&mut self.model);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// At least one attempt is always made
    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Server reachable and the client's model pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.ping()
            .with_context(|| format!("Ollama is not reachable at {}", self.base_url))?;
        self.validate_model()?;

        info!("Ollama at {} is serving {}", self.base_url, self.model);
        Ok(())
    }

    #[inline]
    pub fn ping(&self) -> Result<()> {
        self.get::<TagsResponse>(TAGS_PATH).map(|_| ())
    }

    /// Fails with the list of pulled models when the client's model is missing
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models()?;
        if models.iter().any(|m| model_matches(&m.name, &self.model)) {
            return Ok(());
        }

        let pulled: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!("{} is not pulled, Ollama has {:?}", self.model, pulled);
        bail!(
            "Model '{}' is not available (try `ollama pull {}`). Pulled models: {:?}",
            self.model,
            self.model,
            pulled
        )
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let tags: TagsResponse = self.get(TAGS_PATH).context("Failed to list Ollama models")?;
        debug!("Ollama reports {} pulled models", tags.models.len());
        Ok(tags.models)
    }

    /// One vector per input text, in input order
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts with {}", texts.len(), self.model);
        let response: EmbedResponse = self
            .post(
                EMBED_PATH,
                &EmbedRequest {
                    model: &self.model,
                    input: texts,
                },
            )
            .context("Embedding request failed")?;

        if response.embeddings.len() != texts.len() {
            bail!(
                "Ollama returned {} embeddings for {} texts",
                response.embeddings.len(),
                texts.len()
            );
        }
        Ok(response.embeddings)
    }

    /// Non-streaming completion of `prompt` with the client's model
    #[inline]
    pub fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        debug!("Prompting {} with {} bytes", self.model, prompt.len());
        let response: GenerateResponse = self
            .post(
                GENERATE_PATH,
                &GenerateRequest {
                    model: &self.model,
                    prompt,
                    stream: false,
                    options,
                },
            )
            .context("Generation request failed")?;
        Ok(response.response)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path)?;
        let body = self.with_retry(path, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        serde_json::from_str(&body).with_context(|| format!("Unexpected response from {path}"))
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, payload: &B) -> Result<T> {
        let url = self.base_url.join(path)?;
        let json = serde_json::to_string(payload)?;
        let body = self.with_retry(path, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        serde_json::from_str(&body).with_context(|| format!("Unexpected response from {path}"))
    }

    fn with_retry<F>(&self, path: &str, mut send: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut delay = Duration::from_millis(BACKOFF_START_MS);
        let mut attempt = 1;
        loop {
            let error = match send() {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            let Some(reason) = transient(&error) else {
                return Err(match error {
                    ureq::Error::StatusCode(status) => anyhow!("Ollama {path} returned HTTP {status}"),
                    other => anyhow!("Ollama {path} failed: {other}"),
                });
            };

            if attempt >= self.retry_attempts {
                return Err(anyhow!(
                    "Ollama {path} failed after {attempt} attempts: {reason}"
                ));
            }

            warn!(
                "Ollama {} attempt {}/{} failed ({}), retrying in {:?}",
                path, attempt, self.retry_attempts, reason, delay
            );
            thread::sleep(delay);
            delay *= 2;
            attempt += 1;
        }
    }
}
