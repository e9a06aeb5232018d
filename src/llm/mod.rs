// Answer generation
// Grounded prompt construction, the Ollama generate call and response cleanup


use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::embeddings::{GenerateOptions, OllamaClient, model_matches};
use crate::{RagError, Result};

/// The exact reply the model is told to give when the documents lack an answer
pub const REFUSAL_MESSAGE: &str = "I couldn't find information about this in the uploaded documents. Please upload the relevant documents containing this information.";

/// Returned in place of an answer whenever generation fails
pub const APOLOGY_MESSAGE: &str = "I apologize, but I encountered an error while processing your question. Please try again.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
const ANSWER_CUE: &str = "ANSWER (based ONLY on the documents above):";

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: OllamaClient,
    options: GenerateOptions,
}

impl LlmClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let llm = &config.llm;
        let client = OllamaClient::new(config)?
            .with_model(&llm.model)
            .with_timeout(Duration::from_secs(llm.timeout_secs))
            .with_retry_attempts(1);

        info!("LLM client initialized (model: {})", llm.model);

        Ok(Self {
            client,
            options: GenerateOptions {
                temperature: llm.temperature,
                num_predict: llm.max_tokens,
                top_k: llm.top_k,
                top_p: llm.top_p,
                repeat_penalty: llm.repeat_penalty,
            },
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        self.client.model()
    }

    #[inline]
    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Answer `question` from `context`, degrading to a fixed apology on any failure
    #[inline]
    pub fn generate_response(&self, context: &[String], question: &str) -> String {
        match self.try_generate(context, question) {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error generating response: {}", e);
                APOLOGY_MESSAGE.to_string()
            }
        }
    }

    #[inline]
    pub fn try_generate(&self, context: &[String], question: &str) -> Result<String> {
        let prompt = build_prompt(context, question);
        debug!(
            "Generating answer from {} context blocks (prompt length: {})",
            context.len(),
            prompt.len()
        );

        let raw = self
            .client
            .generate(&prompt, &self.options)
            .map_err(|e| RagError::Llm(format!("{e:#}")))?;

        Ok(clean_response(&raw))
    }

    /// Names of the models installed in the local runtime
    #[inline]
    pub fn available_models(&self) -> Result<Vec<String>> {
        let models = self
            .client
            .list_models()
            .map_err(|e| RagError::Network(format!("Failed to list Ollama models: {e:#}")))?;
        Ok(models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured generation model is installed
    #[inline]
    pub fn check_model_availability(&self) -> bool {
        match self.available_models() {
            Ok(models) => {
                if models.iter().any(|name| model_matches(name, self.model())) {
                    info!("Model {} is available", self.model());
                    true
                } else {
                    warn!(
                        "Model {} not found. Available models: {:?}. Install it with `ollama pull {}`",
                        self.model(),
                        models,
                        self.model()
                    );
                    false
                }
            }
            Err(e) => {
                error!("Error checking Ollama: {}", e);
                false
            }
        }
    }
}

/// Build the document-grounded prompt for `question`
#[inline]
pub fn build_prompt(context: &[String], question: &str) -> String {
    let context_text = context
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[Document {}]\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    format!(
        "You are an intelligent enterprise AI assistant. Your task is to answer questions accurately based ONLY on the provided company documents.

CRITICAL INSTRUCTIONS:
1. Answer ONLY using information from the documents below - DO NOT use any external knowledge
2. If the information is NOT found in the documents, you MUST respond: \"{REFUSAL_MESSAGE}\"
3. NEVER make up or hallucinate information
4. Be specific and cite relevant details from the documents
5. Keep answers concise but complete
6. Use professional, clear language
7. If partially relevant information exists, provide what you can and indicate what's missing

COMPANY DOCUMENTS:
{context_text}

QUESTION: {question}

{ANSWER_CUE}"
    )
}

/// Strip echoed answer labels and collapse runs of blank lines
#[inline]
pub fn clean_response(response: &str) -> String {
    let mut cleaned = response.trim().to_string();

    for artifact in [ANSWER_CUE, "ANSWER:", "Answer:"] {
        cleaned = cleaned.replace(artifact, "").trim().to_string();
    }

    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }

    cleaned
}
