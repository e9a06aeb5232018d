// Embeddings module
// Ollama transport and the shared sentence embedder built on it

pub mod embedder;
pub mod ollama;

pub use embedder::{Embedder, cosine_similarity};
pub use ollama::{GenerateOptions, ModelInfo, OllamaClient, model_matches};
