// Documents module
// Text extraction from uploaded files and splitting into embedding-sized chunks

pub mod cache;
pub mod chunking;
pub mod loader;

pub use cache::{ChunkCache, ChunkStats};
pub use chunking::{Chunk, ChunkingConfig, RecursiveSplitter, chunk_id, chunk_text};
pub use loader::{DocumentFormat, SUPPORTED_EXTENSIONS, is_supported, load_document};
