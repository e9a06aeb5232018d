// Vector database module
// Pinecone control-plane and data-plane client plus the records stored in it

pub mod pinecone;

pub use pinecone::{
    DeleteOutcome, IndexDescription, IndexStats, SearchMatch, SourceListing, SourceSummary,
    VectorMetadata, VectorRecord, VectorStore,
};
