//! Retrieval-augmented generation core: chunking, embedding, ranking and
//! prompt assembly.

pub mod chunker;
pub mod embedding;
pub mod prompt;
pub mod retriever;

pub use chunker::chunk_text;
pub use embedding::{ensure_dimension, ApiEmbedder, ApiEmbedderConfig, Embedder};
pub use prompt::build_rag_prompt;
pub use retriever::{cosine_similarity, retrieve, ScoredChunk};

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("stored embedding is corrupt: {0} bytes is not a whole number of f32 values")]
    CorruptEmbedding(usize),
}
