//! Vector memory: pages → extracted text → token windows → embeddings → exact
//! nearest-neighbor search with per-URL diversity, persisted to a data directory.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod embeddings_openai;
pub mod error;
pub mod extract;
pub mod index;
pub mod manager;
pub mod persist;
pub mod schema;
pub mod search;
pub mod store;
pub mod tokenizer;

pub use {
    config::MemoryConfig,
    embeddings::{EmbeddingAdapter, EmbeddingProvider},
    error::{MemoryError, Result},
    manager::{MemoryManager, MemoryStatus},
    schema::{ChunkRecord, MemoryStats, PageSubmission, SearchHit, SearchQuery},
    store::MemoryStore,
};
