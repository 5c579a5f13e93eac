//! Records stored by the memory engine and the shapes that flow in and out of it.

use serde::{Deserialize, Serialize};

/// One stored chunk of a page. Immutable once written.
///
/// The embedding lives as a row in the vector matrix, not in this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// `"{parent_id}_{chunk_index}"`.
    pub id: String,
    pub parent_id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub engagement_score: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl ChunkRecord {
    pub fn chunk_id(parent_id: &str, chunk_index: usize) -> String {
        format!("{parent_id}_{chunk_index}")
    }
}

/// A chunk returned by search, with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: ChunkRecord,
    pub similarity: f32,
}

/// A page submitted for memorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSubmission {
    pub url: String,
    pub title: String,
    /// Raw HTML, or already extracted text when `is_html` is false.
    pub content: String,
    #[serde(default = "default_true")]
    pub is_html: bool,
    #[serde(default = "default_engagement")]
    pub engagement_score: f32,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A semantic search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            min_score: 0.0,
        }
    }
}

/// Store-level counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Distinct page URLs.
    pub total_memories: usize,
    pub total_chunks: usize,
    /// Milliseconds since the epoch of the last load or mutation.
    pub last_update: Option<i64>,
}

fn default_true() -> bool {
    true
}

fn default_engagement() -> f32 {
    1.0
}

fn default_top_k() -> usize {
    10
}

/// Preview of `text`: at most `max_chars` characters, with `...` appended when cut.
pub fn summarize(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
