use std::path::PathBuf;

use crate::error::{MemoryError, Result};

/// Instruction prepended to queries for BGE-family retrieval models.
pub const DEFAULT_QUERY_INSTRUCTION: &str =
    "Represent this sentence for searching relevant passages: ";

/// Configuration for the memory subsystem.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Directory holding the persisted id list, metadata map and vector matrix.
    pub data_dir: PathBuf,
    /// Embedding dimension every stored vector must have.
    pub dimensions: usize,
    /// Window length in tokens.
    pub chunk_size: usize,
    /// Overlap between consecutive windows in tokens.
    pub chunk_overlap: usize,
    /// Extracted content shorter than this (in characters) is rejected.
    pub min_content_chars: usize,
    /// Length of the stored summary preview, in characters.
    pub summary_chars: usize,
    /// Search over-fetches `top_k * candidate_multiplier` rows before deduplicating by URL.
    pub candidate_multiplier: usize,
    /// Upper bound accepted for `top_k`.
    pub max_top_k: usize,
    /// Prefix for query-mode embeddings.
    pub query_instruction: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            dimensions: 768,
            chunk_size: 400,
            chunk_overlap: 80,
            min_content_chars: 50,
            summary_chars: 200,
            candidate_multiplier: 3,
            max_top_k: 100,
            query_instruction: DEFAULT_QUERY_INSTRUCTION.into(),
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(MemoryError::Config("dimensions must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(MemoryError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(MemoryError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.candidate_multiplier == 0 {
            return Err(MemoryError::Config(
                "candidate_multiplier must be positive".into(),
            ));
        }
        if self.max_top_k == 0 {
            return Err(MemoryError::Config("max_top_k must be positive".into()));
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MemoryConfig::default().validate().unwrap();
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = MemoryConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MemoryError::Config(_))));
    }
}
