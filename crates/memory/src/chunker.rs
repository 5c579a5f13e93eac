//! Token-window chunking of extracted page text.

use std::sync::Arc;

use crate::{
    error::{MemoryError, Result},
    tokenizer::Tokenizer,
};

/// Splits text into overlapping windows of at most `chunk_size` tokens.
#[derive(Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(MemoryError::Config(format!(
                "invalid chunk window: size {chunk_size}, overlap {chunk_overlap}"
            )));
        }
        Ok(Self {
            tokenizer,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Chunk `text`. Text of at most `chunk_size` tokens comes back unchanged
    /// as a single chunk; longer text is cut into windows advancing by
    /// `chunk_size - chunk_overlap` tokens, the last of which may be shorter.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let spans = self
            .tokenizer
            .token_spans(text)
            .map_err(|e| MemoryError::Tokenizer(e.to_string()))?;
        if spans.is_empty() {
            return Ok(Vec::new());
        }
        if spans.len() <= self.chunk_size {
            return Ok(vec![text.to_string()]);
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(spans.len());
            let from = spans[start].start;
            let to = spans[end - 1].end;
            chunks.push(text[from..to].to_string());
            if start + self.chunk_size >= spans.len() {
                break;
            }
            start += self.stride();
        }
        Ok(chunks)
    }
}
