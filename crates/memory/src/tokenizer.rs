//! Tokenizers used by the chunker.
//!
//! A tokenizer reports the byte span of every token in its input. Chunk text is
//! cut from the original string along those spans, so decoding is exact and
//! chunk boundaries always fall on token boundaries.

use std::ops::Range;

/// Splits text into tokens, reporting each token's byte range in the input.
pub trait Tokenizer: Send + Sync {
    fn name(&self) -> &str;

    /// Byte ranges of the tokens of `text`, in order, without special tokens.
    fn token_spans(&self, text: &str) -> anyhow::Result<Vec<Range<usize>>>;

    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
        Ok(self.token_spans(text)?.len())
    }
}

/// Counts whitespace-separated words as tokens.
///
/// Used when no model tokenizer is configured, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn token_spans(&self, text: &str) -> anyhow::Result<Vec<Range<usize>>> {
        let mut spans = Vec::new();
        let mut start = None;
        for (idx, ch) in text.char_indices() {
            match (ch.is_whitespace(), start) {
                (true, Some(s)) => {
                    spans.push(s..idx);
                    start = None;
                },
                (false, None) => start = Some(idx),
                _ => {},
            }
        }
        if let Some(s) = start {
            spans.push(s..text.len());
        }
        Ok(spans)
    }
}

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenizer;

#[cfg(feature = "hf-tokenizer")]
mod hf {
    use std::{ops::Range, path::Path};

    use anyhow::Context;

    use super::Tokenizer;

    /// HuggingFace `tokenizer.json` tokenizer (e.g. the one shipped with bge-base-en-v1.5).
    pub struct HfTokenizer {
        inner: tokenizers::Tokenizer,
        name: String,
    }

    impl HfTokenizer {
        pub fn from_file(path: &Path) -> anyhow::Result<Self> {
            let inner = tokenizers::Tokenizer::from_file(path)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("loading tokenizer from {}", path.display()))?;
            Ok(Self {
                inner: untruncated(inner)?,
                name: path.display().to_string(),
            })
        }

        pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
            let inner = tokenizers::Tokenizer::from_bytes(bytes)
                .map_err(|e| anyhow::anyhow!("parsing tokenizer json: {e}"))?;
            Ok(Self {
                inner: untruncated(inner)?,
                name: "inline".into(),
            })
        }
    }

    /// Model exports often ship with `truncation` (e.g. 512 tokens) and
    /// `padding` set. The chunker needs every token of the page, so both are
    /// switched off.
    fn untruncated(mut inner: tokenizers::Tokenizer) -> anyhow::Result<tokenizers::Tokenizer> {
        inner
            .with_truncation(None)
            .map_err(|e| anyhow::anyhow!("disabling truncation: {e}"))?;
        inner.with_padding(None);
        Ok(inner)
    }

    /// Byte ranges from encoder offsets. Zero-width spans belong to tokens
    /// with no surface form and carry nothing to slice.
    pub(super) fn byte_spans(offsets: &[(usize, usize)]) -> Vec<Range<usize>> {
        offsets
            .iter()
            .filter(|(start, end)| end > start)
            .map(|&(start, end)| start..end)
            .collect()
    }

    impl Tokenizer for HfTokenizer {
        fn name(&self) -> &str {
            &self.name
        }

        fn token_spans(&self, text: &str) -> anyhow::Result<Vec<Range<usize>>> {
            let encoding = self
                .inner
                .encode(text, false)
                .map_err(|e| anyhow::anyhow!("encoding text: {e}"))?;
            // `encode` reports byte offsets into `text`.
            Ok(byte_spans(encoding.get_offsets()))
        }
    }
}
