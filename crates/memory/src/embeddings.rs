//! Embedding providers and the adapter that gives them passage/query semantics.

use std::sync::atomic::{AtomicBool, Ordering};

use {
    async_trait::async_trait,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use crate::error::{MemoryError, Result};

/// A backend that turns text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Identity of the embedding space, recorded in each persisted snapshot.
    /// A store written under another key is not loaded.
    fn provider_key(&self) -> &str {
        self.model_name()
    }

    /// Load or probe the model. Called lazily before first use and again
    /// after a failure.
    async fn warm_up(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Wraps a provider with lazy loading, a readiness flag, dimension checks and
/// L2 normalization, and keeps passage and query encodings distinct.
pub struct EmbeddingAdapter {
    provider: Box<dyn EmbeddingProvider>,
    query_instruction: String,
    ready: AtomicBool,
    load_lock: Mutex<()>,
}

impl EmbeddingAdapter {
    pub fn new(
        provider: Box<dyn EmbeddingProvider>,
        query_instruction: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            query_instruction: query_instruction.into(),
            ready: AtomicBool::new(false),
            load_lock: Mutex::new(()),
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Load the model if it is not loaded yet. Concurrent callers wait for a
    /// single load attempt; a failed attempt leaves the adapter not ready so
    /// the next call tries again.
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        let _guard = self.load_lock.lock().await;
        if self.is_ready() {
            return Ok(());
        }
        info!(model = %self.provider.model_name(), "loading embedding model");
        match self.provider.warm_up().await {
            Ok(()) => {
                self.ready.store(true, Ordering::Release);
                info!(
                    model = %self.provider.model_name(),
                    dims = self.provider.dimensions(),
                    "embedding model ready"
                );
                Ok(())
            },
            Err(e) => {
                warn!(
                    model = %self.provider.model_name(),
                    error = %e,
                    "failed to load embedding model"
                );
                Err(MemoryError::ModelUnavailable(e.to_string()))
            },
        }
    }

    /// Embed stored text.
    pub async fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        self.ensure_ready().await?;
        let raw = self
            .provider
            .embed(text)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;
        self.finish(raw)
    }

    /// Embed several passages in one provider call.
    pub async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_ready().await?;
        let raw = self
            .provider
            .embed_batch(texts)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;
        if raw.len() != texts.len() {
            return Err(MemoryError::Embedding(format!(
                "provider returned {} embeddings for {} inputs",
                raw.len(),
                texts.len()
            )));
        }
        raw.into_iter().map(|v| self.finish(v)).collect()
    }

    /// Embed search text. The query instruction is prepended before encoding.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.ensure_ready().await?;
        let input = format!("{}{}", self.query_instruction, text);
        debug!(chars = input.len(), "embedding query");
        let raw = self
            .provider
            .embed(&input)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;
        self.finish(raw)
    }

    fn finish(&self, mut vector: Vec<f32>) -> Result<Vec<f32>> {
        let expected = self.provider.dimensions();
        if vector.len() != expected {
            return Err(MemoryError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        if !l2_normalize(&mut vector) {
            return Err(MemoryError::Embedding(
                "provider returned a zero or non-finite vector".into(),
            ));
        }
        Ok(vector)
    }
}

/// Scale `v` to unit length in place. Returns false for zero or non-finite input.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::{Arc, atomic::AtomicUsize},
    };

    /// Records every input it sees; fails warm-up a configurable number of times.
    struct RecordingProvider {
        seen: Seen,
        failures_left: AtomicUsize,
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(vec![3.0; self.dims])
        }

        fn model_name(&self) -> &str {
            "recording"
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        async fn warm_up(&self) -> anyhow::Result<()> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("model not downloaded yet");
            }
            Ok(())
        }
    }

    type Seen = Arc<std::sync::Mutex<Vec<String>>>;

    fn adapter(failures: usize, dims: usize) -> (EmbeddingAdapter, Seen) {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let provider = RecordingProvider {
            seen: Arc::clone(&seen),
            failures_left: AtomicUsize::new(failures),
            dims,
        };
        (EmbeddingAdapter::new(Box::new(provider), "Q: "), seen)
    }

    #[tokio::test]
    async fn query_gets_instruction_passage_does_not() {
        let (adapter, seen) = adapter(0, 4);
        adapter.embed_passage("hello").await.unwrap();
        adapter.embed_query("hello").await.unwrap();
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["hello".to_string(), "Q: hello".to_string()]);
    }

    #[tokio::test]
    async fn outputs_are_unit_length() {
        let (adapter, _) = adapter(0, 4);
        let v = adapter.embed_passage("x").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn failed_load_reports_unavailable_then_recovers() {
        let (adapter, _) = adapter(1, 4);
        assert!(!adapter.is_ready());
        let err = adapter.embed_query("x").await.unwrap_err();
        assert!(matches!(err, MemoryError::ModelUnavailable(_)));
        assert!(!adapter.is_ready());

        adapter.embed_query("x").await.unwrap();
        assert!(adapter.is_ready());
    }

    #[tokio::test]
    async fn batch_matches_single() {
        let (adapter, _) = adapter(0, 3);
        let batch = adapter
            .embed_passages(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], adapter.embed_passage("a").await.unwrap());
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let mut v = vec![0.0, 0.0];
        assert!(!l2_normalize(&mut v));
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert_eq!(v, vec![0.6, 0.8]);
    }
}
