/// Memory manager: orchestrates extraction, chunking, embedding, storage and search.
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    chunker::Chunker,
    config::MemoryConfig,
    embeddings::{EmbeddingAdapter, EmbeddingProvider},
    error::{MemoryError, Result},
    extract::extract_text,
    schema::{
        ChunkRecord, MemoryStats, PageSubmission, SearchHit, SearchQuery, now_ms, summarize,
    },
    search::{diversify, filter_min_score},
    store::MemoryStore,
    tokenizer::Tokenizer,
};

pub struct MemoryManager {
    config: MemoryConfig,
    store: MemoryStore,
    embedder: EmbeddingAdapter,
    chunker: Chunker,
}

/// Status info about the memory system.
#[derive(Debug, Clone)]
pub struct MemoryStatus {
    pub total_memories: usize,
    pub total_chunks: usize,
    pub embedding_model: String,
    pub ai_ready: bool,
}

impl MemoryManager {
    pub fn new(
        config: MemoryConfig,
        store: MemoryStore,
        embedder: EmbeddingAdapter,
        chunker: Chunker,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != store.dimensions() {
            return Err(MemoryError::Config(format!(
                "embedding model {} produces {} dimensions but the store holds {}",
                embedder.model_name(),
                embedder.dimensions(),
                store.dimensions()
            )));
        }
        Ok(Self {
            config,
            store,
            embedder,
            chunker,
        })
    }

    /// Build every component from `config` and load the persisted store.
    pub async fn open(
        config: MemoryConfig,
        provider: Box<dyn EmbeddingProvider>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        config.validate()?;
        if provider.dimensions() != config.dimensions {
            return Err(MemoryError::Config(format!(
                "embedding model {} produces {} dimensions, configured {}",
                provider.model_name(),
                provider.dimensions(),
                config.dimensions
            )));
        }
        let chunker = Chunker::new(tokenizer, config.chunk_size, config.chunk_overlap)?;
        let model_key = provider.provider_key().to_string();
        let embedder = EmbeddingAdapter::new(provider, config.query_instruction.clone());
        let store = MemoryStore::open(&config.data_dir, config.dimensions, model_key).await;
        Self::new(config, store, embedder, chunker)
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Whether the embedding model is loaded. Never fails.
    pub fn is_ready(&self) -> bool {
        self.embedder.is_ready()
    }

    /// Load the embedding model now instead of on first use.
    pub async fn init(&self) -> Result<()> {
        self.embedder.ensure_ready().await
    }

    /// Memorize a page. Returns the record of its first chunk.
    ///
    /// All chunks are embedded before the store is touched, and they are
    /// appended as one batch, so a failure at any step leaves the store as it was.
    pub async fn ingest(&self, page: PageSubmission) -> Result<ChunkRecord> {
        if page.url.trim().is_empty() {
            return Err(MemoryError::validation("url must not be empty"));
        }
        let text = if page.is_html {
            extract_text(&page.content)
        } else {
            page.content
        };
        let chars = text.chars().count();
        if chars < self.config.min_content_chars {
            return Err(MemoryError::validation(format!(
                "content too short: {chars} characters, at least {} required",
                self.config.min_content_chars
            )));
        }

        let chunks = self.chunker.chunk(&text)?;
        if chunks.is_empty() {
            return Err(MemoryError::validation("content has no tokens"));
        }
        let vectors = self.embedder.embed_passages(&chunks).await?;

        let parent_id = uuid::Uuid::new_v4().to_string();
        let timestamp = page.timestamp.unwrap_or_else(now_ms);
        let total_chunks = chunks.len();
        let rows: Vec<(Vec<f32>, ChunkRecord)> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (content, vector))| {
                let record = ChunkRecord {
                    id: ChunkRecord::chunk_id(&parent_id, chunk_index),
                    parent_id: parent_id.clone(),
                    url: page.url.clone(),
                    title: page.title.clone(),
                    summary: summarize(&content, self.config.summary_chars),
                    content,
                    engagement_score: page.engagement_score,
                    timestamp,
                    chunk_index,
                    total_chunks,
                };
                (vector, record)
            })
            .collect();
        let first = rows
            .first()
            .map(|(_, record)| record.clone())
            .ok_or_else(|| MemoryError::validation("content has no tokens"))?;

        self.store.add_many(rows).await?;
        info!(
            url = %page.url,
            parent_id = %parent_id,
            chunks = total_chunks,
            "stored page"
        );
        Ok(first)
    }

    /// Semantic search with per-URL diversity.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        if query.query.trim().is_empty() {
            return Err(MemoryError::validation("query must not be empty"));
        }
        if query.top_k == 0 || query.top_k > self.config.max_top_k {
            return Err(MemoryError::validation(format!(
                "top_k must be between 1 and {}, got {}",
                self.config.max_top_k, query.top_k
            )));
        }
        if self.store.is_empty().await {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_query(&query.query).await?;
        let fetch = query.top_k.saturating_mul(self.config.candidate_multiplier);
        let candidates = self.store.search(&vector, fetch).await?;
        let fetched = candidates.len();
        let hits = diversify(filter_min_score(candidates, query.min_score), query.top_k);
        debug!(
            top_k = query.top_k,
            fetched,
            returned = hits.len(),
            "search complete"
        );
        Ok(hits)
    }

    pub async fn get(&self, id: &str) -> Result<ChunkRecord> {
        self.store.get(id).await
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Vec<ChunkRecord> {
        self.store.list(limit, offset).await
    }

    /// Forget the page `id` belongs to. Returns the number of chunks removed.
    pub async fn delete(&self, id: &str) -> Result<usize> {
        self.store.delete(id).await
    }

    pub async fn stats(&self) -> MemoryStats {
        self.store.stats().await
    }

    pub async fn status(&self) -> MemoryStatus {
        let stats = self.store.stats().await;
        MemoryStatus {
            total_memories: stats.total_memories,
            total_chunks: stats.total_chunks,
            embedding_model: self.embedder.model_name().to_string(),
            ai_ready: self.embedder.is_ready(),
        }
    }

    /// Persist the current state as a new generation. The gateway calls this
    /// after graceful shutdown.
    pub async fn save(&self) -> Result<()> {
        self.store.save().await
    }
}
