//! Wiring from the file configuration to a ready `MemoryManager`.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    saturn_config::{EmbeddingsConfig, SaturnConfig},
    saturn_memory::{
        MemoryConfig, MemoryManager,
        embeddings_openai::OpenAiEmbeddingProvider,
        tokenizer::{Tokenizer, WhitespaceTokenizer},
    },
    secrecy::ExposeSecret,
    tracing::{info, warn},
};

pub fn memory_config(config: &SaturnConfig) -> MemoryConfig {
    let memory = &config.memory;
    MemoryConfig {
        data_dir: config.data_dir(),
        dimensions: config.embeddings.dimensions,
        chunk_size: memory.chunk_size,
        chunk_overlap: memory.chunk_overlap,
        min_content_chars: memory.min_content_chars,
        summary_chars: memory.summary_chars,
        candidate_multiplier: memory.candidate_multiplier,
        max_top_k: memory.max_top_k,
        query_instruction: config.embeddings.query_instruction.clone(),
    }
}

pub fn build_tokenizer(config: &EmbeddingsConfig) -> anyhow::Result<Arc<dyn Tokenizer>> {
    let Some(path) = &config.tokenizer_path else {
        warn!("no tokenizer configured, chunk windows count whitespace-separated words");
        return Ok(Arc::new(WhitespaceTokenizer));
    };
    load_hf_tokenizer(path)
}

#[cfg(feature = "hf-tokenizer")]
fn load_hf_tokenizer(path: &std::path::Path) -> anyhow::Result<Arc<dyn Tokenizer>> {
    let tokenizer = saturn_memory::tokenizer::HfTokenizer::from_file(path)?;
    info!(path = %path.display(), "loaded tokenizer");
    Ok(Arc::new(tokenizer))
}

#[cfg(not(feature = "hf-tokenizer"))]
fn load_hf_tokenizer(path: &std::path::Path) -> anyhow::Result<Arc<dyn Tokenizer>> {
    anyhow::bail!(
        "tokenizer {} configured but saturn was built without the hf-tokenizer feature",
        path.display()
    )
}

pub fn build_provider(config: &EmbeddingsConfig) -> anyhow::Result<OpenAiEmbeddingProvider> {
    let mut provider = OpenAiEmbeddingProvider::new()
        .with_base_url(config.base_url.clone())
        .with_model(config.model.clone(), config.dimensions)
        .with_timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .context("building embeddings HTTP client")?;
    if let Some(key) = &config.api_key {
        provider = provider.with_api_key(key.expose_secret().clone());
    }
    Ok(provider)
}

/// Build the manager and load the persisted store. The embedding model is
/// not contacted until first use.
pub async fn build_manager(config: &SaturnConfig) -> anyhow::Result<MemoryManager> {
    let tokenizer = build_tokenizer(&config.embeddings)?;
    let provider = build_provider(&config.embeddings)?;
    let memory = memory_config(config);
    info!(
        data_dir = %memory.data_dir.display(),
        model = %config.embeddings.model,
        tokenizer = tokenizer.name(),
        "opening memory store"
    );
    MemoryManager::open(memory, Box::new(provider), tokenizer)
        .await
        .context("opening memory store")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn config_in(tmp: &TempDir) -> SaturnConfig {
        let mut config = SaturnConfig::default();
        config.memory.data_dir = Some(tmp.path().join("memory"));
        config
    }

    #[test]
    fn memory_config_follows_file_settings() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        config.memory.chunk_size = 128;
        config.memory.chunk_overlap = 16;
        config.embeddings.dimensions = 384;

        let memory = memory_config(&config);
        assert_eq!(memory.data_dir, tmp.path().join("memory"));
        assert_eq!(memory.chunk_size, 128);
        assert_eq!(memory.chunk_overlap, 16);
        assert_eq!(memory.dimensions, 384);
        assert_eq!(memory.max_top_k, 100);
        memory.validate().unwrap();
    }

    #[test]
    fn whitespace_tokenizer_without_path() {
        let tokenizer = build_tokenizer(&EmbeddingsConfig::default()).unwrap();
        assert_eq!(tokenizer.name(), "whitespace");
    }

    #[test]
    fn missing_tokenizer_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let config = EmbeddingsConfig {
            tokenizer_path: Some(tmp.path().join("tokenizer.json")),
            ..Default::default()
        };
        assert!(build_tokenizer(&config).is_err());
    }

    #[tokio::test]
    async fn manager_opens_without_contacting_the_model() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let manager = build_manager(&config).await.unwrap();
        assert!(!manager.is_ready());
        assert_eq!(manager.model_name(), "BAAI/bge-base-en-v1.5");
        assert_eq!(manager.stats().await.total_chunks, 0);
    }
}
