//! The `saturn.toml` schema. Every field has a default, so an empty file (or
//! no file at all) is a valid configuration.

use std::path::PathBuf;

use {secrecy::Secret, serde::Deserialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaturnConfig {
    pub server: ServerConfig,
    pub memory: MemorySettings,
    pub embeddings: EmbeddingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// `host:port` the HTTP API listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7420".into(),
        }
    }
}

/// Store, chunking and search tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemorySettings {
    /// Where the store is persisted. Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_content_chars: usize,
    pub summary_chars: usize,
    pub candidate_multiplier: usize,
    pub max_top_k: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            chunk_size: 400,
            chunk_overlap: 80,
            min_content_chars: 50,
            summary_chars: 200,
            candidate_multiplier: 3,
            max_top_k: 100,
        }
    }
}

/// The OpenAI-compatible embeddings endpoint and model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingsConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub api_key: Option<Secret<String>>,
    pub query_instruction: String,
    /// HuggingFace `tokenizer.json` used for chunking. Whitespace tokens when unset.
    pub tokenizer_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            model: "BAAI/bge-base-en-v1.5".into(),
            dimensions: 768,
            api_key: None,
            query_instruction: "Represent this sentence for searching relevant passages: "
                .into(),
            tokenizer_path: None,
            timeout_secs: 30,
        }
    }
}
