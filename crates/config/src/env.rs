//! Environment variable overrides, applied on top of the file configuration.

use std::path::PathBuf;

use {secrecy::Secret, tracing::debug};

use crate::schema::SaturnConfig;

pub const DATA_DIR: &str = "MEMORY_DATA_DIR";
pub const BIND: &str = "SATURN_BIND";
pub const EMBEDDINGS_URL: &str = "SATURN_EMBEDDINGS_URL";
pub const EMBEDDINGS_MODEL: &str = "SATURN_EMBEDDINGS_MODEL";
pub const EMBEDDINGS_API_KEY: &str = "SATURN_EMBEDDINGS_API_KEY";
pub const TOKENIZER_PATH: &str = "SATURN_TOKENIZER_PATH";

/// Apply overrides read through `lookup`. Empty values are ignored.
pub fn apply_overrides(config: &mut SaturnConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(dir) = get(DATA_DIR) {
        debug!(var = DATA_DIR, "overriding data_dir from environment");
        config.memory.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(bind) = get(BIND) {
        config.server.bind = bind;
    }
    if let Some(url) = get(EMBEDDINGS_URL) {
        config.embeddings.base_url = url;
    }
    if let Some(model) = get(EMBEDDINGS_MODEL) {
        config.embeddings.model = model;
    }
    if let Some(key) = get(EMBEDDINGS_API_KEY) {
        config.embeddings.api_key = Some(Secret::new(key));
    }
    if let Some(path) = get(TOKENIZER_PATH) {
        config.embeddings.tokenizer_path = Some(PathBuf::from(path));
    }
}
