//! Configuration for the saturn memory service: TOML schema, file discovery,
//! environment overrides and validation.

pub mod env;
pub mod loader;
pub mod schema;

pub use {
    loader::{ConfigError, config_path, default_data_dir, discover_and_load, load_config},
    schema::{EmbeddingsConfig, MemorySettings, SaturnConfig, ServerConfig},
};
