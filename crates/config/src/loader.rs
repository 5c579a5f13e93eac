//! Locating, reading and validating the configuration file.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use {directories::ProjectDirs, tracing::info};

use crate::{env, schema::SaturnConfig};

const CONFIG_FILE: &str = "saturn.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "saturn", "saturn")
}

/// `<platform config dir>/saturn.toml`, if a home directory can be resolved.
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// `<platform data dir>/memory`, or `./data/memory` without a home directory.
pub fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("memory"))
        .unwrap_or_else(|| PathBuf::from("data").join("memory"))
}

/// Parse a config file. Environment overrides are not applied.
pub fn load_config(path: &Path) -> Result<SaturnConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the effective configuration: the explicit file if given (it must
/// exist), else the default file if present, else built-in defaults; then
/// environment overrides; then validation.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<SaturnConfig, ConfigError> {
    discover_and_load_with(explicit, config_path(), |name| std::env::var(name).ok())
}

pub(crate) fn discover_and_load_with(
    explicit: Option<&Path>,
    default_path: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SaturnConfig, ConfigError> {
    let mut config = match (explicit, default_path) {
        (Some(path), _) => {
            let config = load_config(path)?;
            info!(path = %path.display(), "loaded config");
            config
        },
        (None, Some(path)) if path.exists() => {
            let config = load_config(&path)?;
            info!(path = %path.display(), "loaded config");
            config
        },
        _ => {
            info!("no config file found, using defaults");
            SaturnConfig::default()
        },
    };
    env::apply_overrides(&mut config, lookup);
    validate(&config)?;
    Ok(config)
}

impl SaturnConfig {
    /// The configured data directory, or the platform default.
    pub fn data_dir(&self) -> PathBuf {
        self.memory
            .data_dir
            .clone()
            .unwrap_or_else(default_data_dir)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.bind {:?}: {e}", self.server.bind)))
    }
}

pub fn validate(config: &SaturnConfig) -> Result<(), ConfigError> {
    let memory = &config.memory;
    if memory.chunk_size == 0 {
        return Err(ConfigError::Invalid("memory.chunk_size must be positive".into()));
    }
    if memory.chunk_overlap >= memory.chunk_size {
        return Err(ConfigError::Invalid(format!(
            "memory.chunk_overlap ({}) must be smaller than memory.chunk_size ({})",
            memory.chunk_overlap, memory.chunk_size
        )));
    }
    if memory.candidate_multiplier == 0 {
        return Err(ConfigError::Invalid(
            "memory.candidate_multiplier must be positive".into(),
        ));
    }
    if memory.max_top_k == 0 {
        return Err(ConfigError::Invalid("memory.max_top_k must be positive".into()));
    }
    if config.embeddings.dimensions == 0 {
        return Err(ConfigError::Invalid(
            "embeddings.dimensions must be positive".into(),
        ));
    }
    config.bind_addr()?;
    Ok(())
}
