use std::path::PathBuf;

/// Errors surfaced by the memory subsystem.
///
/// Validation and not-found errors are local to a request. Model-unavailable
/// is recoverable: the adapter retries loading on its next use. Persistence
/// errors on write reach the caller; on load they degrade to an empty store.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("{0}")]
    Validation(String),

    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("memory not found: {0}")]
    NotFound(String),

    #[error("persistence error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt persisted state: {0}")]
    Corrupt(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MemoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = MemoryError> = std::result::Result<T, E>;
