use bandwise_core::domain::StateError;
use std::path::PathBuf;
use thiserror::Error;

/// Persistence failure for any file the runner reads or writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: malformed JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("state on disk is version {found}, expected {expected}; another run saved in between")]
    StaleVersion { expected: u64, found: u64 },

    #[error("invalid portfolio state: {0}")]
    InvalidState(#[from] StateError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}
