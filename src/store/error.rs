//! Store error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid client name: {0:?}")]
    InvalidName(String),

    #[error("Client already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> Self + '_ {
        move |source| Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for errors that mean "the document on disk is not usable".
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Json { .. })
    }

    /// True when the file is not JSON at all: a syntax error or a
    /// truncated or empty document. Well-formed JSON of an unexpected
    /// shape is not a syntax error.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Json { source, .. } if source.is_syntax() || source.is_eof())
    }
}
