use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by launch and wait. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The downloader could not be started (missing executable, permissions).
    #[error("Failed to spawn downloader {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A handle was passed to the wait of a different target.
    #[error("Download handle for {actual:?} cannot satisfy a wait on {expected:?}")]
    HandleMismatch { expected: PathBuf, actual: PathBuf },
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
