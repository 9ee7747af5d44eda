//! Error types for dependency graph resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from resolving the dependency graph of an entry file.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Entry file not found: {}", .path.display())]
    EntryNotFound { path: PathBuf },

    #[error("Entry path is not a file: {}", .path.display())]
    InvalidEntry { path: PathBuf },

    #[error("Cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resolver did not finish: {reason}")]
    Interrupted { reason: String },
}

pub type ResolutionResult<T> = Result<T, ResolutionError>;
