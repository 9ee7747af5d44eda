//! Error types for the watch engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::ResolutionError;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {}: {reason}", .path.display())]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Dependency graph resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Invalid watcher configuration: {reason}")]
    Config { reason: String },

    #[error("{adapter} event channel closed unexpectedly")]
    ChannelClosed { adapter: String },
}

impl WatchError {
    /// Whether this error came from the graph resolver.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    pub(crate) fn path_watch(path: &std::path::Path, err: notify::Error) -> Self {
        Self::PathWatchFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

pub type WatchResult<T> = Result<T, WatchError>;
