//! Dependency graph resolution for stylesheet entry files.
//!
//! The watcher core only sees the [`GraphResolver`] trait: given an entry
//! file, its search paths and the allowed extensions, produce the full set
//! of files the entry transitively depends on. [`SassGraphResolver`] is the
//! bundled implementation that follows `@import`, `@use` and `@forward`.

mod error;
pub mod imports;
mod sass;

pub use error::{ResolutionError, ResolutionResult};
pub use sass::SassGraphResolver;

use std::path::{Component, Path, PathBuf};

use crate::types::{AllowedExtensions, WatchSet};

/// Inputs of a graph resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQuery {
    /// Absolute path of the root file of the graph.
    pub entry: PathBuf,
    /// Directories consulted, in order, when an import is not found next to
    /// the importing file.
    pub search_paths: Vec<PathBuf>,
    /// Suffixes eligible for graph membership.
    pub extensions: AllowedExtensions,
}

impl GraphQuery {
    /// Build a query, making every path absolute against the working directory.
    pub fn new(
        entry: impl AsRef<Path>,
        search_paths: impl IntoIterator<Item = PathBuf>,
        extensions: AllowedExtensions,
    ) -> Self {
        Self {
            entry: absolutize(entry.as_ref()),
            search_paths: search_paths.into_iter().map(|p| absolutize(&p)).collect(),
            extensions,
        }
    }
}

/// Computes the transitive dependency set of an entry file.
///
/// Implementations must be deterministic for a fixed on-disk state and must
/// include the entry itself in the result.
pub trait GraphResolver: Send + Sync {
    /// Resolver name for logging.
    fn name(&self) -> &str;

    /// Resolve the full set of files `query.entry` depends on.
    fn resolve(&self, query: &GraphQuery) -> ResolutionResult<WatchSet>;
}

/// Make `path` absolute against the current directory and normalise it.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        normalize(&cwd.join(path))
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem.
///
/// Notify reports paths by joining the watched directory with the entry name,
/// so tracked paths must be free of these components to compare equal.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
