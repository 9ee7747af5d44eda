//! Adapter traits and raw event types for the two watch primitives.
//!
//! The controller never talks to `notify` directly. It drives a
//! [`StructuralWatch`] over the root directory and a [`ContentWatch`] over the
//! files of the current dependency set, and reads their events from the
//! channels returned by `start`.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use super::{WatchError, WatchResult};
use crate::types::{AllowedExtensions, WatchSet};

/// A path entering or leaving the root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralEvent {
    Added(PathBuf),
    Removed(PathBuf),
}

impl StructuralEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Added(path) => path,
            Self::Removed(path) => path,
        }
    }
}

/// A tracked file's content changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    Changed(PathBuf),
}

/// Coarse watch over a directory tree, filtered by extension.
pub trait StructuralWatch: Send {
    /// Adapter name for logging.
    fn name(&self) -> &str {
        "structural"
    }

    /// Begin watching `root`; events arrive on the returned channel.
    fn start(
        &mut self,
        root: &Path,
        extensions: &AllowedExtensions,
    ) -> Result<mpsc::Receiver<StructuralEvent>, WatchError>;

    /// Release the underlying watch. No events are sent afterwards.
    fn stop(&mut self);
}

/// Fine-grained watch over an explicit set of files.
pub trait ContentWatch: Send {
    /// Adapter name for logging.
    fn name(&self) -> &str {
        "content"
    }

    /// Begin watching `initial`; events arrive on the returned channel.
    fn start(&mut self, initial: &WatchSet) -> Result<mpsc::Receiver<ContentEvent>, WatchError>;

    /// Subscribe to additional files.
    ///
    /// Paths that cannot be watched are reported in the error; the others
    /// are still subscribed.
    fn add(&mut self, paths: &[PathBuf]) -> WatchResult<()>;

    /// Unsubscribe from files.
    fn remove(&mut self, paths: &[PathBuf]) -> WatchResult<()>;

    /// Release every subscription. No events are sent afterwards.
    fn stop(&mut self);
}
