//! Recursive root-directory watch reporting files entering or leaving the tree.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::adapter::{StructuralEvent, StructuralWatch};
use super::WatchError;
use crate::types::AllowedExtensions;

/// Default capacity of the structural event channel.
const DEFAULT_CAPACITY: usize = 256;

/// [`StructuralWatch`] backed by a recursive `notify` watcher.
///
/// Only creations, removals and renames are reported. Paths with an
/// extension outside the allowed set are dropped; extensionless paths
/// (directories) pass.
pub struct NotifyStructuralWatch {
    watcher: Option<RecommendedWatcher>,
    root: Option<PathBuf>,
    capacity: usize,
}

impl NotifyStructuralWatch {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            watcher: None,
            root: None,
            capacity: capacity.max(1),
        }
    }
}

impl Default for NotifyStructuralWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralWatch for NotifyStructuralWatch {
    fn start(
        &mut self,
        root: &Path,
        extensions: &AllowedExtensions,
    ) -> Result<mpsc::Receiver<StructuralEvent>, WatchError> {
        self.stop();

        let (tx, rx) = mpsc::channel(self.capacity);
        let filter = extensions.clone();
        let rescan_root = root.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("[structural] file watch error: {e}");
                    return;
                }
            };

            let changes = if event.need_rescan() {
                // Events were dropped; force a recomputation
                vec![StructuralEvent::Added(rescan_root.clone())]
            } else {
                classify(&event, &filter)
            };

            for change in changes {
                match tx.try_send(change) {
                    Ok(()) => {}
                    // Queued events already force a full recomputation
                    Err(TrySendError::Full(change)) => {
                        tracing::trace!("[structural] queue full, dropped {change:?}");
                    }
                    // Receiver dropped: controller has shut down
                    Err(TrySendError::Closed(_)) => return,
                }
            }
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::path_watch(root, e))?;

        crate::debug_event!("structural", "watching", "{}", root.display());

        self.watcher = Some(watcher);
        self.root = Some(root.to_path_buf());
        Ok(rx)
    }

    fn stop(&mut self) {
        if let (Some(mut watcher), Some(root)) = (self.watcher.take(), self.root.take()) {
            if let Err(e) = watcher.unwatch(&root) {
                tracing::debug!("[structural] unwatch {} failed: {e}", root.display());
            }
        }
    }
}

/// Turn a raw notify event into structural events that pass the filter.
pub(crate) fn classify(event: &Event, extensions: &AllowedExtensions) -> Vec<StructuralEvent> {
    let changes: Vec<StructuralEvent> = match event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .cloned()
            .map(StructuralEvent::Added)
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .cloned()
            .map(StructuralEvent::Removed)
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event
                .paths
                .iter()
                .cloned()
                .map(StructuralEvent::Removed)
                .collect(),
            RenameMode::To => event
                .paths
                .iter()
                .cloned()
                .map(StructuralEvent::Added)
                .collect(),
            RenameMode::Both if event.paths.len() == 2 => vec![
                StructuralEvent::Removed(event.paths[0].clone()),
                StructuralEvent::Added(event.paths[1].clone()),
            ],
            // Platform could not tell which side of the rename this is
            _ => event
                .paths
                .iter()
                .map(|path| {
                    if path.exists() {
                        StructuralEvent::Added(path.clone())
                    } else {
                        StructuralEvent::Removed(path.clone())
                    }
                })
                .collect(),
        },
        _ => Vec::new(),
    };

    changes
        .into_iter()
        .filter(|change| extensions.admits(change.path()))
        .collect()
}
