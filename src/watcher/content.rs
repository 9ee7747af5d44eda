//! Content watch over the files of the current dependency set.

use std::path::PathBuf;
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::adapter::{ContentEvent, ContentWatch};
use super::path_registry::DirectoryRegistry;
use super::WatchError;
use crate::types::WatchSet;

const DEFAULT_CAPACITY: usize = 256;

/// [`ContentWatch`] backed by non-recursive `notify` watches on the parent
/// directory of every tracked file.
///
/// Files may live anywhere, including outside the root directory (search
/// paths). Events for untracked siblings are dropped in the callback.
pub struct NotifyContentWatch {
    watcher: Option<RecommendedWatcher>,
    registry: Arc<RwLock<DirectoryRegistry>>,
    capacity: usize,
}

impl NotifyContentWatch {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            watcher: None,
            registry: Arc::new(RwLock::new(DirectoryRegistry::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of tracked files.
    pub fn tracked_count(&self) -> usize {
        self.registry.read().file_count()
    }

    /// Number of directories under watch.
    pub fn watched_dir_count(&self) -> usize {
        self.registry.read().dir_count()
    }

    fn subscribe(&mut self, paths: &[PathBuf]) -> Result<(), WatchError> {
        let Some(watcher) = self.watcher.as_mut() else {
            return Err(WatchError::InitFailed {
                reason: "content watch used before start".to_string(),
            });
        };

        let new_dirs = self
            .registry
            .write()
            .add_paths(paths.iter().map(PathBuf::as_path));

        let mut failures = Vec::new();
        for dir in new_dirs {
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => crate::debug_event!("content", "watching dir", "{}", dir.display()),
                Err(e) => failures.push((dir, e)),
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        // Untrack files whose directory could not be watched
        let mut registry = self.registry.write();
        for (dir, _) in &failures {
            let orphaned = paths
                .iter()
                .filter(|path| path.parent() == Some(dir.as_path()))
                .map(PathBuf::as_path);
            registry.remove_paths(orphaned);
        }
        drop(registry);

        let mut failures = failures.into_iter();
        let Some((first_dir, first_error)) = failures.next() else {
            return Ok(());
        };
        for (dir, e) in failures {
            tracing::warn!("[content] failed to watch {}: {e}", dir.display());
        }
        Err(WatchError::path_watch(&first_dir, first_error))
    }
}

impl Default for NotifyContentWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentWatch for NotifyContentWatch {
    fn start(&mut self, initial: &WatchSet) -> Result<mpsc::Receiver<ContentEvent>, WatchError> {
        self.stop();

        let (tx, rx) = mpsc::channel(self.capacity);
        let registry = Arc::clone(&self.registry);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("[content] file watch error: {e}");
                    return;
                }
            };

            let changed = tracked_changes(&event, &registry.read());
            for path in changed {
                match tx.try_send(ContentEvent::Changed(path)) {
                    Ok(()) => {}
                    // A full queue already guarantees an update
                    Err(TrySendError::Full(event)) => {
                        tracing::trace!("[content] queue full, dropped {event:?}");
                    }
                    Err(TrySendError::Closed(_)) => return,
                }
            }
        })?;
        self.watcher = Some(watcher);

        let initial = initial.to_vec();
        self.subscribe(&initial)?;
        Ok(rx)
    }

    fn add(&mut self, paths: &[PathBuf]) -> Result<(), WatchError> {
        if paths.is_empty() {
            return Ok(());
        }
        let result = self.subscribe(paths);
        crate::debug_event!(
            "content",
            "tracking",
            "{} files in {} dirs",
            self.tracked_count(),
            self.watched_dir_count()
        );
        result
    }

    fn remove(&mut self, paths: &[PathBuf]) -> Result<(), WatchError> {
        let released = self
            .registry
            .write()
            .remove_paths(paths.iter().map(PathBuf::as_path));

        if let Some(watcher) = self.watcher.as_mut() {
            for dir in released {
                // The directory may already be gone, which also ends the watch
                if let Err(e) = watcher.unwatch(&dir) {
                    tracing::debug!("[content] unwatch {} failed: {e}", dir.display());
                } else {
                    crate::debug_event!("content", "released dir", "{}", dir.display());
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        let dirs = self.registry.write().clear();
        if let Some(mut watcher) = self.watcher.take() {
            for dir in dirs {
                let _ = watcher.unwatch(&dir);
            }
        }
    }
}

/// Tracked paths touched by a raw notify event.
///
/// Writes, creations, removals and renames count; access and
/// metadata-only events do not.
pub(crate) fn tracked_changes(event: &Event, registry: &DirectoryRegistry) -> Vec<PathBuf> {
    if matches!(
        event.kind,
        EventKind::Access(_) | EventKind::Other | EventKind::Modify(ModifyKind::Metadata(_))
    ) {
        return Vec::new();
    }

    let mut changed: Vec<PathBuf> = event
        .paths
        .iter()
        .filter(|path| registry.contains(path))
        .cloned()
        .collect();
    changed.dedup();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    fn registry(files: &[&str]) -> DirectoryRegistry {
        let mut registry = DirectoryRegistry::new();
        registry.add_paths(files.iter().map(Path::new));
        registry
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_write_to_tracked_file() {
        let registry = registry(&["/p/a.scss"]);
        let changed = tracked_changes(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/p/a.scss"]),
            &registry,
        );
        assert_eq!(changed, vec![PathBuf::from("/p/a.scss")]);
    }

    #[test]
    fn test_untracked_sibling_ignored() {
        let registry = registry(&["/p/a.scss"]);
        let changed = tracked_changes(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/p/b.scss"]),
            &registry,
        );
        assert!(changed.is_empty());
    }

    #[test]
    fn test_replace_and_delete_count_as_changes() {
        let registry = registry(&["/p/a.scss"]);

        let created = tracked_changes(&event(EventKind::Create(CreateKind::File), &["/p/a.scss"]), &registry);
        assert_eq!(created.len(), 1);

        let removed = tracked_changes(&event(EventKind::Remove(RemoveKind::File), &["/p/a.scss"]), &registry);
        assert_eq!(removed.len(), 1);

        let renamed = tracked_changes(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/p/.a.scss.tmp", "/p/a.scss"],
            ),
            &registry,
        );
        assert_eq!(renamed, vec![PathBuf::from("/p/a.scss")]);
    }

    #[test]
    fn test_access_and_metadata_ignored() {
        let registry = registry(&["/p/a.scss"]);

        let access = tracked_changes(&event(EventKind::Access(AccessKind::Read), &["/p/a.scss"]), &registry);
        assert!(access.is_empty());

        let metadata = tracked_changes(
            &event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)), &["/p/a.scss"]),
            &registry,
        );
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_add_before_start_fails() {
        let mut watch = NotifyContentWatch::new();
        let result = watch.add(&[PathBuf::from("/p/a.scss")]);
        assert!(matches!(result, Err(WatchError::InitFailed { .. })));
        assert_eq!(watch.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_unwatchable_directory_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let good = temp.path().join("a.scss");
        std::fs::write(&good, "").unwrap();
        let missing = temp.path().join("missing").join("b.scss");

        let mut watch = NotifyContentWatch::new();
        let _rx = watch.start(&WatchSet::new()).unwrap();

        let result = watch.add(&[good.clone(), missing.clone()]);
        assert!(matches!(result, Err(WatchError::PathWatchFailed { .. })));

        // The watchable file is still subscribed
        assert_eq!(watch.tracked_count(), 1);
        assert_eq!(watch.watched_dir_count(), 1);

        watch.remove(&[good]).unwrap();
        assert_eq!(watch.watched_dir_count(), 0);
        watch.stop();
    }
}
