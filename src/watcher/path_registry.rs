//! Tracked-file registry with reference-counted parent directories.
//!
//! The content watch subscribes to the directories that hold tracked files
//! rather than to the files themselves, so editors that save by replacing
//! the file keep being observed. A directory stays watched while at least
//! one tracked file lives in it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Registry of tracked files and the directories that must be watched.
#[derive(Debug, Default)]
pub struct DirectoryRegistry {
    /// Tracked files.
    files: HashSet<PathBuf>,
    /// Watched directories with the number of tracked files in each.
    dirs: HashMap<PathBuf, usize>,
}

impl DirectoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track files, returning directories that now need a watch.
    pub fn add_paths<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<PathBuf> {
        let mut new_dirs = Vec::new();

        for path in paths {
            if !self.files.insert(path.to_path_buf()) {
                continue;
            }
            let dir = parent_dir(path);
            let count = self.dirs.entry(dir.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                new_dirs.push(dir);
            }
        }

        new_dirs
    }

    /// Stop tracking files, returning directories no longer needed.
    pub fn remove_paths<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<PathBuf> {
        let mut released = Vec::new();

        for path in paths {
            if !self.files.remove(path) {
                continue;
            }
            let dir = parent_dir(path);
            if let Some(count) = self.dirs.get_mut(&dir) {
                *count -= 1;
                if *count == 0 {
                    self.dirs.remove(&dir);
                    released.push(dir);
                }
            }
        }

        released
    }

    /// Check if a file is tracked.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    /// Get count of tracked files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Get count of watched directories.
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Forget everything, returning the directories that were watched.
    pub fn clear(&mut self) -> Vec<PathBuf> {
        self.files.clear();
        self.dirs.drain().map(|(dir, _)| dir).collect()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_registry_basic() {
        let mut registry = DirectoryRegistry::new();

        let files = paths(&[
            "/project/styles/main.scss",
            "/project/styles/_base.scss",
            "/project/vendor/_grid.scss",
        ]);

        let mut new_dirs = registry.add_paths(files.iter().map(PathBuf::as_path));
        new_dirs.sort();

        // Should have 2 unique directories
        assert_eq!(
            new_dirs,
            paths(&["/project/styles", "/project/vendor"])
        );
        assert_eq!(registry.file_count(), 3);
        assert!(registry.contains(Path::new("/project/styles/main.scss")));
    }

    #[test]
    fn test_registry_duplicate_add() {
        let mut registry = DirectoryRegistry::new();
        let file = PathBuf::from("/project/main.scss");

        let first = registry.add_paths([file.as_path()]);
        let second = registry.add_paths([file.as_path()]);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(registry.file_count(), 1);

        // A single remove releases the directory
        let released = registry.remove_paths([file.as_path()]);
        assert_eq!(released, paths(&["/project"]));
    }

    #[test]
    fn test_directory_released_after_last_file() {
        let mut registry = DirectoryRegistry::new();
        let a = PathBuf::from("/project/styles/a.scss");
        let b = PathBuf::from("/project/styles/b.scss");
        registry.add_paths([a.as_path(), b.as_path()]);

        assert!(registry.remove_paths([a.as_path()]).is_empty());
        assert_eq!(registry.dir_count(), 1);

        let released = registry.remove_paths([b.as_path()]);
        assert_eq!(released, paths(&["/project/styles"]));
        assert_eq!(registry.dir_count(), 0);
    }

    #[test]
    fn test_remove_untracked_is_noop() {
        let mut registry = DirectoryRegistry::new();
        registry.add_paths([Path::new("/project/a.scss")]);

        assert!(registry.remove_paths([Path::new("/project/other.scss")]).is_empty());
        assert_eq!(registry.file_count(), 1);
        assert_eq!(registry.dir_count(), 1);
    }

    #[test]
    fn test_relative_file_uses_current_dir() {
        let mut registry = DirectoryRegistry::new();
        let dirs = registry.add_paths([Path::new("main.scss")]);
        assert_eq!(dirs, paths(&["."]));
    }

    #[test]
    fn test_clear_returns_watched_dirs() {
        let mut registry = DirectoryRegistry::new();
        registry.add_paths([Path::new("/a/x.scss"), Path::new("/b/y.scss")]);

        let mut dirs = registry.clear();
        dirs.sort();
        assert_eq!(dirs, paths(&["/a", "/b"]));
        assert_eq!(registry.file_count(), 0);
        assert_eq!(registry.dir_count(), 0);
    }
}
