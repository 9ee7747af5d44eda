use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Filename suffixes (without the dot) that may belong to the dependency graph.
///
/// Stored in configuration order; that order is also the order in which the
/// resolver tries candidate files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowedExtensions(Vec<String>);

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

impl AllowedExtensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.');
            if !ext.is_empty() && !list.iter().any(|e| e == ext) {
                list.push(ext.to_string());
            }
        }
        Self(list)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.0.iter().any(|e| e == ext)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Filter used by the structural watch.
    ///
    /// Paths without any extension pass (directories, possibly already
    /// deleted, cannot be told apart from extensionless files).
    pub fn admits(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.contains(ext),
            None => true,
        }
    }

    /// Strip a trailing allowed extension from an import target.
    pub fn strip<'a>(&self, target: &'a str) -> &'a str {
        for ext in &self.0 {
            if let Some(stripped) = target.strip_suffix(ext.as_str()) {
                if let Some(stem) = stripped.strip_suffix('.') {
                    return stem;
                }
            }
        }
        target
    }
}

impl Default for AllowedExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

/// Set of absolute file paths that make up the dependency graph.
///
/// Ordered so that iteration and diffs are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet(BTreeSet<PathBuf>);

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf) -> bool {
        self.0.insert(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn to_vec(&self) -> Vec<PathBuf> {
        self.0.iter().cloned().collect()
    }

    /// Comma separated listing for log lines.
    pub fn display(&self) -> String {
        join_paths(self.0.iter())
    }
}

impl FromIterator<PathBuf> for WatchSet {
    fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a WatchSet {
    type Item = &'a PathBuf;
    type IntoIter = std::collections::btree_set::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Paths that entered and left the graph between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl WatchDiff {
    /// Compute `new \ old` and `old \ new`. Both lists come out sorted.
    pub fn between(old: &WatchSet, new: &WatchSet) -> Self {
        Self {
            added: new.0.difference(&old.0).cloned().collect(),
            removed: old.0.difference(&new.0).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub(crate) fn join_paths<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> String {
    paths
        .into_iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
