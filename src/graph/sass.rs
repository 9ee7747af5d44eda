//! Import graph resolution for Sass, SCSS and CSS files.

use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::imports::extract_imports;
use super::{GraphQuery, GraphResolver, ResolutionError, ResolutionResult, normalize};
use crate::types::{AllowedExtensions, WatchSet};

/// Resolves the transitive import graph of a stylesheet.
///
/// Imports are looked up next to the importing file first, then in each
/// search path in order. For every directory the candidates are, per allowed
/// extension: `name.ext`, the partial `_name.ext`, then `name/index.ext` and
/// `name/_index.ext`. Imports that match no file are skipped.
#[derive(Debug, Clone, Default)]
pub struct SassGraphResolver;

impl SassGraphResolver {
    pub fn new() -> Self {
        Self
    }

    /// Find the file an import target refers to.
    fn resolve_import(
        &self,
        target: &str,
        importer_dir: &Path,
        search_paths: &[PathBuf],
        extensions: &AllowedExtensions,
    ) -> Option<PathBuf> {
        let stem = extensions.strip(target);

        std::iter::once(importer_dir)
            .chain(search_paths.iter().map(PathBuf::as_path))
            .find_map(|dir| Self::find_in_dir(&dir.join(stem), extensions))
            .map(|found| normalize(&found))
    }

    fn find_in_dir(base: &Path, extensions: &AllowedExtensions) -> Option<PathBuf> {
        let file_name = base.file_name()?.to_string_lossy().into_owned();
        let parent = base.parent()?;

        let plain = extensions.iter().map(|ext| parent.join(format!("{file_name}.{ext}")));
        let partial = extensions
            .iter()
            .map(|ext| parent.join(format!("_{file_name}.{ext}")));
        let index = extensions.iter().map(|ext| base.join(format!("index.{ext}")));
        let partial_index = extensions
            .iter()
            .map(|ext| base.join(format!("_index.{ext}")));

        plain
            .chain(partial)
            .chain(index)
            .chain(partial_index)
            .find(|candidate| candidate.is_file())
    }

    /// Check the entry and give it a canonical directory.
    ///
    /// Only the directory is canonicalised; the file name is kept as given
    /// so a symlinked entry is still reported under its own name.
    fn prepare_entry(entry: &Path) -> ResolutionResult<PathBuf> {
        let metadata = fs::metadata(entry).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResolutionError::EntryNotFound {
                path: entry.to_path_buf(),
            },
            _ => ResolutionError::Unreadable {
                path: entry.to_path_buf(),
                source: e,
            },
        })?;

        if !metadata.is_file() {
            return Err(ResolutionError::InvalidEntry {
                path: entry.to_path_buf(),
            });
        }

        match (entry.parent(), entry.file_name()) {
            (Some(parent), Some(name)) => Ok(canonical_dir(parent).join(name)),
            _ => Ok(normalize(entry)),
        }
    }
}

impl GraphResolver for SassGraphResolver {
    fn name(&self) -> &str {
        "sass-graph"
    }

    fn resolve(&self, query: &GraphQuery) -> ResolutionResult<WatchSet> {
        let entry = Self::prepare_entry(&query.entry)?;
        let search_paths: Vec<PathBuf> = query
            .search_paths
            .iter()
            .map(|p| canonical_dir(p))
            .collect();

        let mut graph = WatchSet::new();
        let mut queue = VecDeque::new();
        graph.insert(entry.clone());
        queue.push_back(entry);

        while let Some(file) = queue.pop_front() {
            let bytes = fs::read(&file).map_err(|source| ResolutionError::Unreadable {
                path: file.clone(),
                source,
            })?;
            let source = String::from_utf8_lossy(&bytes);
            let importer_dir = file.parent().unwrap_or_else(|| Path::new("/"));

            for target in extract_imports(&source) {
                match self.resolve_import(&target, importer_dir, &search_paths, &query.extensions) {
                    Some(dependency) => {
                        if graph.insert(dependency.clone()) {
                            tracing::trace!(
                                "[graph] {} -> {}",
                                file.display(),
                                dependency.display()
                            );
                            queue.push_back(dependency);
                        }
                    }
                    None => {
                        crate::debug_event!(
                            "graph",
                            "unresolved import",
                            "\"{target}\" in {}",
                            file.display()
                        );
                    }
                }
            }
        }

        Ok(graph)
    }
}

fn canonical_dir(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| normalize(dir))
}
