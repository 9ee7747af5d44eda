//! Authoritative watched set and diffing.

use std::path::Path;
use std::sync::Arc;

use crate::graph::{GraphQuery, GraphResolver, ResolutionError, ResolutionResult};
use crate::types::{WatchDiff, WatchSet};

/// Owns the set of files currently believed to be in the dependency graph.
///
/// Every successful [`recompute`](Self::recompute) replaces the set wholesale
/// with the resolver's output and reports what entered and left it. A failed
/// recomputation leaves the set untouched. Callers serialize access.
pub struct WatchSetReconciler {
    resolver: Arc<dyn GraphResolver>,
    query: GraphQuery,
    current: Arc<WatchSet>,
}

impl WatchSetReconciler {
    /// Create a reconciler with an empty watched set.
    pub fn new(resolver: Arc<dyn GraphResolver>, query: GraphQuery) -> Self {
        Self {
            resolver,
            query,
            current: Arc::new(WatchSet::new()),
        }
    }

    /// Resolve the graph again and diff it against the previous snapshot.
    ///
    /// Resolution reads the filesystem, so the resolver runs on the blocking
    /// thread pool.
    pub async fn recompute(&mut self) -> ResolutionResult<WatchDiff> {
        let resolver = Arc::clone(&self.resolver);
        let query = self.query.clone();

        let next = tokio::task::spawn_blocking(move || resolver.resolve(&query))
            .await
            .map_err(|e| ResolutionError::Interrupted {
                reason: e.to_string(),
            })??;
        Ok(self.commit(next))
    }

    fn commit(&mut self, next: WatchSet) -> WatchDiff {
        let diff = WatchDiff::between(&self.current, &next);

        if !diff.added.is_empty() {
            tracing::trace!(
                "[reconciler] start watching: {}",
                crate::types::join_paths(&diff.added)
            );
        }
        if !diff.removed.is_empty() {
            tracing::trace!(
                "[reconciler] stop watching: {}",
                crate::types::join_paths(&diff.removed)
            );
        }
        if !diff.is_empty() {
            tracing::trace!("[reconciler] currently watching: {}", next.display());
        }

        self.current = Arc::new(next);
        diff
    }

    /// Current snapshot of the watched set.
    pub fn watched(&self) -> Arc<WatchSet> {
        Arc::clone(&self.current)
    }

    /// Check if a file is in the current snapshot.
    pub fn contains(&self, path: &Path) -> bool {
        self.current.contains(path)
    }

    pub fn query(&self) -> &GraphQuery {
        &self.query
    }

    pub fn resolver_name(&self) -> &str {
        self.resolver.name()
    }
}
