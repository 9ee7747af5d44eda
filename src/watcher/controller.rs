//! Watcher controller: owns the reconciler and both adapters, turns raw
//! file events into recomputations and publishes consumer notifications.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::adapter::{ContentEvent, ContentWatch, StructuralEvent, StructuralWatch};
use super::content::NotifyContentWatch;
use super::debouncer::Debouncer;
use super::reconciler::WatchSetReconciler;
use super::structural::NotifyStructuralWatch;
use super::WatchError;
use crate::config::WatchConfig;
use crate::graph::{GraphQuery, GraphResolver, SassGraphResolver};
use crate::types::{AllowedExtensions, WatchDiff, WatchSet};

/// Notification delivered to the consumer.
#[derive(Debug)]
pub enum WatchNotification {
    /// The first successful recomputation completed. Sent exactly once.
    Init,
    /// The watched set or the content of a watched file changed.
    Update,
    /// A recomputation or adapter operation failed. Watching continues.
    Error(WatchError),
}

/// Lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    /// Waiting for the first successful recomputation.
    Initializing,
    Ready,
    Stopped,
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: ControllerState,
    watched: Arc<WatchSet>,
}

/// Handle to a running watch engine.
///
/// Dropping the handle cancels the engine; [`shutdown`](Self::shutdown)
/// additionally waits for both adapters to be released.
pub struct WatcherController {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    snapshot: watch::Receiver<Snapshot>,
}

impl WatcherController {
    /// Create a builder for configuring the controller.
    pub fn builder() -> WatcherControllerBuilder {
        WatcherControllerBuilder::new()
    }

    /// Current snapshot of the watched set.
    pub fn watched(&self) -> Arc<WatchSet> {
        Arc::clone(&self.snapshot.borrow().watched)
    }

    pub fn state(&self) -> ControllerState {
        self.snapshot.borrow().state
    }

    /// Stop the engine and release every watch.
    ///
    /// No notifications are sent once this returns. Calling it twice is a
    /// no-op.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("[watcher] engine task failed: {e}");
            }
        }
    }
}

impl Drop for WatcherController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builder for constructing a [`WatcherController`].
pub struct WatcherControllerBuilder {
    entry: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
    extensions: AllowedExtensions,
    root_dir: Option<PathBuf>,
    debounce_ms: u64,
    notification_capacity: usize,
    resolver: Option<Arc<dyn GraphResolver>>,
    structural: Option<Box<dyn StructuralWatch>>,
    content: Option<Box<dyn ContentWatch>>,
}

impl WatcherControllerBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        let defaults = WatchConfig::default();
        Self {
            entry: None,
            search_paths: Vec::new(),
            extensions: defaults.extensions,
            root_dir: None,
            debounce_ms: defaults.debounce_ms,
            notification_capacity: defaults.notification_capacity,
            resolver: None,
            structural: None,
            content: None,
        }
    }

    /// Take search paths, extensions, root directory and tuning from config.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            search_paths: config.include_paths.clone(),
            extensions: config.extensions.clone(),
            root_dir: Some(config.resolved_root_dir()),
            debounce_ms: config.debounce_ms,
            notification_capacity: config.notification_capacity,
            ..Self::new()
        }
    }

    /// Set the entry file. Required.
    pub fn entry(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry = Some(path.into());
        self
    }

    /// Append a search path.
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Replace the search paths.
    pub fn search_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_paths = paths.into_iter().collect();
        self
    }

    pub fn extensions(mut self, extensions: AllowedExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Set the structural watch root. Defaults to the working directory.
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Set the content debounce window in milliseconds. Zero disables it.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Use a custom graph resolver instead of [`SassGraphResolver`].
    pub fn resolver(mut self, resolver: Arc<dyn GraphResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use a custom structural watch instead of [`NotifyStructuralWatch`].
    pub fn structural_watch(mut self, watch: impl StructuralWatch + 'static) -> Self {
        self.structural = Some(Box::new(watch));
        self
    }

    /// Use a custom content watch instead of [`NotifyContentWatch`].
    pub fn content_watch(mut self, watch: impl ContentWatch + 'static) -> Self {
        self.content = Some(Box::new(watch));
        self
    }

    /// Start the engine on the current tokio runtime.
    ///
    /// Returns immediately; the first recomputation happens on the engine
    /// task, so `Init` is always observable on the returned receiver.
    pub fn spawn(
        self,
    ) -> Result<(WatcherController, mpsc::Receiver<WatchNotification>), WatchError> {
        let entry = self.entry.ok_or_else(|| WatchError::Config {
            reason: "Entry file is required".to_string(),
        })?;
        if self.extensions.is_empty() {
            return Err(WatchError::Config {
                reason: "At least one extension is required".to_string(),
            });
        }
        if self.notification_capacity == 0 {
            return Err(WatchError::Config {
                reason: "notification_capacity must be greater than zero".to_string(),
            });
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| WatchError::InitFailed {
            reason: format!("No tokio runtime: {e}"),
        })?;

        let root_dir = match self.root_dir {
            Some(dir) => crate::graph::absolutize(&dir),
            None => std::env::current_dir().map_err(|e| WatchError::Config {
                reason: format!("Cannot determine working directory: {e}"),
            })?,
        };

        let query = GraphQuery::new(entry, self.search_paths, self.extensions.clone());
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(SassGraphResolver::new()));
        let structural = self
            .structural
            .unwrap_or_else(|| Box::new(NotifyStructuralWatch::new()));
        let content = self
            .content
            .unwrap_or_else(|| Box::new(NotifyContentWatch::new()));

        let (notify_tx, notify_rx) = mpsc::channel(self.notification_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            state: ControllerState::Uninitialized,
            watched: Arc::new(WatchSet::new()),
        });
        let cancel = CancellationToken::new();

        let engine = Engine {
            reconciler: WatchSetReconciler::new(resolver, query),
            structural,
            content,
            root_dir,
            extensions: self.extensions,
            debouncer: Debouncer::new(self.debounce_ms),
            debounce: self.debounce_ms > 0,
            state: ControllerState::Uninitialized,
            notifier: Notifier {
                tx: notify_tx,
                cancel: cancel.clone(),
            },
            snapshot_tx,
            cancel: cancel.clone(),
        };
        let task = runtime.spawn(engine.run());

        Ok((
            WatcherController {
                cancel,
                task: Some(task),
                snapshot: snapshot_rx,
            },
            notify_rx,
        ))
    }
}

impl Default for WatcherControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Triggers collected since the last recomputation.
#[derive(Debug, Default)]
struct PendingTrigger {
    structural: bool,
    content: BTreeSet<PathBuf>,
}

impl PendingTrigger {
    fn is_empty(&self) -> bool {
        !self.structural && self.content.is_empty()
    }
}

/// The single task that owns all mutable watch state.
struct Engine {
    reconciler: WatchSetReconciler,
    structural: Box<dyn StructuralWatch>,
    content: Box<dyn ContentWatch>,
    root_dir: PathBuf,
    extensions: AllowedExtensions,
    debouncer: Debouncer,
    debounce: bool,
    state: ControllerState,
    notifier: Notifier,
    snapshot_tx: watch::Sender<Snapshot>,
    cancel: CancellationToken,
}

/// Consumer side of the notification channel.
struct Notifier {
    tx: mpsc::Sender<WatchNotification>,
    cancel: CancellationToken,
}

impl Notifier {
    /// Deliver a notification unless the engine is being cancelled.
    ///
    /// A dropped receiver is not an error; the engine keeps running.
    async fn emit(&self, notification: WatchNotification) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            result = self.tx.send(notification) => {
                if result.is_err() {
                    crate::debug_event!("watcher", "consumer gone", "notification dropped");
                }
            }
        }
    }
}

impl Engine {
    async fn run(mut self) {
        self.set_state(ControllerState::Initializing);
        crate::log_event!(
            "watcher",
            "starting",
            "{} (resolver: {})",
            self.reconciler.query().entry.display(),
            self.reconciler.resolver_name()
        );

        let initial = self.reconciler.recompute().await;

        let mut content_rx = match self.content.start(&WatchSet::new()) {
            Ok(rx) => Some(rx),
            Err(e) => {
                tracing::error!("[{}] failed to start: {e}", self.content.name());
                self.notifier.emit(WatchNotification::Error(e)).await;
                None
            }
        };

        let resolved = match initial {
            Ok(diff) => {
                self.apply(&diff).await;
                self.publish();
                true
            }
            Err(e) => {
                // Stay initializing; the next successful recomputation sends Init
                tracing::error!("[watcher] initial resolution failed: {e}");
                self.notifier.emit(WatchNotification::Error(e.into())).await;
                false
            }
        };

        let mut structural_rx = match self.structural.start(&self.root_dir, &self.extensions) {
            Ok(rx) => {
                crate::log_event!("watcher", "watching root", "{}", self.root_dir.display());
                Some(rx)
            }
            Err(e) => {
                tracing::error!("[{}] failed to start: {e}", self.structural.name());
                self.notifier.emit(WatchNotification::Error(e)).await;
                None
            }
        };

        if resolved {
            self.become_ready().await;
        }

        let mut pending = PendingTrigger::default();

        loop {
            let debounce_wait = self.debouncer.next_ready_in();

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                event = recv(&mut structural_rx) => match event {
                    Some(event) => self.record_structural(&mut pending, event),
                    None => {
                        structural_rx = None;
                        let adapter = self.structural.name().to_string();
                        self.channel_closed(adapter).await;
                    }
                },

                event = recv(&mut content_rx) => match event {
                    Some(event) => self.record_content(&mut pending, event),
                    None => {
                        content_rx = None;
                        let adapter = self.content.name().to_string();
                        self.channel_closed(adapter).await;
                    }
                },

                _ = sleep(debounce_wait.unwrap_or_default()), if debounce_wait.is_some() => {}
            }

            // Collapse everything queued so far into one recomputation
            if let Some(rx) = structural_rx.as_mut() {
                while let Ok(event) = rx.try_recv() {
                    self.record_structural(&mut pending, event);
                }
            }
            if let Some(rx) = content_rx.as_mut() {
                while let Ok(event) = rx.try_recv() {
                    self.record_content(&mut pending, event);
                }
            }
            pending.content.extend(self.debouncer.take_ready());

            if !pending.is_empty() {
                let trigger = std::mem::take(&mut pending);
                self.reconcile(trigger).await;
            }
        }

        // Close the channels first so no callback is left holding a send
        drop(structural_rx);
        drop(content_rx);
        self.structural.stop();
        self.content.stop();
        self.set_state(ControllerState::Stopped);
        crate::log_event!("watcher", "stopped");
    }

    fn record_structural(&self, pending: &mut PendingTrigger, event: StructuralEvent) {
        crate::debug_event!(self.structural.name(), "structural", "{event:?}");
        pending.structural = true;
    }

    fn record_content(&mut self, pending: &mut PendingTrigger, event: ContentEvent) {
        let ContentEvent::Changed(path) = event;
        if !self.reconciler.contains(&path) {
            crate::debug_event!(self.content.name(), "untracked", "{}", path.display());
            return;
        }
        if self.debounce {
            self.debouncer.record(path);
        } else {
            pending.content.insert(path);
        }
    }

    async fn channel_closed(&mut self, adapter: String) {
        tracing::error!("[{adapter}] event channel closed");
        self.notifier
            .emit(WatchNotification::Error(WatchError::ChannelClosed { adapter }))
            .await;
    }

    async fn reconcile(&mut self, trigger: PendingTrigger) {
        // The set may have shrunk since these were recorded
        let changed: Vec<PathBuf> = trigger
            .content
            .into_iter()
            .filter(|path| self.reconciler.contains(path))
            .collect();
        if !trigger.structural && changed.is_empty() {
            return;
        }

        for path in &changed {
            crate::log_event!("watcher", "changed", "{}", path.display());
        }

        let diff = match self.reconciler.recompute().await {
            Ok(diff) => diff,
            Err(e) => {
                tracing::error!("[watcher] resolution failed: {e}");
                self.notifier.emit(WatchNotification::Error(e.into())).await;
                return;
            }
        };

        if !diff.is_empty() {
            self.apply(&diff).await;
        }
        self.publish();

        if self.state == ControllerState::Initializing {
            self.become_ready().await;
            return;
        }

        if diff.is_empty() && changed.is_empty() {
            crate::debug_event!("watcher", "structural change", "dependency set unchanged");
            return;
        }
        self.notifier.emit(WatchNotification::Update).await;
    }

    /// Bring content subscriptions in line with a diff.
    async fn apply(&mut self, diff: &WatchDiff) {
        if diff.is_empty() {
            return;
        }
        crate::log_event!(
            "watcher",
            "dependency set changed",
            "+{} -{}",
            diff.added.len(),
            diff.removed.len()
        );

        if let Err(e) = self.content.add(&diff.added) {
            tracing::warn!("[{}] {e}", self.content.name());
            self.notifier.emit(WatchNotification::Error(e)).await;
        }
        if let Err(e) = self.content.remove(&diff.removed) {
            tracing::warn!("[{}] {e}", self.content.name());
            self.notifier.emit(WatchNotification::Error(e)).await;
        }

        let reconciler = &self.reconciler;
        self.debouncer.retain(|path| reconciler.contains(path));
    }

    async fn become_ready(&mut self) {
        self.set_state(ControllerState::Ready);
        crate::log_event!(
            "watcher",
            "ready",
            "{} files",
            self.reconciler.watched().len()
        );
        self.notifier.emit(WatchNotification::Init).await;
    }

    fn set_state(&mut self, state: ControllerState) {
        self.state = state;
        self.snapshot_tx.send_modify(|snapshot| snapshot.state = state);
    }

    fn publish(&self) {
        let watched = self.reconciler.watched();
        self.snapshot_tx
            .send_modify(|snapshot| snapshot.watched = watched);
    }
}

async fn recv<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
