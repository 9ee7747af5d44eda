//! Full engine on a real temporary directory with the notify-backed adapters.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use sass_watcher::graph::{GraphQuery, GraphResolver, ResolutionResult, SassGraphResolver};
use sass_watcher::types::WatchSet;
use sass_watcher::watcher::{
    ControllerState, NotifyStructuralWatch, WatchNotification, WatcherController,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

/// The real resolver, with a gate that can hold a recomputation open.
#[derive(Default)]
struct GatedResolver {
    inner: SassGraphResolver,
    calls: AtomicUsize,
    closed: Mutex<bool>,
    gate: Condvar,
}

impl GatedResolver {
    fn close(&self) {
        *self.closed.lock() = true;
    }

    fn open(&self) {
        *self.closed.lock() = false;
        self.gate.notify_all();
    }

    async fn wait_for_calls(&self, count: usize) {
        for _ in 0..500 {
            if self.calls.load(Ordering::SeqCst) >= count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("resolver was not called {count} times");
    }
}

impl GraphResolver for GatedResolver {
    fn name(&self) -> &str {
        "gated"
    }

    fn resolve(&self, query: &GraphQuery) -> ResolutionResult<WatchSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut closed = self.closed.lock();
        while *closed {
            self.gate.wait(&mut closed);
        }
        drop(closed);
        self.inner.resolve(query)
    }
}

async fn next(rx: &mut mpsc::Receiver<WatchNotification>) -> WatchNotification {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}

/// Swallow trailing notifications from multi-step file writes.
async fn settle(rx: &mut mpsc::Receiver<WatchNotification>) {
    while let Ok(Some(notification)) = timeout(Duration::from_millis(300), rx.recv()).await {
        assert!(
            matches!(notification, WatchNotification::Update),
            "unexpected {notification:?}"
        );
    }
}

async fn expect_silence(rx: &mut mpsc::Receiver<WatchNotification>) {
    let result = timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(result.is_err(), "unexpected notification: {result:?}");
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_set_follows_imports_on_disk() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();

    let entry = write(&root, "a.scss", "@import \"b\";\n.a { color: red; }\n");
    let partial = write(&root, "_b.scss", "$b: 1px;\n");

    let (mut controller, mut rx) = WatcherController::builder()
        .entry(&entry)
        .root_dir(&root)
        .debounce_ms(20)
        .spawn()
        .unwrap();

    assert!(matches!(next(&mut rx).await, WatchNotification::Init));
    assert_eq!(controller.watched().to_vec(), vec![partial.clone(), entry.clone()]);

    // Editing an imported partial triggers an update
    write(&root, "_b.scss", "$b: 2px;\n");
    assert!(matches!(next(&mut rx).await, WatchNotification::Update));
    settle(&mut rx).await;

    // A new file nothing imports changes nothing
    write(&root, "c.scss", ".c {}\n");
    expect_silence(&mut rx).await;
    assert_eq!(controller.watched().len(), 2);

    // Dropping the import shrinks the set
    write(&root, "a.scss", ".a { color: blue; }\n");
    assert!(matches!(next(&mut rx).await, WatchNotification::Update));
    settle(&mut rx).await;
    assert_eq!(controller.watched().to_vec(), vec![entry.clone()]);

    // The partial is no longer watched
    write(&root, "_b.scss", "$b: 3px;\n");
    expect_silence(&mut rx).await;

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deleted_entry_reports_error_and_keeps_set() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let vendor = root.join("vendor");
    fs::create_dir(&vendor).unwrap();

    let entry = write(&root, "main.scss", "@use \"grid\";\n");
    let grid = write(&vendor, "_grid.scss", ".row {}\n");

    let (mut controller, mut rx) = WatcherController::builder()
        .entry(&entry)
        .root_dir(&root)
        .search_path(&vendor)
        .debounce_ms(20)
        .spawn()
        .unwrap();

    assert!(matches!(next(&mut rx).await, WatchNotification::Init));
    assert_eq!(controller.watched().to_vec(), vec![entry.clone(), grid.clone()]);

    fs::remove_file(&entry).unwrap();

    match next(&mut rx).await {
        WatchNotification::Error(e) => assert!(e.is_resolution(), "unexpected error {e}"),
        other => panic!("expected an error, got {other:?}"),
    }
    assert_eq!(controller.watched().to_vec(), vec![entry, grid]);

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_completes_while_events_pile_up() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let entry = write(&root, "main.scss", ".main {}\n");

    let resolver = Arc::new(GatedResolver::default());
    let (mut controller, mut rx) = WatcherController::builder()
        .entry(&entry)
        .root_dir(&root)
        .debounce_ms(0)
        .resolver(resolver.clone())
        .structural_watch(NotifyStructuralWatch::with_capacity(4))
        .spawn()
        .unwrap();

    assert!(matches!(next(&mut rx).await, WatchNotification::Init));

    // Hold a recomputation open so the structural queue overflows
    resolver.close();
    fs::create_dir(root.join("first")).unwrap();
    resolver.wait_for_calls(2).await;

    for i in 0..600 {
        fs::create_dir(root.join(format!("dir{i}"))).unwrap();
    }
    resolver.open();

    let stopped = timeout(Duration::from_secs(5), controller.shutdown()).await;
    assert!(stopped.is_ok(), "shutdown did not complete");
    assert_eq!(controller.state(), ControllerState::Stopped);
}
