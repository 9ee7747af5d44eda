//! Dependency-driven watch engine.
//!
//! A single engine task keeps the set of watched files equal to the
//! dependency graph of one entry file, and tells the consumer when it
//! should re-run its transformation.
//!
//! # Architecture
//!
//! ```text
//! StructuralWatch (root dir, recursive)   ContentWatch (graph files)
//!          |  Added / Removed                    |  Changed
//!          +------------------+------------------+
//!                             |
//!                     WatcherController
//!                   (pending trigger, debounce)
//!                             |
//!                    WatchSetReconciler ---> GraphResolver
//!                             |
//!                      WatchDiff (added, removed)
//!                             |
//!          ContentWatch::add / remove, then Init / Update
//! ```
//!
//! Structural changes that leave the dependency set unchanged are silent.
//! Content changes of a watched file always produce `Update`.

mod adapter;
mod content;
mod controller;
mod debouncer;
mod error;
mod path_registry;
mod reconciler;
mod structural;

pub use adapter::{ContentEvent, ContentWatch, StructuralEvent, StructuralWatch};
pub use content::NotifyContentWatch;
pub use controller::{
    ControllerState, WatchNotification, WatcherController, WatcherControllerBuilder,
};
pub use debouncer::Debouncer;
pub use error::{WatchError, WatchResult};
pub use path_registry::DirectoryRegistry;
pub use reconciler::WatchSetReconciler;
pub use structural::NotifyStructuralWatch;
