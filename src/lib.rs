pub mod cli;
pub mod config;
pub mod graph;
pub mod logging;
pub mod runner;
pub mod types;
pub mod watcher;

pub use config::{LoggingConfig, Settings, WatchConfig};
pub use graph::{GraphQuery, GraphResolver, ResolutionError, SassGraphResolver};
pub use runner::{RunError, Runner};
pub use types::{AllowedExtensions, WatchDiff, WatchSet};
pub use watcher::{
    ControllerState, WatchError, WatchNotification, WatcherController, WatcherControllerBuilder,
};
