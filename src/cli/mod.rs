//! Command-line interface for the `sass-watcher` binary.

pub mod args;

pub use args::{Cli, split_sass_path};
