//! CLI argument parsing using clap.

use clap::{
    Parser,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::WatchConfig;
use crate::types::AllowedExtensions;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

const AFTER_HELP: &str = "\
Examples:
  $ sass-watcher src/main.scss -o dist/main.css
  $ sass-watcher src/main.scss -c 'sassc <input>' -o dist/main.css
  $ sass-watcher src/main.scss -I vendor -r src -v

Directories listed in SASS_PATH (colon-separated) are appended to the
include paths.";

/// Re-run a post-processing step whenever a Sass entry file or anything it
/// imports changes.
#[derive(Parser, Debug)]
#[command(
    name = "sass-watcher",
    version,
    about,
    styles = clap_cargo_style(),
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Entry file to watch
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file path; stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Command to run on every change; shell syntax allowed, <input> is
    /// replaced by the input path and the input is piped to stdin
    #[arg(short, long, value_name = "COMMAND")]
    pub command: Option<String>,

    /// Directory to watch for added and deleted files [default: current directory]
    #[arg(short, long, value_name = "DIR")]
    pub root_dir: Option<PathBuf>,

    /// Path to look for imported files; repeatable
    #[arg(short = 'I', long = "include-path", value_name = "DIR")]
    pub include_paths: Vec<PathBuf>,

    /// File extensions to watch [default: scss sass css]
    #[arg(short = 'e', long = "include-extensions", value_name = "EXT", num_args = 1..)]
    pub extensions: Vec<String>,

    /// Verbosity level; repeat for more output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file [default: nearest sass-watcher.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded configuration.
    ///
    /// Include paths given on the command line come first, then configured
    /// ones, then `sass_path` entries. Everything is made absolute.
    pub fn apply_to(&self, config: &mut WatchConfig, sass_path: Option<&str>) {
        if let Some(root_dir) = &self.root_dir {
            config.root_dir = Some(root_dir.clone());
        }
        if let Some(root_dir) = config.root_dir.take() {
            config.root_dir = Some(crate::graph::absolutize(&root_dir));
        }

        let mut include_paths = self.include_paths.clone();
        include_paths.append(&mut config.include_paths);
        include_paths.extend(split_sass_path(sass_path));
        config.include_paths = include_paths
            .iter()
            .map(|path| crate::graph::absolutize(path))
            .collect();

        if !self.extensions.is_empty() {
            config.extensions = AllowedExtensions::new(&self.extensions);
        }
    }

    /// Absolute entry path.
    pub fn input_path(&self) -> PathBuf {
        crate::graph::absolutize(&self.input)
    }

    /// Absolute output path, if any.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output.as_deref().map(crate::graph::absolutize)
    }
}

/// Split a `SASS_PATH` value into directories.
pub fn split_sass_path(value: Option<&str>) -> Vec<PathBuf> {
    value
        .map(|value| {
            value
                .split(':')
                .filter(|entry| !entry.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}
