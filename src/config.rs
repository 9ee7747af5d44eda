//! Configuration module for the stylesheet watcher.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`sass-watcher.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SASS_WATCHER_` and use double
//! underscores to separate nested levels:
//! - `SASS_WATCHER_WATCH__DEBOUNCE_MS=200` sets `watch.debounce_ms`
//! - `SASS_WATCHER_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::types::AllowedExtensions;

/// Name of the configuration file looked up from the working directory upwards.
pub const CONFIG_FILE_NAME: &str = "sass-watcher.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "SASS_WATCHER_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Watch behaviour
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// Directory watched for added/removed files (defaults to the working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,

    /// Directories searched for imported files, in order
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,

    /// File extensions that belong to the dependency graph
    #[serde(default)]
    pub extensions: AllowedExtensions,

    /// Quiet period before a burst of content changes triggers a rebuild
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Capacity of the notification queue handed to consumers
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `sass_watcher::graph = "trace"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_debounce_ms() -> u64 {
    50
}
fn default_notification_capacity() -> usize {
    64
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            include_paths: Vec::new(),
            extensions: AllowedExtensions::default(),
            debounce_ms: default_debounce_ms(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl WatchConfig {
    /// Root directory for the structural watch.
    pub fn resolved_root_dir(&self) -> PathBuf {
        match &self.root_dir {
            Some(dir) => crate::graph::absolutize(dir),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// Uses the first `sass-watcher.toml` found from the working directory up
    /// to the filesystem root; missing files simply contribute nothing.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path =
            Self::find_config_file().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path))
            // Double underscore becomes a dot, single underscores stay in field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Search from the current directory up to root for a config file.
    pub fn find_config_file() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_config_file_from(&current)
    }

    fn find_config_file_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.watch.debounce_ms, 50);
        assert_eq!(settings.watch.notification_capacity, 64);
        assert_eq!(
            settings.watch.extensions.iter().collect::<Vec<_>>(),
            vec!["scss", "sass", "css"]
        );
        assert!(settings.watch.root_dir.is_none());
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        let toml_content = r#"
version = 2

[watch]
root_dir = "/srv/site"
include_paths = ["vendor/styles", "node_modules"]
extensions = ["scss"]
debounce_ms = 250

[logging]
default = "info"

[logging.modules]
"sass_watcher::graph" = "trace"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.watch.root_dir, Some(PathBuf::from("/srv/site")));
        assert_eq!(
            settings.watch.include_paths,
            vec![PathBuf::from("vendor/styles"), PathBuf::from("node_modules")]
        );
        assert_eq!(settings.watch.extensions, AllowedExtensions::new(["scss"]));
        assert_eq!(settings.watch.debounce_ms, 250);
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["sass_watcher::graph"], "trace");
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        fs::write(&config_path, "[watch]\ndebounce_ms = 10\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified value
        assert_eq!(settings.watch.debounce_ms, 10);

        // Default values should still be present
        assert_eq!(settings.version, 1);
        assert_eq!(settings.watch.extensions, AllowedExtensions::default());
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();

        let found = Settings::find_config_file_from(&nested).unwrap();
        assert_eq!(found, temp_dir.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_resolved_root_dir_is_absolute() {
        let mut config = WatchConfig::default();
        assert!(config.resolved_root_dir().is_absolute());

        config.root_dir = Some(PathBuf::from("styles"));
        let root = config.resolved_root_dir();
        assert!(root.is_absolute());
        assert!(root.ends_with("styles"));
    }
}
