//! Unified logging for watcher output.
//!
//! Provides compact timestamped logging with per-module level configuration.
//! Supports `RUST_LOG` environment variable for runtime overrides.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"  # quiet by default
//!
//! [logging.modules]
//! "sass_watcher::graph" = "debug"
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config and `-v` flags:
//! ```bash
//! RUST_LOG=debug sass-watcher main.scss
//! RUST_LOG=sass_watcher::watcher=trace sass-watcher main.scss
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Map a `-v` count onto a default level.
///
/// - 0: `warn` (configured default is kept)
/// - 1: `info` - start message and rebuild notices
/// - 2: `debug` - individual file events
/// - 3+: `trace` - start/stop watching lists and import edges
pub fn level_for_verbosity(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Build the filter directive string from config.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push_str(&format!(",{module}={level}"));
    }
    filter_str
}

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only first call takes effect).
/// Output goes to stderr so stdout stays free for compiled CSS.
///
/// The `RUST_LOG` environment variable takes precedence over config settings.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        // RUST_LOG env var takes precedence over config
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("watcher", "update", "{}", path.display());
/// log_event!("runner", "finished");
/// ```
#[macro_export]
macro_rules! log_event {
    ($scope:expr, $event:expr) => {
        tracing::info!("[{}] {}", $scope, $event)
    };
    ($scope:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $scope, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("structural", "added", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($scope:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $scope, $event)
    };
    ($scope:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $scope, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), None);
        assert_eq!(level_for_verbosity(1), Some("info"));
        assert_eq!(level_for_verbosity(2), Some("debug"));
        assert_eq!(level_for_verbosity(3), Some("trace"));
        assert_eq!(level_for_verbosity(9), Some("trace"));
    }

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig {
            default: "info".to_string(),
            modules: HashMap::from([
                ("sass_watcher::graph".to_string(), "trace".to_string()),
                ("notify".to_string(), "error".to_string()),
            ]),
        };
        assert_eq!(
            filter_directives(&config),
            "info,notify=error,sass_watcher::graph=trace"
        );
    }
}
