//! Structured logging setup for the `brainscan` and `studio` binaries.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binaries so tests stay quiet.

use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub ansi_colors: bool,
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            ansi_colors: true,
            include_target: false,
        }
    }
}

impl LogConfig {
    /// Debug level with module targets, for `--verbose`.
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            ansi_colors: true,
            include_target: true,
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `config.level` when set.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}
