//! Configuration management for the dispatch daemon.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main daemon configuration.
///
/// Pacing and retry values default to the deployment the daemon was tuned
/// for: one send per five seconds, three attempts per job, a 60 second job
/// lock, and a 2-5 second typing jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Minimum spacing between the starts of consecutive dispatches.
    #[serde(default = "default_send_spacing_ms")]
    pub send_spacing_ms: u64,
    /// How long a claimed job is protected from being reclaimed.
    #[serde(default = "default_lock_duration_ms")]
    pub lock_duration_ms: u64,
    /// Default dispatch attempts per job before it fails terminally.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Base delay for the exponential job retry schedule.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Lower bound of the humanizer jitter sleep.
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    /// Upper bound of the humanizer jitter sleep.
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
    /// Delay before the first session reconnect attempt.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Upper bound on the session reconnect delay.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Consecutive reconnect failures tolerated before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_send_spacing_ms() -> u64 {
    5_000
}

fn default_lock_duration_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> i32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_jitter_min_ms() -> u64 {
    2_000
}

fn default_jitter_max_ms() -> u64 {
    5_000
}

fn default_reconnect_base_delay_ms() -> u64 {
    2_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            send_spacing_ms: default_send_spacing_ms(),
            lock_duration_ms: default_lock_duration_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults.
    ///
    /// Environment variables can override the log level (`COURIER_LOG_LEVEL`).
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("COURIER_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Minimum dispatch spacing as a Duration.
    pub fn send_spacing(&self) -> Duration {
        Duration::from_millis(self.send_spacing_ms)
    }

    /// Job lock duration as a Duration.
    pub fn lock_duration(&self) -> Duration {
        Duration::from_millis(self.lock_duration_ms)
    }

    /// Retry backoff base as a Duration.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}
