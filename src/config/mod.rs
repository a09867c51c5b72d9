//! Configuration for the polling daemon.
//!
//! Configuration is read from `~/.config/anifeed/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is
//! created. Missing keys fall back to their defaults.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between dispatch cycles.
    pub interval_secs: u64,
    /// Maximum retained items per feed (processed and pending windows).
    pub memory_limit: usize,
    /// Subscriptions handled before a cool-down pause within one cycle.
    pub batch_size: usize,
    /// Cool-down pause length in seconds.
    pub batch_pause_secs: u64,
    /// Override for the subscription database location.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            memory_limit: 25,
            batch_size: 45,
            batch_pause_secs: 60,
            database_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating a commented
    /// default file if none exists.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config.sanitized())
    }

    /// Lift zero values to 1: a zero period is rejected by the interval
    /// timer and a zero batch stride would fault the pacing arithmetic.
    fn sanitized(mut self) -> Self {
        if self.interval_secs == 0 {
            tracing::warn!("interval_secs = 0 is invalid, using 1");
            self.interval_secs = 1;
        }
        if self.batch_size == 0 {
            tracing::warn!("batch_size = 0 is invalid, using 1");
            self.batch_size = 1;
        }
        self
    }

    /// Get the default config file path: `~/.config/anifeed/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("anifeed").join("config.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# Anifeed Configuration

# Seconds between dispatch cycles.
interval_secs = 60

# Maximum retained items per feed. Bounds both the already-announced window
# and the pending queue.
memory_limit = 25

# After this many subscriptions within one cycle, pause for batch_pause_secs
# to stay under the webhook rate limits.
batch_size = 45
batch_pause_secs = 60

# Uncomment to store the subscription database somewhere else.
# database_path = "/var/lib/anifeed/anifeed.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
