//! Configuration loading for bf-core.
//!
//! Resolution order (first hit wins): CLI flag > `BF_CONFIG` env > XDG
//! config dir > built-in defaults. An explicitly named file that is
//! missing or malformed is an error; the absence of the XDG file is not.
//!
//! All timeouts have serde defaults, so a config file only needs to name
//! the values it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// XDG directory name for config and data.
const APP_DIR_NAME: &str = "browser_fleet";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Timeout discipline for the lifecycle controller.
///
/// Defaults mirror the behavior the fleet has always had: a 2 s startup
/// grace window, 5 s graceful / 2 s forced termination for an individual
/// stop, and a tighter 3 s / 2 s escalation during fleet shutdown under a
/// 10 s overall deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Wait after spawn before declaring a launch successful.
    pub grace_period_ms: u64,
    /// Graceful (SIGTERM) wait during an individual stop.
    pub term_timeout_ms: u64,
    /// Forced (SIGKILL) wait during an individual stop.
    pub kill_timeout_ms: u64,
    /// Polling interval for all liveness waits.
    pub poll_interval_ms: u64,
    /// Graceful wait per profile during fleet shutdown.
    pub shutdown_term_ms: u64,
    /// Forced wait per profile during fleet shutdown.
    pub shutdown_kill_ms: u64,
    /// Overall deadline for fleet shutdown.
    pub shutdown_overall_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            grace_period_ms: 2_000,
            term_timeout_ms: 5_000,
            kill_timeout_ms: 2_000,
            poll_interval_ms: 100,
            shutdown_term_ms: 3_000,
            shutdown_kill_ms: 2_000,
            shutdown_overall_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
    pub fn term_timeout(&self) -> Duration {
        Duration::from_millis(self.term_timeout_ms)
    }
    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn shutdown_term(&self) -> Duration {
        Duration::from_millis(self.shutdown_term_ms)
    }
    pub fn shutdown_kill(&self) -> Duration {
        Duration::from_millis(self.shutdown_kill_ms)
    }
    pub fn shutdown_overall(&self) -> Duration {
        Duration::from_millis(self.shutdown_overall_ms)
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Default browser executable; a profile override wins over this.
    pub browser_path: Option<PathBuf>,
    /// Base root for per-profile working directories.
    pub base_data_dir: Option<PathBuf>,
    pub timeouts: TimeoutConfig,
}

impl FleetConfig {
    /// Load using the standard resolution order.
    ///
    /// Returns the config and the path it came from (`None` when running
    /// on built-in defaults).
    pub fn load(cli_path: Option<&Path>) -> Result<(FleetConfig, Option<PathBuf>), ConfigError> {
        if let Some(path) = cli_path {
            return Ok((Self::from_file(path, true)?, Some(path.to_path_buf())));
        }

        if let Ok(env_path) = std::env::var("BF_CONFIG") {
            let path = PathBuf::from(env_path);
            return Ok((Self::from_file(&path, true)?, Some(path)));
        }

        let xdg = dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"));
        if let Some(path) = xdg.filter(|p| p.exists()) {
            return Ok((Self::from_file(&path, true)?, Some(path)));
        }

        Ok((FleetConfig::default(), None))
    }

    /// Parse a config file. With `required`, a missing file is an error.
    pub fn from_file(path: &Path, required: bool) -> Result<FleetConfig, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if required {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                return Ok(FleetConfig::default());
            }
            Err(err) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The effective base data root, falling back to the XDG data dir.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.base_data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join("profiles"))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME).join("profiles"))
    }
}
