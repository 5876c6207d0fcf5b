//! `reloadr.toml` configuration for the `reloadr` binary.
//!
//! The file is optional: a missing file means defaults everywhere. Unknown
//! keys are rejected so typos surface instead of being ignored.
//!
//! # Example
//!
//! ```toml
//! [run]
//! entry = "main"          # Function called after the script is loaded
//!
//! [timer]
//! interval_ms = 1000      # Reload every proxy on this interval (0 = off)
//!
//! [watch]
//! enabled = true          # Reload every proxy when its file is saved
//!
//! [log]
//! verbose = false
//! ```

mod error;

pub use error::ConfigError;

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "reloadr.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReloadrConfig {
    pub run: RunConfig,
    pub timer: TimerConfig,
    pub watch: WatchConfig,
    pub log: LogConfig,
}

/// `[run]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Global function called once the script has loaded. Skipped when the
    /// script defines no such function.
    pub entry: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
        }
    }
}

/// `[timer]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerConfig {
    /// Milliseconds between timer reloads. 0 disables the timer.
    pub interval_ms: u64,
}

/// `[watch]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub enabled: bool,
}

/// `[log]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub verbose: bool,
}

impl ReloadrConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            crate::debug!("config"; "{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.entry.trim().is_empty() {
            return Err(ConfigError::Validation("[run] entry must not be empty".into()));
        }
        Ok(())
    }

    /// Interval of the timer trigger, if enabled.
    pub fn timer_interval(&self) -> Option<Duration> {
        match self.timer.interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
