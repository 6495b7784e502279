// SPDX-License-Identifier: GPL-3.0-only

//! TOML configuration for the CLI
//!
//! ```toml
//! [monitor]
//! subsystem = "block"
//! devtype = "partition"   # omit to watch the whole subsystem
//!
//! [mounts]
//! table = "/proc/mounts"
//! timeout_ms = 5000
//! poll_interval_ms = 100
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use devwatch_sys::{MountTable, MountWait};
use devwatch_types::MonitorFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorFilter,
    pub mounts: MountsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountsConfig {
    pub table: PathBuf,
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for MountsConfig {
    fn default() -> Self {
        let wait = MountWait::default();
        Self {
            table: MountTable::default().path().to_path_buf(),
            timeout_ms: wait.timeout.as_millis() as u64,
            poll_interval_ms: wait.poll_interval.as_millis() as u64,
        }
    }
}

impl MountsConfig {
    pub fn table(&self) -> MountTable {
        MountTable::new(&self.table)
    }

    pub fn wait(&self) -> MountWait {
        MountWait {
            timeout: Duration::from_millis(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/devwatch/config.toml`, else `~/.config/devwatch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME")
            && !config_home.is_empty()
        {
            return Some(PathBuf::from(config_home).join("devwatch/config.toml"));
        }

        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config/devwatch/config.toml"))
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist. The default location is optional and
    /// falls back to built-in defaults when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `--subsystem` / `--devtype` flags.
    ///
    /// A new subsystem resets the devtype, since the configured one most
    /// likely belongs to the old subsystem.
    pub fn override_filter(&mut self, subsystem: Option<String>, devtype: Option<String>) {
        if let Some(subsystem) = subsystem {
            self.monitor.subsystem = subsystem;
            self.monitor.devtype = None;
        }

        if devtype.is_some() {
            self.monitor.devtype = devtype;
        }
    }
}
