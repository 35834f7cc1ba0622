// Settings persistence
use crate::bus::DebugPort;
use crate::debugger::SessionConfig;
use crate::error::ConfigError;
use crate::profile::DEFAULT_MAX_SPAN;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Address instructions are loaded at when nothing else says otherwise.
pub const DEFAULT_BOOT_ADDRESS: u32 = 0x0000_8000;

/// Monitor settings, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Debug port control/status register address.
    pub ctrl_address: u32,
    /// Debug port data register address.
    pub data_address: u32,
    pub boot_address: u32,
    /// Keypress poll interval of the interactive loop.
    pub poll_interval_ms: u64,
    /// Give up waiting for the stall bit after this long. `None` waits forever.
    pub stall_timeout_ms: Option<u64>,
    /// Stall polls after the initial halt request.
    pub halt_attempts: u32,
    /// Largest profile table, in address slots.
    pub max_profile_span: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ctrl_address: DebugPort::DEFAULT_CTRL,
            data_address: DebugPort::DEFAULT_DATA,
            boot_address: DEFAULT_BOOT_ADDRESS,
            poll_interval_ms: 50,
            stall_timeout_ms: None,
            halt_attempts: 5,
            max_profile_span: DEFAULT_MAX_SPAN,
        }
    }
}

impl MonitorConfig {
    /// `<config dir>/zipmon/config.json`, or `./zipmon/config.json` when the
    /// platform has no config directory.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("zipmon");
        path.push("config.json");
        path
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// `path` is `None`. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!("no config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_err)
    }

    pub fn debug_port(&self) -> DebugPort {
        DebugPort {
            ctrl: self.ctrl_address,
            data: self.data_address,
        }
    }

    /// Settings for an interactive session.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            port: self.debug_port(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stall_timeout: self.stall_timeout_ms.map(Duration::from_millis),
            halt_attempts: self.halt_attempts,
        }
    }
}
