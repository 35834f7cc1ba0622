//! Error Types
//!
//! Errors are split by the layer that raises them:
//! - **Bus errors**: transport failures and device faults on a register access
//! - **Profile errors**: profile data that cannot be aggregated
//! - **Config errors**: unreadable or malformed settings files
//! - **Monitor errors**: anything that ends an interactive session
//!
//! A bus fault raised while reading one register is usually *not* an error for
//! the session: the debugger records it next to the register and keeps going.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`DevBus`](crate::bus::DevBus) implementation.
#[derive(Error, Debug)]
pub enum BusError {
    /// The device flagged a bus error while accessing `address`.
    #[error("bus fault at 0x{address:08x}")]
    Fault { address: u32 },

    /// The CPU never asserted its stall bit after a register select.
    ///
    /// Only raised when a stall timeout is configured; by default the monitor
    /// waits forever, matching the behavior of the hardware tools.
    #[error("CPU did not stall within {waited_ms} ms after selecting register {select}")]
    StallTimeout { select: u8, waited_ms: u64 },

    /// A remote bridge did not answer an access in time.
    ///
    /// The connection is dropped afterwards, so later accesses see
    /// [`BusError::Closed`].
    #[error("no response for access at 0x{address:08x} within {waited_ms} ms")]
    Timeout { address: u32, waited_ms: u64 },

    /// The bus was used after `close` or `kill`.
    #[error("bus connection is closed")]
    Closed,

    /// The peer sent something the transport could not interpret.
    #[error("bus protocol error: {0}")]
    Protocol(String),

    /// Underlying transport I/O failed.
    #[error("bus I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BusError {
    /// Address of the faulting access, if this is a device fault.
    pub fn fault_address(&self) -> Option<u32> {
        match self {
            BusError::Fault { address } => Some(*address),
            _ => None,
        }
    }
}

/// Errors raised while aggregating profile samples.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The sampled address range needs more slots than the configured limit.
    #[error(
        "profile spans 0x{min:08x}..=0x{max:08x} ({span} slots), more than the limit of {limit}\n\
         Suggestion: raise max_profile_span in the config or check the profile file"
    )]
    SpanTooLarge {
        min: u32,
        max: u32,
        span: u64,
        limit: u32,
    },

    #[error("profile I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while loading or saving the monitor configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that end an interactive debug session.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("console error: {0}")]
    Console(#[from] io::Error),
}
