//! Zip CPU debug monitor and execution profiler.
//!
//! Two tools share this crate:
//! - **pdump**: merges a cycle-count profile (`pfile.bin`) with an instruction
//!   image and prints an annotated disassembly plus a hottest-address ranking.
//! - **zipdbg**: an interactive monitor that halts, steps, resets and releases
//!   a CPU over its debug register bus and shows registers and pipeline.
//!
//! # Layout
//! - [`decoder`]: instruction word to mnemonic text
//! - [`bus`]: the register bus capability and its transports
//! - [`regs`]: register namespace, control word and condition codes
//! - [`profile`]: sample aggregation, annotated dump and report text
//! - [`debugger`]: the interactive session state machine and screen model
//! - [`image`]: instruction image files
//! - [`config`]: persisted monitor settings

pub mod bus;
pub mod config;
pub mod debugger;
pub mod decoder;
pub mod error;
pub mod image;
pub mod profile;
pub mod regs;

pub use bus::{AddressMode, DevBus};
pub use config::MonitorConfig;
pub use decoder::{Decoder, Mnemonic, ZipDecoder};
pub use debugger::{Console, Session, SessionConfig, SessionState};
pub use error::{BusError, ConfigError, MonitorError, ProfileError};
