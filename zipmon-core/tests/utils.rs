//! Test Utilities
//!
//! A scripted console for driving debug sessions and helpers for building
//! simulated CPUs.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::time::Duration;
use zipmon_core::bus::sim::SimBus;
use zipmon_core::bus::DebugPort;
use zipmon_core::debugger::{Console, Screen, SessionConfig};

/// Load address used by the simulated CPUs in these tests.
pub const BASE: u32 = 0x8000;

/// Console that replays a fixed key sequence and records every frame.
///
/// Once the script runs out it answers `q`, so a session always ends.
#[derive(Default)]
pub struct ScriptedConsole {
    keys: VecDeque<Option<char>>,
    pub frames: Vec<Screen>,
    pub clears: usize,
}

impl ScriptedConsole {
    /// `None` entries model a poll that timed out without a key.
    pub fn new(keys: &[Option<char>]) -> Self {
        Self {
            keys: keys.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn keys(keys: &str) -> Self {
        Self::new(&keys.chars().map(Some).collect::<Vec<_>>())
    }

    pub fn last_frame(&self) -> &Screen {
        self.frames.last().expect("no frame drawn")
    }
}

impl Console for ScriptedConsole {
    fn draw(&mut self, screen: &Screen) -> io::Result<()> {
        self.frames.push(screen.clone());
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<char>> {
        Ok(self.keys.pop_front().unwrap_or(Some('q')))
    }
}

/// Session settings with no keyboard wait.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval: Duration::ZERO,
        ..SessionConfig::default()
    }
}

/// Simulated CPU with `words` loaded at [`BASE`].
pub fn sim_with_program(words: &[u32]) -> SimBus {
    SimBus::new(DebugPort::default(), BASE, words.to_vec())
}

/// Simulated CPU holding a page of `NOOP`s at [`BASE`].
pub fn sim_with_noops(count: usize) -> SimBus {
    sim_with_program(&vec![0x4e00_0000; count])
}
