//! Interactive Debug Session
//!
//! [`Session`] drives a CPU through its debug port: it halts the CPU on
//! launch, shows a register and pipeline snapshot whenever the halted state
//! changes, and reacts to four single-key commands:
//!
//! | key   | effect                                              |
//! |-------|-----------------------------------------------------|
//! | `g`   | release the CPU and end the session                 |
//! | `q`   | end the session, leaving the CPU halted             |
//! | `r`   | reset the CPU (it stays halted) and clear the screen |
//! | `s`   | single-step one instruction                         |
//!
//! The session never draws anything itself. [`Session::refresh`] produces a
//! [`View`] and [`Session::run`] hands its [`Screen`] to a [`Console`], so the
//! whole state machine can be driven from tests with a scripted console.
//!
//! Register reads that fault on the bus are recorded in the snapshot and do
//! not stop the refresh. Any other bus error ends the session.

pub mod screen;
pub mod snapshot;

pub use screen::{Screen, TextRun};
pub use snapshot::{
    pipeline_addresses, PipelineStage, Reading, RegisterFault, RegisterSnapshot, StageFetch,
    StageWord,
};

use crate::bus::{DebugPort, DevBus};
use crate::config::MonitorConfig;
use crate::decoder::Decoder;
use crate::error::{BusError, MonitorError};
use crate::regs::{CpuControl, Mode, Peripheral, RegisterId, BANK_SIZE, REG_CC};
use log::{debug, info, trace};
use std::collections::BTreeMap;
use std::io;
use std::time::{Duration, Instant};

/// Runtime settings of a session, derived from [`MonitorConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub port: DebugPort,
    /// How long one keypress poll blocks before the display is refreshed.
    pub poll_interval: Duration,
    /// Bound on the stall-bit spin of a register read. `None` spins forever.
    pub stall_timeout: Option<Duration>,
    /// Control register polls after the halt request on launch.
    pub halt_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        MonitorConfig::default().session()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Halted,
    /// A step was issued and not yet observed to complete.
    Stepping,
    /// Released by a go command.
    Running,
    Terminated,
}

/// A user command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Go,
    Quit,
    Reset,
    Step,
}

impl Command {
    /// Command bound to `key`, in either case.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'g' => Some(Command::Go),
            'q' => Some(Command::Quit),
            'r' => Some(Command::Reset),
            's' => Some(Command::Step),
            _ => None,
        }
    }
}

/// What the control loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Clear the console before the next draw.
    Clear,
    Exit,
}

/// Something to show on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Running,
    Halted(Box<RegisterSnapshot>),
}

/// Output and keyboard side of a session.
pub trait Console {
    fn draw(&mut self, screen: &Screen) -> io::Result<()>;

    fn clear(&mut self) -> io::Result<()>;

    /// Wait up to `timeout` for a keypress.
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<char>>;
}

/// The view currently on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shown {
    Nothing,
    Running,
    Snapshot,
}

/// A debug session over one register bus.
///
/// The session owns the bus and closes it when dropped, so the connection is
/// released however the session ends.
pub struct Session<B: DevBus, D: Decoder> {
    bus: B,
    decoder: D,
    config: SessionConfig,
    state: SessionState,
    shown: Shown,
    dirty: bool,
    last_mode: Option<Mode>,
}

impl<B: DevBus, D: Decoder> Session<B, D> {
    pub fn new(bus: B, decoder: D, config: SessionConfig) -> Self {
        Self {
            bus,
            decoder,
            config,
            state: SessionState::Halted,
            shown: Shown::Nothing,
            dirty: true,
            last_mode: None,
        }
    }

    /// Request a halt and wait a bounded number of polls for the stall bit.
    ///
    /// Returns whether the CPU stalled. The session is `Halted` either way;
    /// a CPU that has not stalled yet is displayed as running by
    /// [`refresh`](Self::refresh) until it does.
    pub fn launch(&mut self) -> Result<bool, BusError> {
        let ctrl = self.config.port.ctrl;
        debug!("halting CPU via control register 0x{ctrl:08x}");
        self.bus.write_io(ctrl, CpuControl::halt())?;

        for attempt in 0..self.config.halt_attempts {
            if self.is_stalled()? {
                debug!("CPU stalled after {} poll(s)", attempt + 1);
                self.state = SessionState::Halted;
                return Ok(true);
            }
        }
        debug!(
            "CPU did not stall after {} poll(s)",
            self.config.halt_attempts
        );
        self.state = SessionState::Halted;
        Ok(false)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn is_stalled(&mut self) -> Result<bool, BusError> {
        let word = self.bus.read_io(self.config.port.ctrl)?;
        Ok(CpuControl::is_stalled(word))
    }

    /// Read one CPU register through the debug port.
    ///
    /// Selects `reg` (which also holds the CPU halted), spins until the stall
    /// bit is set and then reads the data register.
    pub fn cmd_read(&mut self, reg: RegisterId) -> Result<u32, BusError> {
        let port = self.config.port;
        self.bus.write_io(port.ctrl, CpuControl::select(reg))?;

        let started = Instant::now();
        loop {
            if CpuControl::is_stalled(self.bus.read_io(port.ctrl)?) {
                break;
            }
            if let Some(limit) = self.config.stall_timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(BusError::StallTimeout {
                        select: reg.select(),
                        waited_ms: waited.as_millis() as u64,
                    });
                }
            }
        }

        let value = self.bus.read_io(port.data)?;
        trace!("{reg} = 0x{value:08x}");
        Ok(value)
    }

    /// Like [`cmd_read`](Self::cmd_read), but a device fault becomes part of
    /// the result and the bus fault flag is cleared.
    fn read_reading(&mut self, reg: RegisterId) -> Result<Reading, BusError> {
        match self.cmd_read(reg) {
            Ok(value) => Ok(Ok(value)),
            Err(BusError::Fault { address }) => {
                debug!("bus error reading {reg} (fault at 0x{address:08x})");
                self.bus.clear_fault();
                Ok(Err(RegisterFault {
                    register: reg,
                    address,
                }))
            }
            Err(err) => Err(err),
        }
    }

    fn read_bank(&mut self, mode: Mode) -> Result<[Reading; BANK_SIZE], BusError> {
        let mut bank = [Ok(0); BANK_SIZE];
        for (index, slot) in bank.iter_mut().enumerate() {
            *slot = self.read_reading(RegisterId::active(mode, index as u8))?;
        }
        Ok(bank)
    }

    fn fetch_stage(&mut self, stage: PipelineStage, pc: u32) -> Result<StageWord, BusError> {
        let address = stage.address(pc);
        let fetch = match self.bus.read_io(address) {
            Ok(word) => StageFetch::Word {
                word,
                mnemonic: self.decoder.decode(word),
            },
            Err(BusError::Fault { address: at }) => {
                debug!("pipeline fetch at 0x{address:08x} faulted");
                self.bus.clear_fault();
                StageFetch::BusError { address: at }
            }
            Err(err) => return Err(err),
        };
        Ok(StageWord {
            stage,
            address,
            fetch,
        })
    }

    /// Read every register and the pipeline of a halted CPU.
    pub fn read_snapshot(&mut self) -> Result<RegisterSnapshot, BusError> {
        let control = self.bus.read_io(self.config.port.ctrl)?;
        self.capture(control)
    }

    fn capture(&mut self, control: u32) -> Result<RegisterSnapshot, BusError> {
        let mut peripherals = BTreeMap::new();
        for peripheral in Peripheral::ALL {
            let reading = self.read_reading(RegisterId::Peripheral(peripheral))?;
            peripherals.insert(peripheral, reading);
        }

        let supervisor = self.read_bank(Mode::Supervisor)?;
        let user = self.read_bank(Mode::User)?;

        let mode = match supervisor[REG_CC as usize] {
            Ok(cc) => Mode::from_cc(cc),
            Err(_) => Mode::Supervisor,
        };

        let mut snapshot = RegisterSnapshot {
            control,
            supervisor,
            user,
            peripherals,
            pipeline: Vec::new(),
            mode,
        };
        match snapshot.pc() {
            Ok(pc) => {
                for stage in PipelineStage::ALL {
                    snapshot.pipeline.push(self.fetch_stage(stage, pc)?);
                }
            }
            Err(fault) => debug!("{} unreadable, pipeline not shown", fault.register),
        }
        Ok(snapshot)
    }

    /// Poll the CPU and build a new view if the display is out of date.
    ///
    /// Returns `None` when what is on the console is still accurate.
    pub fn refresh(&mut self) -> Result<Option<View>, BusError> {
        let control = self.bus.read_io(self.config.port.ctrl)?;

        if !CpuControl::is_stalled(control) {
            if self.shown == Shown::Running {
                return Ok(None);
            }
            self.shown = Shown::Running;
            return Ok(Some(View::Running));
        }

        if matches!(self.state, SessionState::Stepping | SessionState::Running) {
            self.state = SessionState::Halted;
        }
        if !self.dirty && self.shown == Shown::Snapshot {
            return Ok(None);
        }

        let snapshot = self.capture(control)?;
        if let Some(previous) = self.last_mode {
            if previous != snapshot.mode {
                debug!("mode changed from {previous} to {}", snapshot.mode);
            }
        }
        self.last_mode = Some(snapshot.mode);
        self.dirty = false;
        self.shown = Shown::Snapshot;
        Ok(Some(View::Halted(Box::new(snapshot))))
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Flow, BusError> {
        let ctrl = self.config.port.ctrl;
        debug!("command {command:?}");
        match command {
            Command::Go => {
                self.bus.write_io(ctrl, CpuControl::go())?;
                self.state = SessionState::Running;
                Ok(Flow::Exit)
            }
            Command::Quit => {
                self.state = SessionState::Terminated;
                Ok(Flow::Exit)
            }
            Command::Reset => {
                self.bus.write_io(ctrl, CpuControl::reset())?;
                self.state = SessionState::Halted;
                self.dirty = true;
                self.shown = Shown::Nothing;
                Ok(Flow::Clear)
            }
            Command::Step => {
                self.bus.write_io(ctrl, CpuControl::step())?;
                self.state = SessionState::Stepping;
                self.dirty = true;
                Ok(Flow::Continue)
            }
        }
    }

    /// Refresh, draw and dispatch keys until a command ends the session.
    pub fn run<C: Console>(&mut self, console: &mut C) -> Result<SessionState, MonitorError> {
        info!("debug session started");
        loop {
            if let Some(view) = self.refresh()? {
                console.draw(&Screen::from_view(&view))?;
            }

            let Some(key) = console.poll_key(self.config.poll_interval)? else {
                continue;
            };
            let Some(command) = Command::from_key(key) else {
                trace!("ignoring key {key:?}");
                continue;
            };
            match self.dispatch(command)? {
                Flow::Continue => {}
                Flow::Clear => console.clear()?,
                Flow::Exit => break,
            }
        }
        info!("debug session ended ({:?})", self.state);
        Ok(self.state)
    }
}

impl<B: DevBus, D: Decoder> Drop for Session<B, D> {
    fn drop(&mut self) {
        self.bus.close();
    }
}
