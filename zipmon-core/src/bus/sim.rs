//! Simulated debug port.
//!
//! `SimBus` answers the same control/data register protocol as the hardware
//! debug port, backed by a register file, a peripheral window and a block of
//! word-addressed memory loaded from an image. It does not execute
//! instructions: a single step only advances the active program counter and
//! the jiffies counter, which is enough to watch the pipeline display move.
//!
//! Faults can be injected per memory address or per register select code, and
//! the stall bit can be held low to model a hung device.

use super::{DebugPort, DevBus};
use crate::error::BusError;
use crate::image::{load_image, WordOrder};
use crate::regs::{ctrl, ConditionCodes, CpuStatus, Peripheral, RegisterId, PERIPHERAL_BASE};
use log::{debug, trace};
use std::collections::HashSet;
use std::path::Path;

const REGISTER_COUNT: usize = 32;
const PERIPHERAL_COUNT: usize = 16;

/// In-process model of a CPU debug port.
#[derive(Debug, Clone)]
pub struct SimBus {
    port: DebugPort,
    memory_base: u32,
    memory: Vec<u32>,
    registers: [u32; REGISTER_COUNT],
    peripherals: [u32; PERIPHERAL_COUNT],
    halted: bool,
    select: u8,
    stuck: bool,
    interrupt: bool,
    fault: bool,
    closed: bool,
    failing_addresses: HashSet<u32>,
    failing_selects: HashSet<u8>,
    commands: Vec<u32>,
}

impl SimBus {
    /// Simulated CPU running `memory` loaded at `memory_base`. The CPU starts
    /// out running with its supervisor PC at the load address.
    pub fn new(port: DebugPort, memory_base: u32, memory: Vec<u32>) -> Self {
        let mut registers = [0; REGISTER_COUNT];
        registers[15] = memory_base;
        Self {
            port,
            memory_base,
            memory,
            registers,
            peripherals: [0; PERIPHERAL_COUNT],
            halted: false,
            select: 0,
            stuck: false,
            interrupt: false,
            fault: false,
            closed: false,
            failing_addresses: HashSet::new(),
            failing_selects: HashSet::new(),
            commands: Vec::new(),
        }
    }

    /// Load an image file and simulate a CPU running it.
    pub fn open(
        port: DebugPort,
        image: &Path,
        memory_base: u32,
        order: WordOrder,
    ) -> Result<Self, BusError> {
        let memory = load_image(image, order)?;
        debug!(
            "simulated bus: {} words at 0x{memory_base:08x} from {}",
            memory.len(),
            image.display()
        );
        Ok(Self::new(port, memory_base, memory))
    }

    pub fn port(&self) -> DebugPort {
        self.port
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Every word written to the control register, oldest first.
    pub fn commands(&self) -> &[u32] {
        &self.commands
    }

    pub fn register(&self, reg: RegisterId) -> u32 {
        match reg {
            RegisterId::Peripheral(p) => self.peripherals[p.offset() as usize],
            _ => self.registers[reg.select() as usize],
        }
    }

    pub fn set_register(&mut self, reg: RegisterId, value: u32) {
        match reg {
            RegisterId::Peripheral(p) => self.peripherals[p.offset() as usize] = value,
            _ => self.registers[reg.select() as usize] = value,
        }
    }

    pub fn with_register(mut self, reg: RegisterId, value: u32) -> Self {
        self.set_register(reg, value);
        self
    }

    pub fn with_halted(mut self, halted: bool) -> Self {
        self.halted = halted;
        self
    }

    /// Make every access to `address` fault.
    pub fn fail_address(&mut self, address: u32) {
        self.failing_addresses.insert(address);
    }

    /// Make data-register reads fault while `reg` is selected.
    pub fn fail_register(&mut self, reg: RegisterId) {
        self.failing_selects.insert(reg.select());
    }

    /// Hold the stall bit low regardless of the halt request.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Let the CPU run without a debugger command (e.g. it was never halted).
    pub fn release(&mut self) {
        self.halted = false;
    }

    pub fn raise_interrupt(&mut self) {
        self.interrupt = true;
    }

    fn check_open(&self) -> Result<(), BusError> {
        if self.closed {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }

    fn fault_at(&mut self, address: u32) -> BusError {
        self.fault = true;
        BusError::Fault { address }
    }

    fn memory_index(&self, address: u32) -> Option<usize> {
        let offset = address.checked_sub(self.memory_base)? as usize;
        (offset < self.memory.len()).then_some(offset)
    }

    fn supervisor_cc(&self) -> ConditionCodes {
        ConditionCodes::from_bits(self.registers[14])
    }

    fn control_word(&self) -> u32 {
        let mut word = self.select as u32;
        if self.halted {
            word |= ctrl::HALT;
            if !self.stuck {
                word |= ctrl::STALL;
            }
        }
        let cc = self.supervisor_cc();
        if !cc.gie() {
            word |= CpuStatus::SUPERVISOR;
        }
        if cc.sleep() {
            word |= CpuStatus::SLEEPING;
        }
        if self.interrupt {
            word |= CpuStatus::EXTERNAL_INTERRUPT;
        }
        word
    }

    fn execute(&mut self, value: u32) {
        self.commands.push(value);
        if value & ctrl::RESET != 0 {
            self.registers = [0; REGISTER_COUNT];
            self.registers[15] = self.memory_base;
            self.peripherals = [0; PERIPHERAL_COUNT];
            self.halted = value & ctrl::HALT != 0;
            self.select = (value & ctrl::SELECT_MASK) as u8;
            debug!("simulated bus: reset, halted={}", self.halted);
        } else if value & ctrl::STEP != 0 {
            if self.halted {
                self.step();
            }
        } else if value & ctrl::HALT != 0 {
            self.halted = true;
            self.select = (value & ctrl::SELECT_MASK) as u8;
        } else {
            self.halted = false;
            debug!("simulated bus: CPU released");
        }
    }

    fn step(&mut self) {
        let pc = if self.supervisor_cc().gie() { 31 } else { 15 };
        self.registers[pc] = self.registers[pc].wrapping_add(1);
        let jiffies = Peripheral::Jiffies.offset() as usize;
        self.peripherals[jiffies] = self.peripherals[jiffies].wrapping_add(1);
        trace!("simulated bus: stepped to 0x{:08x}", self.registers[pc]);
    }

    fn read_selected(&mut self) -> Result<u32, BusError> {
        let select = self.select;
        if self.failing_selects.contains(&select) {
            return Err(self.fault_at(self.port.data));
        }
        match select as usize {
            n if n < REGISTER_COUNT => Ok(self.registers[n]),
            n if n < PERIPHERAL_BASE as usize + PERIPHERAL_COUNT => {
                Ok(self.peripherals[n - PERIPHERAL_BASE as usize])
            }
            _ => Err(self.fault_at(self.port.data)),
        }
    }

    fn write_selected(&mut self, value: u32) -> Result<(), BusError> {
        match self.select as usize {
            n if n < REGISTER_COUNT => self.registers[n] = value,
            n if n < PERIPHERAL_BASE as usize + PERIPHERAL_COUNT => {
                self.peripherals[n - PERIPHERAL_BASE as usize] = value
            }
            _ => return Err(self.fault_at(self.port.data)),
        }
        Ok(())
    }
}

impl DevBus for SimBus {
    fn write_io(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        self.check_open()?;
        if self.failing_addresses.contains(&address) {
            return Err(self.fault_at(address));
        }
        if address == self.port.ctrl {
            self.execute(value);
            return Ok(());
        }
        if address == self.port.data {
            return self.write_selected(value);
        }
        match self.memory_index(address) {
            Some(index) => {
                self.memory[index] = value;
                Ok(())
            }
            None => Err(self.fault_at(address)),
        }
    }

    fn read_io(&mut self, address: u32) -> Result<u32, BusError> {
        self.check_open()?;
        if self.failing_addresses.contains(&address) {
            return Err(self.fault_at(address));
        }
        if address == self.port.ctrl {
            return Ok(self.control_word());
        }
        if address == self.port.data {
            return self.read_selected();
        }
        match self.memory_index(address) {
            Some(index) => Ok(self.memory[index]),
            None => Err(self.fault_at(address)),
        }
    }

    fn poll(&mut self) -> Result<bool, BusError> {
        self.check_open()?;
        Ok(std::mem::take(&mut self.interrupt))
    }

    fn wait(&mut self) -> Result<(), BusError> {
        self.check_open()?;
        self.interrupt = false;
        Ok(())
    }

    fn has_fault(&self) -> bool {
        self.fault
    }

    fn clear_fault(&mut self) {
        self.fault = false;
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn kill(&mut self) {
        self.closed = true;
    }
}
