//! Register snapshot of a halted CPU.

use crate::decoder::Mnemonic;
use crate::regs::{
    ConditionCodes, CpuStatus, Mode, Peripheral, RegisterId, BANK_SIZE, REG_CC, REG_PC,
};
use std::collections::BTreeMap;

/// A register whose read faulted on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFault {
    pub register: RegisterId,
    /// Bus address the device reported for the fault.
    pub address: u32,
}

/// Value of one register, or the fault that prevented reading it.
pub type Reading = Result<u32, RegisterFault>;

/// The four in-flight instruction slots of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Instruction fetch, two words ahead of the PC.
    Fetch,
    Decode,
    /// The instruction at the PC.
    Operate,
    /// Align/writeback, one word behind the PC.
    Align,
}

impl PipelineStage {
    /// Display order, youngest instruction first.
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::Fetch,
        PipelineStage::Decode,
        PipelineStage::Operate,
        PipelineStage::Align,
    ];

    /// Word offset from the program counter.
    pub fn offset(self) -> i32 {
        match self {
            PipelineStage::Fetch => 2,
            PipelineStage::Decode => 1,
            PipelineStage::Operate => 0,
            PipelineStage::Align => -1,
        }
    }

    /// Instruction address held by this stage when the PC is `pc`.
    pub fn address(self, pc: u32) -> u32 {
        pc.wrapping_add_signed(self.offset())
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::Fetch => "I ",
            PipelineStage::Decode => "Dc",
            PipelineStage::Operate => "Op",
            PipelineStage::Align => "Al",
        }
    }
}

/// Stage addresses for a given program counter, in display order.
pub fn pipeline_addresses(pc: u32) -> [(PipelineStage, u32); 4] {
    PipelineStage::ALL.map(|stage| (stage, stage.address(pc)))
}

/// Result of reading a stage's instruction word from memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageFetch {
    Word { word: u32, mnemonic: Mnemonic },
    /// The memory read faulted; the device reported `address`.
    BusError { address: u32 },
}

/// One pipeline stage as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWord {
    pub stage: PipelineStage,
    pub address: u32,
    pub fetch: StageFetch,
}

/// Everything read from the CPU during one halted refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSnapshot {
    /// Control/status word seen when the refresh started.
    pub control: u32,
    pub supervisor: [Reading; BANK_SIZE],
    pub user: [Reading; BANK_SIZE],
    pub peripherals: BTreeMap<Peripheral, Reading>,
    /// Empty when the active program counter could not be read.
    pub pipeline: Vec<StageWord>,
    /// Bank made active by the supervisor GIE flag.
    pub mode: Mode,
}

impl RegisterSnapshot {
    pub fn bank(&self, mode: Mode) -> &[Reading; BANK_SIZE] {
        match mode {
            Mode::Supervisor => &self.supervisor,
            Mode::User => &self.user,
        }
    }

    /// Value of any register captured in this snapshot.
    pub fn register(&self, reg: RegisterId) -> Option<Reading> {
        match reg {
            RegisterId::Supervisor(n) => self.supervisor.get(n as usize).copied(),
            RegisterId::User(n) => self.user.get(n as usize).copied(),
            RegisterId::Peripheral(p) => self.peripherals.get(&p).copied(),
        }
    }

    /// Program counter of the active bank.
    pub fn pc(&self) -> Reading {
        self.bank(self.mode)[REG_PC as usize]
    }

    pub fn condition_codes(&self, mode: Mode) -> Option<ConditionCodes> {
        self.bank(mode)[REG_CC as usize]
            .ok()
            .map(ConditionCodes::from_bits)
    }

    pub fn status(&self) -> CpuStatus {
        CpuStatus::from_control(self.control)
    }

    /// Every register read that faulted, in read order.
    pub fn faults(&self) -> Vec<RegisterFault> {
        self.peripherals
            .values()
            .chain(self.supervisor.iter())
            .chain(self.user.iter())
            .filter_map(|reading| reading.err())
            .collect()
    }
}
