//! Register Bank Model
//!
//! The debug port reaches CPU state through a 6-bit register select code
//! written into the control register:
//!
//! | select  | register                                   |
//! |---------|--------------------------------------------|
//! | 0..=15  | supervisor bank `sR0`..`sR12`, `sSP`, `sCC`, `sPC` |
//! | 16..=31 | user bank `uR0`..`uR12`, `uSP`, `uCC`, `uPC`       |
//! | 32..    | peripheral window (PIC, watchdog, timers, ...)     |
//!
//! Two ways of naming a general register exist and must not be mixed up:
//! [`RegisterId::active`] resolves offset `n` inside whichever bank the given
//! [`Mode`] makes current, while [`RegisterId::Supervisor`] and
//! [`RegisterId::User`] always name one bank explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control register command bits.
pub mod ctrl {
    /// Release the CPU (no bits set).
    pub const GO: u32 = 0x0000;
    pub const RESET: u32 = 0x0040;
    pub const INT: u32 = 0x0080;
    pub const STEP: u32 = 0x0100;
    /// Read-only: set while the CPU is halted and registers may be read.
    pub const STALL: u32 = 0x0200;
    pub const HALT: u32 = 0x0400;
    pub const CLEAR_CACHE: u32 = 0x0800;
    /// Register select field, valid together with `HALT`.
    pub const SELECT_MASK: u32 = 0x003f;
}

/// Number of general registers per bank.
pub const BANK_SIZE: usize = 16;
/// Select code of the first peripheral register.
pub const PERIPHERAL_BASE: u8 = 32;

pub const REG_SP: u8 = 13;
pub const REG_CC: u8 = 14;
pub const REG_PC: u8 = 15;

/// Which register bank is architecturally active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Supervisor,
    User,
}

impl Mode {
    /// Mode selected by the supervisor condition codes (GIE set means user).
    pub fn from_cc(cc: u32) -> Self {
        if ConditionCodes::from_bits(cc).gie() {
            Mode::User
        } else {
            Mode::Supervisor
        }
    }

    pub fn is_user(self) -> bool {
        self == Mode::User
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Supervisor => write!(f, "supervisor"),
            Mode::User => write!(f, "user"),
        }
    }
}

/// Peripheral registers visible through the debug port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Peripheral {
    /// Primary interrupt controller.
    Pic,
    Watchdog,
    CacheStatus,
    /// Secondary interrupt controller.
    Pic2,
    TimerA,
    TimerB,
    TimerC,
    Jiffies,
    UserTaskCount,
    UserMasterCount,
    UserProcessCount,
    UserAuxCount,
}

impl Peripheral {
    /// All peripherals in display order.
    pub const ALL: [Peripheral; 12] = [
        Peripheral::Pic,
        Peripheral::Watchdog,
        Peripheral::CacheStatus,
        Peripheral::Pic2,
        Peripheral::TimerA,
        Peripheral::TimerB,
        Peripheral::TimerC,
        Peripheral::Jiffies,
        Peripheral::UserTaskCount,
        Peripheral::UserMasterCount,
        Peripheral::UserProcessCount,
        Peripheral::UserAuxCount,
    ];

    /// Offset inside the peripheral window.
    pub fn offset(self) -> u8 {
        match self {
            Peripheral::Pic => 0,
            Peripheral::Watchdog => 1,
            Peripheral::CacheStatus => 2,
            Peripheral::Pic2 => 3,
            Peripheral::TimerA => 4,
            Peripheral::TimerB => 5,
            Peripheral::TimerC => 6,
            Peripheral::Jiffies => 7,
            Peripheral::UserTaskCount => 12,
            Peripheral::UserMasterCount => 13,
            Peripheral::UserProcessCount => 14,
            Peripheral::UserAuxCount => 15,
        }
    }

    pub fn from_offset(offset: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.offset() == offset)
    }

    /// Four-character screen label.
    pub fn label(self) -> &'static str {
        match self {
            Peripheral::Pic => "PIC ",
            Peripheral::Watchdog => "WDT ",
            Peripheral::CacheStatus => "CACH",
            Peripheral::Pic2 => "PIC2",
            Peripheral::TimerA => "TMRA",
            Peripheral::TimerB => "TMRB",
            Peripheral::TimerC => "TMRC",
            Peripheral::Jiffies => "JIF ",
            Peripheral::UserTaskCount => "UTSK",
            Peripheral::UserMasterCount => "UMST",
            Peripheral::UserProcessCount => "UPST",
            Peripheral::UserAuxCount => "UAST",
        }
    }
}

/// A register reachable through the debug port's select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterId {
    Supervisor(u8),
    User(u8),
    Peripheral(Peripheral),
}

impl RegisterId {
    /// General register `index` of the bank that is current in `mode`.
    pub fn active(mode: Mode, index: u8) -> Self {
        match mode {
            Mode::Supervisor => RegisterId::Supervisor(index & 0xf),
            Mode::User => RegisterId::User(index & 0xf),
        }
    }

    /// Program counter of the bank that is current in `mode`.
    pub fn pc(mode: Mode) -> Self {
        Self::active(mode, REG_PC)
    }

    /// Condition codes of the bank that is current in `mode`.
    pub fn cc(mode: Mode) -> Self {
        Self::active(mode, REG_CC)
    }

    /// Value for the control register's select field.
    pub fn select(self) -> u8 {
        match self {
            RegisterId::Supervisor(n) => n & 0xf,
            RegisterId::User(n) => 16 + (n & 0xf),
            RegisterId::Peripheral(p) => PERIPHERAL_BASE + p.offset(),
        }
    }

    pub fn from_select(select: u8) -> Option<Self> {
        match select {
            0..=15 => Some(RegisterId::Supervisor(select)),
            16..=31 => Some(RegisterId::User(select - 16)),
            _ => Peripheral::from_offset(select.checked_sub(PERIPHERAL_BASE)?)
                .map(RegisterId::Peripheral),
        }
    }

    /// Screen label, e.g. `sR4 `, `uSP `, `sPC `, `TMRA`.
    pub fn label(self) -> String {
        let (prefix, n) = match self {
            RegisterId::Supervisor(n) => ('s', n & 0xf),
            RegisterId::User(n) => ('u', n & 0xf),
            RegisterId::Peripheral(p) => return p.label().to_string(),
        };
        let name = match n {
            REG_SP => "SP".to_string(),
            REG_CC => "CC".to_string(),
            REG_PC => "PC".to_string(),
            _ => format!("R{n}"),
        };
        format!("{prefix}{name:<3}")
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().trim_end())
    }
}

/// Builds control register words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuControl;

impl CpuControl {
    /// Halt the CPU and select `reg` for the data register.
    pub fn select(reg: RegisterId) -> u32 {
        ctrl::HALT | (reg.select() as u32 & ctrl::SELECT_MASK)
    }

    pub fn halt() -> u32 {
        ctrl::HALT
    }

    pub fn go() -> u32 {
        ctrl::GO
    }

    pub fn step() -> u32 {
        ctrl::STEP
    }

    /// Reset, leaving the CPU halted afterwards.
    pub fn reset() -> u32 {
        ctrl::RESET | ctrl::HALT
    }

    pub fn is_stalled(word: u32) -> bool {
        word & ctrl::STALL != 0
    }
}

/// Status bits reported in the upper half of the control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuStatus(u32);

impl CpuStatus {
    pub const EXTERNAL_INTERRUPT: u32 = 0x1_0000;
    pub const BREAK_ENABLED: u32 = 0x8000;
    pub const SUPERVISOR: u32 = 0x2000;
    pub const SLEEPING: u32 = 0x1000;

    pub fn from_control(word: u32) -> Self {
        Self(word)
    }

    /// Text for the "CPU State:" header, one word per set flag.
    pub fn describe(self) -> String {
        const FLAGS: [(u32, &str); 4] = [
            (CpuStatus::EXTERNAL_INTERRUPT, "EXT-INT "),
            (CpuStatus::SUPERVISOR, "Supervisor Mod "),
            (CpuStatus::SLEEPING, "Sleeping "),
            (CpuStatus::BREAK_ENABLED, "Break-Enabled "),
        ];
        FLAGS
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, text)| *text)
            .collect()
    }
}

/// One condition-code flag and how it is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpec {
    pub bit: u32,
    pub token: &'static str,
}

/// Flags in display order; tokens are printed as-is or as blanks of equal width.
pub const CC_FLAGS: [FlagSpec; 7] = [
    FlagSpec { bit: 0x40, token: "STP" },
    FlagSpec { bit: 0x20, token: "GIE" },
    FlagSpec { bit: 0x10, token: "SLP" },
    FlagSpec { bit: 0x08, token: "V" },
    FlagSpec { bit: 0x04, token: "N" },
    FlagSpec { bit: 0x02, token: "C" },
    FlagSpec { bit: 0x01, token: "Z" },
];

/// Decoded condition-code register (`sCC` / `uCC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConditionCodes {
    bits: u32,
}

impl ConditionCodes {
    pub const Z: u32 = 0x01;
    pub const C: u32 = 0x02;
    pub const N: u32 = 0x04;
    pub const V: u32 = 0x08;
    pub const SLP: u32 = 0x10;
    pub const GIE: u32 = 0x20;
    pub const STP: u32 = 0x40;

    pub fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    pub fn bits(self) -> u32 {
        self.bits
    }

    pub fn zero(self) -> bool {
        self.bits & Self::Z != 0
    }

    pub fn carry(self) -> bool {
        self.bits & Self::C != 0
    }

    pub fn negative(self) -> bool {
        self.bits & Self::N != 0
    }

    pub fn overflow(self) -> bool {
        self.bits & Self::V != 0
    }

    pub fn sleep(self) -> bool {
        self.bits & Self::SLP != 0
    }

    pub fn gie(self) -> bool {
        self.bits & Self::GIE != 0
    }

    pub fn step(self) -> bool {
        self.bits & Self::STP != 0
    }

    /// Flag string such as `   GIE      Z`.
    pub fn flags(self) -> String {
        CC_FLAGS
            .iter()
            .map(|flag| {
                if self.bits & flag.bit != 0 {
                    flag.token.to_string()
                } else {
                    " ".repeat(flag.token.len())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_codes() {
        assert_eq!(RegisterId::Supervisor(0).select(), 0);
        assert_eq!(RegisterId::Supervisor(15).select(), 15);
        assert_eq!(RegisterId::User(0).select(), 16);
        assert_eq!(RegisterId::User(15).select(), 31);
        assert_eq!(RegisterId::Peripheral(Peripheral::Pic).select(), 32);
        assert_eq!(RegisterId::Peripheral(Peripheral::Jiffies).select(), 39);
        assert_eq!(RegisterId::Peripheral(Peripheral::UserAuxCount).select(), 47);
    }

    #[test]
    fn test_select_round_trips_for_every_known_register() {
        for select in 0u8..48 {
            if let Some(reg) = RegisterId::from_select(select) {
                assert_eq!(reg.select(), select);
            }
        }
        assert_eq!(RegisterId::from_select(40), None);
    }

    #[test]
    fn test_active_and_explicit_addressing_differ() {
        assert_eq!(RegisterId::active(Mode::Supervisor, 3), RegisterId::Supervisor(3));
        assert_eq!(RegisterId::active(Mode::User, 3), RegisterId::User(3));
        assert_eq!(RegisterId::pc(Mode::User).select(), 31);
        assert_eq!(RegisterId::pc(Mode::Supervisor).select(), 15);
        assert_eq!(RegisterId::cc(Mode::User), RegisterId::User(14));
        assert_eq!(RegisterId::cc(Mode::Supervisor).label(), "sCC ");
    }

    #[test]
    fn test_labels() {
        assert_eq!(RegisterId::Supervisor(4).label(), "sR4 ");
        assert_eq!(RegisterId::Supervisor(10).label(), "sR10");
        assert_eq!(RegisterId::User(13).label(), "uSP ");
        assert_eq!(RegisterId::User(15).label(), "uPC ");
        assert_eq!(RegisterId::Peripheral(Peripheral::TimerA).label(), "TMRA");
    }

    #[test]
    fn test_control_words() {
        assert_eq!(CpuControl::select(RegisterId::User(2)), 0x0400 | 18);
        assert_eq!(CpuControl::reset(), 0x0440);
        assert_eq!(CpuControl::go(), 0);
        assert!(CpuControl::is_stalled(0x0600));
        assert!(!CpuControl::is_stalled(0x0400));
    }

    #[test]
    fn test_condition_code_flags() {
        let cc = ConditionCodes::from_bits(0b010_0001);
        assert!(cc.gie());
        assert!(cc.zero());
        assert!(!cc.carry());
        assert_eq!(cc.flags(), "   GIE      Z");
        assert_eq!(Mode::from_cc(0b010_0001), Mode::User);
        assert_eq!(Mode::from_cc(0b000_0001), Mode::Supervisor);
        assert_eq!(ConditionCodes::from_bits(0).flags(), " ".repeat(13));
        assert_eq!(ConditionCodes::from_bits(0x7f).flags(), "STPGIESLPVNCZ");
    }

    #[test]
    fn test_cpu_status_description() {
        let status = CpuStatus::from_control(CpuStatus::SUPERVISOR | CpuStatus::SLEEPING);
        assert_eq!(status.describe(), "Supervisor Mod Sleeping ");
        assert_eq!(CpuStatus::default().describe(), "");
    }
}
