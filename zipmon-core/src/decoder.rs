//! Zip CPU Instruction Decoder
//!
//! Turns one 32-bit instruction word into printable mnemonic text. The
//! decoder is a pure function of the word; nothing here touches the bus.
//!
//! # Encoding
//! Every instruction shares the same outer layout:
//!
//! ```text
//!  31   28 27   24 23 21  20  19   16 15                 0
//! +-------+-------+-----+---+-------+--------------------+
//! |  op   |   A   | cnd | B?|   B   |     immediate      |
//! +-------+-------+-----+---+-------+--------------------+
//! ```
//!
//! - With bit 20 set the operand is `$imm16 + B`, otherwise it is a 20-bit
//!   signed immediate spanning bits 19..0.
//! - `LDI` uses bits 23..0 as a 24-bit signed immediate and has no condition.
//! - `MOV` reuses bit 20 as "A is a user register", bit 15 as "B is a user
//!   register" and keeps a 15-bit immediate.
//! - Opcode 4 is the special group: `NOOP`, `BREAK`, `LDIHI`/`LDILO` and `MPY`.
//!
//! Aliases (`BRA`, `JMP`, `CLR`, `HALT`, `RTU`, `LJMP`) are printed as the
//! primary line with the canonical form on the alternate line.

/// Decoded text for one instruction word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mnemonic {
    /// Main disassembly line.
    pub primary: String,
    /// Second line, present when the primary line is an alias.
    pub alternate: Option<String>,
}

impl Mnemonic {
    fn plain(primary: String) -> Self {
        Self {
            primary,
            alternate: None,
        }
    }

    fn alias(primary: String, canonical: String) -> Self {
        Self {
            primary,
            alternate: Some(canonical),
        }
    }

    /// Alternate line, or `None` if it is missing or empty.
    pub fn alternate_line(&self) -> Option<&str> {
        self.alternate.as_deref().filter(|line| !line.is_empty())
    }
}

/// Anything that can turn an instruction word into mnemonic text.
pub trait Decoder {
    fn decode(&self, word: u32) -> Mnemonic;
}

impl<D: Decoder + ?Sized> Decoder for &D {
    fn decode(&self, word: u32) -> Mnemonic {
        (**self).decode(word)
    }
}

/// Primary opcode field (bits 31..28).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Cmp = 0x0,
    Tst = 0x1,
    Mov = 0x2,
    Ldi = 0x3,
    Special = 0x4,
    Rol = 0x5,
    Lod = 0x6,
    Sto = 0x7,
    Sub = 0x8,
    And = 0x9,
    Add = 0xa,
    Or = 0xb,
    Xor = 0xc,
    Lsl = 0xd,
    Asr = 0xe,
    Lsr = 0xf,
}

impl Opcode {
    pub fn from_word(word: u32) -> Self {
        match word >> 28 {
            0x0 => Opcode::Cmp,
            0x1 => Opcode::Tst,
            0x2 => Opcode::Mov,
            0x3 => Opcode::Ldi,
            0x4 => Opcode::Special,
            0x5 => Opcode::Rol,
            0x6 => Opcode::Lod,
            0x7 => Opcode::Sto,
            0x8 => Opcode::Sub,
            0x9 => Opcode::And,
            0xa => Opcode::Add,
            0xb => Opcode::Or,
            0xc => Opcode::Xor,
            0xd => Opcode::Lsl,
            0xe => Opcode::Asr,
            _ => Opcode::Lsr,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Cmp => "CMP",
            Opcode::Tst => "TST",
            Opcode::Mov => "MOV",
            Opcode::Ldi => "LDI",
            Opcode::Special => "MPY",
            Opcode::Rol => "ROL",
            Opcode::Lod => "LOD",
            Opcode::Sto => "STO",
            Opcode::Sub => "SUB",
            Opcode::And => "AND",
            Opcode::Add => "ADD",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Lsl => "LSL",
            Opcode::Asr => "ASR",
            Opcode::Lsr => "LSR",
        }
    }
}

/// Condition field (bits 23..21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Condition {
    Always = 0,
    Zero = 1,
    NotZero = 2,
    GreaterEqual = 3,
    GreaterThan = 4,
    LessThan = 5,
    Carry = 6,
    Overflow = 7,
}

impl Condition {
    pub fn from_word(word: u32) -> Self {
        match (word >> 21) & 7 {
            0 => Condition::Always,
            1 => Condition::Zero,
            2 => Condition::NotZero,
            3 => Condition::GreaterEqual,
            4 => Condition::GreaterThan,
            5 => Condition::LessThan,
            6 => Condition::Carry,
            _ => Condition::Overflow,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Always => "",
            Condition::Zero => ".Z",
            Condition::NotZero => ".NE",
            Condition::GreaterEqual => ".GE",
            Condition::GreaterThan => ".GT",
            Condition::LessThan => ".LT",
            Condition::Carry => ".C",
            Condition::Overflow => ".V",
        }
    }

    fn branch(self) -> &'static str {
        match self {
            Condition::Always => "BRA",
            Condition::Zero => "BRZ",
            Condition::NotZero => "BNE",
            Condition::GreaterEqual => "BGE",
            Condition::GreaterThan => "BGT",
            Condition::LessThan => "BLT",
            Condition::Carry => "BRC",
            Condition::Overflow => "BRV",
        }
    }
}

const REG_SP: u32 = 13;
const REG_CC: u32 = 14;
const REG_PC: u32 = 15;

/// Register name as printed in disassembly (`R0`..`R12`, `SP`, `CC`, `PC`).
pub fn register_name(reg: u32, user: bool) -> String {
    let base = match reg & 0xf {
        REG_SP => "SP".to_string(),
        REG_CC => "CC".to_string(),
        REG_PC => "PC".to_string(),
        n => format!("R{n}"),
    };
    if user {
        format!("u{base}")
    } else {
        base
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn field(word: u32, shift: u32, mask: u32) -> u32 {
    (word >> shift) & mask
}

/// `$imm+Rb`, `Rb` or `$imm` depending on the B-present bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Operand {
    reg: Option<u32>,
    imm: i32,
}

impl Operand {
    fn from_word(word: u32) -> Self {
        if word & (1 << 20) != 0 {
            Self {
                reg: Some(field(word, 16, 0xf)),
                imm: sign_extend(word & 0xffff, 16),
            }
        } else {
            Self {
                reg: None,
                imm: sign_extend(word & 0xf_ffff, 20),
            }
        }
    }

    fn value(&self) -> String {
        match self.reg {
            Some(reg) if self.imm == 0 => register_name(reg, false),
            Some(reg) => format!("${}+{}", self.imm, register_name(reg, false)),
            None => format!("${}", self.imm),
        }
    }

    fn address(&self) -> String {
        match self.reg {
            Some(reg) if self.imm == 0 => format!("({})", register_name(reg, false)),
            Some(reg) => format!("${}({})", self.imm, register_name(reg, false)),
            None => format!("(${})", self.imm),
        }
    }
}

fn line(name: &str, cond: Condition, operands: &str) -> String {
    let op = format!("{name}{}", cond.suffix());
    if operands.is_empty() {
        op
    } else {
        format!("{op:<8}{operands}")
    }
}

/// Decoder for the Zip CPU instruction set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipDecoder;

impl ZipDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_mov(word: u32, cond: Condition) -> Mnemonic {
        let a = field(word, 24, 0xf);
        let a_user = word & (1 << 20) != 0;
        let b = field(word, 16, 0xf);
        let b_user = word & (1 << 15) != 0;
        let imm = sign_extend(word & 0x7fff, 15);

        let source_reg = register_name(b, b_user);
        let source = if imm == 0 {
            source_reg.clone()
        } else {
            format!("${imm}+{source_reg}")
        };
        let canonical = line(
            "MOV",
            cond,
            &format!("{source},{}", register_name(a, a_user)),
        );

        if a == REG_PC && !a_user {
            if b == REG_PC && !b_user {
                let primary = format!("{:<8}${imm}", cond.branch());
                return Mnemonic::alias(primary, canonical);
            }
            if !b_user {
                return Mnemonic::alias(line("JMP", cond, &source), canonical);
            }
        }
        Mnemonic::plain(canonical)
    }

    fn decode_special(word: u32, cond: Condition) -> Mnemonic {
        let a = field(word, 24, 0xf);
        match a {
            0xe if word & 0x00ff_ffff == 0 => Mnemonic::plain("NOOP".to_string()),
            0xd => Mnemonic::plain(format!("{:<8}${}", "BREAK", word & 0x00ff_ffff)),
            0xf => {
                let name = if word & (1 << 20) != 0 { "LDIHI" } else { "LDILO" };
                let reg = field(word, 16, 0xf);
                Mnemonic::plain(line(
                    name,
                    cond,
                    &format!("$0x{:04x},{}", word & 0xffff, register_name(reg, false)),
                ))
            }
            _ => {
                let operand = Operand::from_word(word);
                Mnemonic::plain(line(
                    Opcode::Special.name(),
                    cond,
                    &format!("{},{}", operand.value(), register_name(a, false)),
                ))
            }
        }
    }

    fn decode_alu(op: Opcode, word: u32, cond: Condition) -> Mnemonic {
        let a = field(word, 24, 0xf);
        let operand = Operand::from_word(word);
        let target = register_name(a, false);
        let canonical = line(op.name(), cond, &format!("{},{target}", operand.value()));

        match op {
            Opcode::Xor if operand.reg == Some(a) && operand.imm == 0 => {
                Mnemonic::alias(line("CLR", cond, &target), canonical)
            }
            Opcode::Or if a == REG_CC && operand.reg.is_none() && operand.imm == 0x10 => {
                Mnemonic::alias(line("HALT", cond, ""), canonical)
            }
            Opcode::Or if a == REG_CC && operand.reg.is_none() && operand.imm == 0x20 => {
                Mnemonic::alias(line("RTU", cond, ""), canonical)
            }
            Opcode::Add if a == REG_PC && operand.reg.is_none() => Mnemonic::alias(
                line("LJMP", cond, &format!("${}+PC", operand.imm)),
                canonical,
            ),
            _ => Mnemonic::plain(canonical),
        }
    }
}

impl Decoder for ZipDecoder {
    fn decode(&self, word: u32) -> Mnemonic {
        let op = Opcode::from_word(word);
        let cond = Condition::from_word(word);
        let a = field(word, 24, 0xf);

        match op {
            Opcode::Ldi => {
                let imm = sign_extend(word & 0x00ff_ffff, 24);
                Mnemonic::plain(line(
                    "LDI",
                    Condition::Always,
                    &format!("${imm},{}", register_name(a, false)),
                ))
            }
            Opcode::Mov => Self::decode_mov(word, cond),
            Opcode::Special => Self::decode_special(word, cond),
            Opcode::Lod => {
                let operand = Operand::from_word(word);
                Mnemonic::plain(line(
                    "LOD",
                    cond,
                    &format!("{},{}", operand.address(), register_name(a, false)),
                ))
            }
            Opcode::Sto => {
                let operand = Operand::from_word(word);
                Mnemonic::plain(line(
                    "STO",
                    cond,
                    &format!("{},{}", register_name(a, false), operand.address()),
                ))
            }
            _ => Self::decode_alu(op, word, cond),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(word: u32) -> Mnemonic {
        ZipDecoder::new().decode(word)
    }

    #[test]
    fn test_decode_compare() {
        let m = decode(0x0e0f_ffff);
        assert_eq!(m.primary, "CMP     $-1,CC");
        assert!(m.alternate.is_none());
    }

    #[test]
    fn test_decode_branch_alias() {
        let m = decode(0x2f0f_7fff);
        assert_eq!(m.primary, "BRA     $-1");
        assert_eq!(m.alternate_line(), Some("MOV     $-1+PC,PC"));

        let m = decode(0x2f2f_7fff);
        assert!(m.primary.starts_with("BRZ"));
        let m = decode(0x2f4f_7fff);
        assert!(m.primary.starts_with("BNE"));
    }

    #[test]
    fn test_decode_jump_through_register() {
        let m = decode(0x2f00_7fff);
        assert_eq!(m.primary, "JMP     $-1+R0");
    }

    #[test]
    fn test_decode_user_move_has_no_alias() {
        let m = decode(0x2f4f_ffff);
        assert_eq!(m.primary, "MOV.NE  $-1+uPC,PC");
        assert!(m.alternate.is_none());

        let m = decode(0x2510_0377);
        assert_eq!(m.primary, "MOV     $887+R0,uR5");
    }

    #[test]
    fn test_decode_halt_and_rtu() {
        assert_eq!(decode(0xbe00_0010).primary, "HALT");
        assert_eq!(decode(0xbe00_0020).primary, "RTU");
        assert_eq!(
            decode(0xbe00_0010).alternate_line(),
            Some("OR      $16,CC")
        );
    }

    #[test]
    fn test_decode_clear() {
        let m = decode(0xc616_0000);
        assert_eq!(m.primary, "CLR     R6");
        assert_eq!(m.alternate_line(), Some("XOR     R6,R6"));
    }

    #[test]
    fn test_decode_special_group() {
        assert_eq!(decode(0x4e00_0000).primary, "NOOP");
        assert_eq!(decode(0x4f0c_0001).primary, "LDILO   $0x0001,R12");
        assert_eq!(decode(0x4f1d_0001).primary, "LDIHI   $0x0001,SP");
    }

    #[test]
    fn test_decode_memory_ops() {
        assert_eq!(decode(0x601f_0007).primary, "LOD     $7(PC),R0");
        assert_eq!(decode(0x60df_000f).primary, "LOD.C   $15(PC),R0");
        assert_eq!(decode(0x701f_0000).primary, "STO     R0,(PC)");
        assert_eq!(decode(0x7000_0007).primary, "STO     R0,($7)");
    }

    #[test]
    fn test_decode_ldi_sign_extends() {
        assert_eq!(decode(0x32ff_ffff).primary, "LDI     $-1,R2");
        assert_eq!(decode(0x3300_0010).primary, "LDI     $16,R3");
    }

    #[test]
    fn test_register_names() {
        assert_eq!(register_name(0, false), "R0");
        assert_eq!(register_name(13, false), "SP");
        assert_eq!(register_name(14, true), "uCC");
        assert_eq!(register_name(15, false), "PC");
    }
}
