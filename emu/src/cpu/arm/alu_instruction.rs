use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl Display for ArmModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Sub => f.write_str("SUB"),
            Self::Rsb => f.write_str("RSB"),
            Self::Add => f.write_str("ADD"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Rsc => f.write_str("RSC"),
            Self::Tst => f.write_str("TST"),
            Self::Teq => f.write_str("TEQ"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mov => f.write_str("MOV"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

#[derive(Eq, PartialEq, Debug)]
pub enum AluInstructionKind {
    Logical,
    Arithmetic,
}

pub trait Kind {
    fn kind(&self) -> AluInstructionKind;
}

impl Kind for ArmModeAluInstruction {
    fn kind(&self) -> AluInstructionKind {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        match &self {
            And | Eor | Tst | Teq | Orr | Mov | Bic | Mvn => AluInstructionKind::Logical,
            Sub | Rsb | Add | Adc | Sbc | Rsc | Cmp | Cmn => AluInstructionKind::Arithmetic,
        }
    }
}

impl ArmModeAluInstruction {
    /// TST, TEQ, CMP and CMN only update flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }

    /// MOV and MVN ignore the first operand.
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(self, Self::Mov | Self::Mvn)
    }
}

impl From<u32> for ArmModeAluInstruction {
    /// Only the low nibble is considered.
    fn from(alu_op_code: u32) -> Self {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mov,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

/// Where a shift amount comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftOperator {
    /// 5-bit amount encoded in the instruction.
    Immediate(u32),

    /// Low byte of a register.
    Register(usize),
}

/// Second operand of a data processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: usize,
    },
    Immediate {
        base: u32,
        /// Rotate-right amount, already doubled.
        shift: u32,
    },
}

impl Display for AluSecondOperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { base, shift } => write!(f, "#{}", base.rotate_right(*shift)),
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind: ShiftKind::Lsl,
                register,
            } => write!(f, "R{register}"),
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind: ShiftKind::Ror,
                register,
            } => write!(f, "R{register}, RRX"),
            Self::Register {
                shift_op: ShiftOperator::Immediate(amount),
                shift_kind,
                register,
            } => {
                // LSR/ASR #0 encode #32
                let amount = if *amount == 0 { 32 } else { *amount };
                write!(f, "R{register}, {shift_kind} #{amount}")
            }
            Self::Register {
                shift_op: ShiftOperator::Register(rs),
                shift_kind,
                register,
            } => write!(f, "R{register}, {shift_kind} R{rs}"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

impl ArithmeticOpResult {
    const fn new(result: u32, carry: bool, overflow: bool) -> Self {
        Self {
            result,
            carry,
            overflow,
            sign: result >> 31 == 1,
            zero: result == 0,
        }
    }
}

/// `first + second + carry_in`, with C set on unsigned overflow and V set
/// when both operands share a sign the result does not.
#[must_use]
pub fn add_with_carry(first: u32, second: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = u64::from(first) + u64::from(second) + u64::from(carry_in);
    let result = wide as u32;
    let overflow = ((first ^ result) & (second ^ result)).get_bit(31);

    ArithmeticOpResult::new(result, wide > u64::from(u32::MAX), overflow)
}

/// `first - second - !carry_in`. C is the inverted borrow, V is set when
/// the operands differ in sign and the result's sign differs from `first`.
#[must_use]
pub fn sub_with_carry(first: u32, second: u32, carry_in: bool) -> ArithmeticOpResult {
    let borrow_in = u64::from(!carry_in);
    let result = first.wrapping_sub(second).wrapping_sub(u32::from(!carry_in));
    let carry = u64::from(first) >= u64::from(second) + borrow_in;
    let overflow = ((first ^ second) & (first ^ result)).get_bit(31);

    ArithmeticOpResult::new(result, carry, overflow)
}

/// Output of the barrel shifter. `carry` is `None` when the shift leaves the
/// C flag untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftResult {
    pub result: u32,
    pub carry: Option<bool>,
}

impl ShiftResult {
    const fn unchanged(result: u32) -> Self {
        Self {
            result,
            carry: None,
        }
    }

    const fn with_carry(result: u32, carry: bool) -> Self {
        Self {
            result,
            carry: Some(carry),
        }
    }
}

/// Shift `rm` by a register-specified `shift_amount` (the full low byte of Rs).
/// An amount of 0 leaves both value and carry untouched.
#[must_use]
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32) -> ShiftResult {
    if shift_amount == 0 {
        return ShiftResult::unchanged(rm);
    }

    match kind {
        ShiftKind::Lsl => match shift_amount {
            1..=31 => ShiftResult::with_carry(
                rm << shift_amount,
                rm.get_bit((32 - shift_amount) as u8),
            ),
            32 => ShiftResult::with_carry(0, rm.get_bit(0)),
            _ => ShiftResult::with_carry(0, false),
        },
        ShiftKind::Lsr => match shift_amount {
            1..=31 => ShiftResult::with_carry(
                rm >> shift_amount,
                rm.get_bit((shift_amount - 1) as u8),
            ),
            32 => ShiftResult::with_carry(0, rm.get_bit(31)),
            _ => ShiftResult::with_carry(0, false),
        },
        ShiftKind::Asr => match shift_amount {
            1..=31 => ShiftResult::with_carry(
                ((rm as i32) >> shift_amount) as u32,
                rm.get_bit((shift_amount - 1) as u8),
            ),
            _ => ShiftResult::with_carry(((rm as i32) >> 31) as u32, rm.get_bit(31)),
        },
        ShiftKind::Ror => {
            let amount = shift_amount % 32;
            if amount == 0 {
                // ROR by a multiple of 32 keeps the value, carry is bit 31.
                ShiftResult::with_carry(rm, rm.get_bit(31))
            } else {
                ShiftResult::with_carry(rm.rotate_right(amount), rm.get_bit((amount - 1) as u8))
            }
        }
    }
}

/// Shift `rm` by a 5-bit immediate, where some zero amounts have their own
/// meaning: LSR #0 and ASR #0 encode #32, ROR #0 encodes RRX.
#[must_use]
pub fn shift_immediate(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ShiftResult {
    match (kind, shift_amount) {
        (ShiftKind::Lsl, 0) => ShiftResult::unchanged(rm),
        (ShiftKind::Lsr | ShiftKind::Asr, 0) => shift(kind, 32, rm),
        (ShiftKind::Ror, 0) => {
            ShiftResult::with_carry((u32::from(carry) << 31) | (rm >> 1), rm.get_bit(0))
        }
        _ => shift(kind, shift_amount, rm),
    }
}

/// Operand 2 immediate: `imm8` rotated right by twice the rotate field.
/// A rotation of 0 keeps C.
#[must_use]
pub fn rotate_immediate(imm8: u32, rotate: u32) -> ShiftResult {
    if rotate == 0 {
        ShiftResult::unchanged(imm8)
    } else {
        let result = imm8.rotate_right(rotate);
        ShiftResult::with_carry(result, result.get_bit(31))
    }
}
