//! # Thumb Instruction Decoding
//!
//! This module handles decoding 16-bit Thumb instructions.
//!
//! ## Thumb Instruction Formats
//!
//! Thumb instructions are grouped into 19 formats. Classification runs
//! through [`THUMB_DECODE_TABLE`], first match wins:
//!
//! ```text
//! ┌────┬────────┬─────────┬────────────────────────────────────────────────┐
//! │ #  │  Mask  │ Pattern │ Format                                         │
//! ├────┼────────┼─────────┼────────────────────────────────────────────────┤
//! │  1 │ 0xFF00 │ 0xDF00  │ 17: Software interrupt                         │
//! │  2 │ 0xFF00 │ 0xB000  │ 13: Add offset to stack pointer                │
//! │  3 │ 0xF600 │ 0xB400  │ 14: Push/pop registers                         │
//! │  4 │ 0xF800 │ 0x1800  │  2: Add/subtract                               │
//! │  5 │ 0xE000 │ 0x0000  │  1: Move shifted register                      │
//! │  6 │ 0xE000 │ 0x2000  │  3: Move/compare/add/subtract immediate        │
//! │  7 │ 0xFC00 │ 0x4000  │  4: ALU operations                             │
//! │  8 │ 0xFC00 │ 0x4400  │  5: Hi register operations / BX                │
//! │  9 │ 0xF800 │ 0x4800  │  6: PC-relative load                           │
//! │ 10 │ 0xF200 │ 0x5000  │  7: Load/store with register offset            │
//! │ 11 │ 0xF200 │ 0x5200  │  8: Load/store sign-extended byte/halfword     │
//! │ 12 │ 0xE000 │ 0x6000  │  9: Load/store with immediate offset           │
//! │ 13 │ 0xF000 │ 0x8000  │ 10: Load/store halfword                        │
//! │ 14 │ 0xF000 │ 0x9000  │ 11: SP-relative load/store                     │
//! │ 15 │ 0xF000 │ 0xA000  │ 12: Load address                               │
//! │ 16 │ 0xF000 │ 0xC000  │ 15: Multiple load/store                        │
//! │ 17 │ 0xF000 │ 0xD000  │ 16: Conditional branch                         │
//! │ 18 │ 0xF800 │ 0xE000  │ 18: Unconditional branch                       │
//! │ 19 │ 0xF000 │ 0xF000  │ 19: Long branch with link                      │
//! └────┴────────┴─────────┴────────────────────────────────────────────────┘
//! ```
//!
//! The remaining 0xBxxx space, `0xE800-0xEFFF` (BLX on later cores) and the
//! conditional branch with condition `1110` are not ARMv4T instructions and
//! decode to [`DecodeFault::NoMatch`].
//!
//! ## Register Restrictions
//!
//! Most Thumb instructions can only access R0-R7. To access R8-R15:
//! - Format 5 (Hi register ops): ADD, CMP, MOV with high registers
//! - BX: Can branch to any register
//! - PUSH/POP: Can include LR/PC via special bit
//!
//! ## Long Branch (BL)
//!
//! The BL instruction spans ±4MB but requires two 16-bit instructions:
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = next | 1
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::decode::{DecodeEntry, DecodeFault, classify};
use crate::cpu::flags::{LoadStoreKind, OperandKind, Operation, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbFamily {
    SoftwareInterrupt,
    AddOffsetSp,
    PushPop,
    AddSubtract,
    MoveShiftedRegister,
    MoveCompareAddSubtractImm,
    AluOp,
    HiRegisterOpBx,
    PcRelativeLoad,
    LoadStoreRegisterOffset,
    LoadStoreSignExtended,
    LoadStoreImmOffset,
    LoadStoreHalfword,
    SpRelativeLoadStore,
    LoadAddress,
    MultipleLoadStore,
    CondBranch,
    UncondBranch,
    LongBranchLink,
}

pub const THUMB_DECODE_TABLE: [DecodeEntry<u16, ThumbFamily>; 19] = [
    DecodeEntry::new(0xFF00, 0xDF00, ThumbFamily::SoftwareInterrupt),
    DecodeEntry::new(0xFF00, 0xB000, ThumbFamily::AddOffsetSp),
    DecodeEntry::new(0xF600, 0xB400, ThumbFamily::PushPop),
    DecodeEntry::new(0xF800, 0x1800, ThumbFamily::AddSubtract),
    DecodeEntry::new(0xE000, 0x0000, ThumbFamily::MoveShiftedRegister),
    DecodeEntry::new(0xE000, 0x2000, ThumbFamily::MoveCompareAddSubtractImm),
    DecodeEntry::new(0xFC00, 0x4000, ThumbFamily::AluOp),
    DecodeEntry::new(0xFC00, 0x4400, ThumbFamily::HiRegisterOpBx),
    DecodeEntry::new(0xF800, 0x4800, ThumbFamily::PcRelativeLoad),
    DecodeEntry::new(0xF200, 0x5000, ThumbFamily::LoadStoreRegisterOffset),
    DecodeEntry::new(0xF200, 0x5200, ThumbFamily::LoadStoreSignExtended),
    DecodeEntry::new(0xE000, 0x6000, ThumbFamily::LoadStoreImmOffset),
    DecodeEntry::new(0xF000, 0x8000, ThumbFamily::LoadStoreHalfword),
    DecodeEntry::new(0xF000, 0x9000, ThumbFamily::SpRelativeLoadStore),
    DecodeEntry::new(0xF000, 0xA000, ThumbFamily::LoadAddress),
    DecodeEntry::new(0xF000, 0xC000, ThumbFamily::MultipleLoadStore),
    DecodeEntry::new(0xF000, 0xD000, ThumbFamily::CondBranch),
    DecodeEntry::new(0xF800, 0xE000, ThumbFamily::UncondBranch),
    DecodeEntry::new(0xF000, 0xF000, ThumbFamily::LongBranchLink),
];

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbModeInstruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
        offset5: u32,
        source_register: usize,
        destination_register: usize,
    },
    AddSubtract {
        operation_kind: OperandKind,
        /// SUB when set, ADD otherwise.
        subtract: bool,
        rn_offset3: u32,
        source_register: usize,
        destination_register: usize,
    },
    MoveCompareAddSubtractImm {
        operation: Operation,
        destination_register: usize,
        offset: u32,
    },
    AluOp {
        alu_operation: ThumbModeAluInstruction,
        source_register: usize,
        destination_register: usize,
    },
    HiRegisterOpBX {
        register_operation: ThumbHighRegisterOperation,
        source_register: usize,
        destination_register: usize,
    },
    PCRelativeLoad {
        destination_register: usize,
        immediate_value: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        ro: usize,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreSignExtByteHalfword {
        h: bool,
        sign_extend_flag: bool,
        offset_register: usize,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset: u32,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        base_register: usize,
        source_destination_register: usize,
    },
    SPRelativeLoadStore {
        load_store: LoadStoreKind,
        destination_register: usize,
        word8: u32,
    },
    LoadAddress {
        sp: bool,
        destination_register: usize,
        offset: u32,
    },
    AddOffsetSP {
        /// Subtract when set.
        s: bool,
        word7: u32,
    },
    PushPopReg {
        load_store: LoadStoreKind,
        /// LR for PUSH, PC for POP.
        pc_lr: bool,
        register_list: u16,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        base_register: usize,
        register_list: u16,
    },
    CondBranch {
        condition: Condition,
        immediate_offset: i32,
    },
    Swi {
        comment: u32,
    },
    UncondBranch {
        offset: i32,
    },
    LongBranchLink {
        h: bool,
        offset: u32,
    },
}

fn low_register(op_code: u16, lsb: u8) -> usize {
    usize::from(op_code.get_bits(lsb..=lsb + 2))
}

impl TryFrom<u16> for ThumbModeInstruction {
    type Error = DecodeFault;

    fn try_from(op_code: u16) -> Result<Self, Self::Error> {
        let family = classify(&THUMB_DECODE_TABLE, op_code).ok_or(DecodeFault::NoMatch)?;
        Self::decode_family(family, op_code)
    }
}

impl ThumbModeInstruction {
    /// Extracts the fields of `op_code`, already classified as `family`.
    #[allow(clippy::too_many_lines)]
    pub fn decode_family(family: ThumbFamily, op_code: u16) -> Result<Self, DecodeFault> {
        let instruction = match family {
            ThumbFamily::SoftwareInterrupt => Self::Swi {
                comment: op_code.get_bits(0..=7).into(),
            },
            ThumbFamily::AddOffsetSp => Self::AddOffsetSP {
                s: op_code.get_bit(7),
                // The assembler stores #Imm >> 2.
                word7: u32::from(op_code.get_bits(0..=6)) << 2,
            },
            ThumbFamily::PushPop => Self::PushPopReg {
                load_store: op_code.get_bit(11).into(),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7),
            },
            ThumbFamily::AddSubtract => Self::AddSubtract {
                operation_kind: op_code.get_bit(10).into(),
                subtract: op_code.get_bit(9),
                rn_offset3: op_code.get_bits(6..=8).into(),
                source_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            ThumbFamily::MoveShiftedRegister => Self::MoveShiftedRegister {
                shift_operation: u32::from(op_code.get_bits(11..=12)).into(),
                offset5: op_code.get_bits(6..=10).into(),
                source_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            ThumbFamily::MoveCompareAddSubtractImm => Self::MoveCompareAddSubtractImm {
                operation: u32::from(op_code.get_bits(11..=12)).into(),
                destination_register: low_register(op_code, 8),
                offset: op_code.get_bits(0..=7).into(),
            },
            ThumbFamily::AluOp => Self::AluOp {
                alu_operation: op_code.get_bits(6..=9).into(),
                source_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            ThumbFamily::HiRegisterOpBx => {
                let register_operation = ThumbHighRegisterOperation::from(op_code.get_bits(8..=9));
                let h1 = op_code.get_bit(7);
                if register_operation == ThumbHighRegisterOperation::Bx && h1 {
                    return Err(DecodeFault::Malformed("BX with H1 set"));
                }
                let rd_hd = low_register(op_code, 0);
                Self::HiRegisterOpBX {
                    register_operation,
                    source_register: usize::from(op_code.get_bits(3..=6)),
                    destination_register: if h1 { rd_hd | (1 << 3) } else { rd_hd },
                }
            }
            ThumbFamily::PcRelativeLoad => Self::PCRelativeLoad {
                destination_register: low_register(op_code, 8),
                immediate_value: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            ThumbFamily::LoadStoreRegisterOffset => Self::LoadStoreRegisterOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word: op_code.get_bit(10).into(),
                ro: low_register(op_code, 6),
                base_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            ThumbFamily::LoadStoreSignExtended => Self::LoadStoreSignExtByteHalfword {
                h: op_code.get_bit(11),
                sign_extend_flag: op_code.get_bit(10),
                offset_register: low_register(op_code, 6),
                base_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            ThumbFamily::LoadStoreImmOffset => {
                let byte_word: ReadWriteKind = op_code.get_bit(12).into();
                let offset = u32::from(op_code.get_bits(6..=10));
                Self::LoadStoreImmOffset {
                    load_store: op_code.get_bit(11).into(),
                    byte_word,
                    // Word offsets are stored >> 2.
                    offset: match byte_word {
                        ReadWriteKind::Word => offset << 2,
                        ReadWriteKind::Byte => offset,
                    },
                    base_register: low_register(op_code, 3),
                    destination_register: low_register(op_code, 0),
                }
            }
            ThumbFamily::LoadStoreHalfword => Self::LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset: u32::from(op_code.get_bits(6..=10)) << 1,
                base_register: low_register(op_code, 3),
                source_destination_register: low_register(op_code, 0),
            },
            ThumbFamily::SpRelativeLoadStore => Self::SPRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                destination_register: low_register(op_code, 8),
                word8: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            ThumbFamily::LoadAddress => Self::LoadAddress {
                sp: op_code.get_bit(11),
                destination_register: low_register(op_code, 8),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            ThumbFamily::MultipleLoadStore => Self::MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                base_register: low_register(op_code, 8),
                register_list: op_code.get_bits(0..=7),
            },
            ThumbFamily::CondBranch => {
                let condition = Condition::from(op_code.get_bits(8..=11) as u8);
                // 1111 is SWI; 1110 is undefined.
                if condition == Condition::AL {
                    return Err(DecodeFault::NoMatch);
                }
                Self::CondBranch {
                    condition,
                    immediate_offset: (u32::from(op_code.get_bits(0..=7)) << 1).sign_extended(9)
                        as i32,
                }
            }
            ThumbFamily::UncondBranch => Self::UncondBranch {
                offset: (u32::from(op_code.get_bits(0..=10)) << 1).sign_extended(12) as i32,
            },
            ThumbFamily::LongBranchLink => Self::LongBranchLink {
                h: op_code.get_bit(11),
                offset: op_code.get_bits(0..=10).into(),
            },
        };

        Ok(instruction)
    }

    /// Condition the instruction is executed under. Only format 16 has one.
    #[must_use]
    pub const fn condition(&self) -> Condition {
        match self {
            Self::CondBranch { condition, .. } => *condition,
            _ => Condition::AL,
        }
    }
}

fn low_register_list(list: u16, extra: Option<&str>) -> String {
    let mut registers: Vec<String> = (0..8)
        .filter(|idx| list.get_bit(*idx))
        .map(|idx| format!("R{idx}"))
        .collect();
    if let Some(extra) = extra {
        registers.push(extra.to_owned());
    }
    registers.join(", ")
}

const fn load_store_mnemonic(load_store: LoadStoreKind, byte_word: ReadWriteKind) -> &'static str {
    match (load_store, byte_word) {
        (LoadStoreKind::Load, ReadWriteKind::Byte) => "LDRB",
        (LoadStoreKind::Load, ReadWriteKind::Word) => "LDR",
        (LoadStoreKind::Store, ReadWriteKind::Byte) => "STRB",
        (LoadStoreKind::Store, ReadWriteKind::Word) => "STR",
    }
}

impl ThumbModeInstruction {
    /// Assembly text of the instruction.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn disassembler(&self) -> String {
        match self {
            Self::MoveShiftedRegister {
                shift_operation: op,
                offset5,
                source_register,
                destination_register,
            } => {
                format!("{op} R{destination_register}, R{source_register}, #{offset5}")
            }
            Self::AddSubtract {
                operation_kind,
                subtract,
                rn_offset3,
                source_register: rs,
                destination_register: rd,
            } => {
                let o = if *subtract { "SUB" } else { "ADD" };
                let rr = match operation_kind {
                    OperandKind::Immediate => format!("#{rn_offset3}"),
                    OperandKind::Register => format!("R{rn_offset3}"),
                };

                format!("{o} R{rd}, R{rs}, {rr}")
            }
            Self::MoveCompareAddSubtractImm {
                operation: op,
                destination_register: r_destination,
                offset,
            } => {
                format!("{op} R{r_destination}, #{offset}")
            }
            Self::AluOp {
                alu_operation: op,
                source_register: rs,
                destination_register: rd,
            } => {
                format!("{op} R{rd}, R{rs}")
            }
            Self::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::Bx,
                source_register,
                ..
            } => format!("BX R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation: op,
                source_register,
                destination_register,
            } => {
                format!("{op} R{destination_register}, R{source_register}")
            }
            Self::PCRelativeLoad {
                destination_register: r_destination,
                immediate_value,
            } => {
                format!("LDR R{r_destination}, [PC, #{immediate_value:#X}]")
            }
            Self::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                ro,
                base_register: rb,
                destination_register: rd,
            } => {
                let instr = load_store_mnemonic(*load_store, *byte_word);
                format!("{instr} R{rd}, [R{rb}, R{ro}]")
            }
            Self::LoadStoreSignExtByteHalfword {
                h: h_flag,
                sign_extend_flag,
                offset_register: r_offset,
                base_register: r_base,
                destination_register: r_destination,
            } => {
                let instr = match (sign_extend_flag, h_flag) {
                    (false, false) => "STRH",
                    (false, true) => "LDRH",
                    (true, false) => "LDSB",
                    (true, true) => "LDSH",
                };

                format!("{instr} R{r_destination}, [R{r_base}, R{r_offset}]")
            }
            Self::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register: rb,
                destination_register: rd,
            } => {
                let instr = load_store_mnemonic(*load_store, *byte_word);
                format!("{instr} R{rd}, [R{rb}, #{offset:#X}]")
            }
            Self::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => {
                let instr = match load_store {
                    LoadStoreKind::Load => "LDRH",
                    LoadStoreKind::Store => "STRH",
                };

                format!("{instr} R{source_destination_register}, [R{base_register}, #{offset:#X}]")
            }
            Self::SPRelativeLoadStore {
                load_store,
                destination_register: r_destination,
                word8,
            } => {
                let instr = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };

                format!("{instr} R{r_destination}, [SP, #{word8:#X}]")
            }
            Self::LoadAddress {
                sp,
                destination_register: r_destination,
                offset,
            } => {
                let source = if *sp { "SP" } else { "PC" };
                format!("ADD R{r_destination}, {source}, #{offset:#X}")
            }
            Self::AddOffsetSP { s, word7 } => {
                let op = if *s { "SUB" } else { "ADD" };
                format!("{op} SP, #{word7:#X}")
            }
            Self::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => {
                let (instr, extra) = match load_store {
                    LoadStoreKind::Load => ("POP", "PC"),
                    LoadStoreKind::Store => ("PUSH", "LR"),
                };
                let registers = low_register_list(*register_list, pc_lr.then_some(extra));
                format!("{instr} {{{registers}}}")
            }
            Self::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => {
                let instr = match load_store {
                    LoadStoreKind::Load => "LDMIA",
                    LoadStoreKind::Store => "STMIA",
                };
                let registers = low_register_list(*register_list, None);
                format!("{instr} R{base_register}!, {{{registers}}}")
            }
            Self::CondBranch {
                condition,
                immediate_offset,
            } => {
                format!("B{condition} #{immediate_offset}")
            }
            Self::Swi { comment } => format!("SWI {comment:#X}"),
            Self::UncondBranch { offset } => {
                format!("B #{offset}")
            }
            Self::LongBranchLink { h, offset } => {
                if *h {
                    format!("BL.LO #{:#X}", offset << 1)
                } else {
                    format!("BL.HI #{}", (offset.sign_extended(11) << 12) as i32)
                }
            }
        }
    }
}

impl std::fmt::Display for ThumbModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.disassembler())
    }
}
