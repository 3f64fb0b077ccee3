//! # ARM Instruction Decoding
//!
//! This module turns 32-bit ARM opcodes into [`ArmModeInstruction`]s.
//!
//! ## Decode table
//!
//! Classification runs through [`ARM_DECODE_TABLE`], first match wins:
//!
//! ```text
//! ┌────┬─────────────┬─────────────┬──────────────────────────────────────┐
//! │ #  │    Mask     │   Pattern   │ Family                               │
//! ├────┼─────────────┼─────────────┼──────────────────────────────────────┤
//! │  1 │ 0x0FF0_00F0 │ 0x0120_0010 │ Branch and Exchange (BX)             │
//! │  2 │ 0x0FB0_00F0 │ 0x0100_0090 │ Single Data Swap (SWP)               │
//! │  3 │ 0x0F80_00F0 │ 0x0080_0090 │ Multiply Long (UMULL..SMLAL)         │
//! │  4 │ 0x0FC0_00F0 │ 0x0000_0090 │ Multiply (MUL, MLA)                  │
//! │  5 │ 0x0E00_0090 │ 0x0000_0090 │ Halfword Transfer (LDRH..LDRSH)      │
//! │  6 │ 0x0FB0_0000 │ 0x0100_0000 │ MRS                                  │
//! │  7 │ 0x0FB0_0000 │ 0x0120_0000 │ MSR (register)                       │
//! │  8 │ 0x0FB0_0000 │ 0x0320_0000 │ MSR (immediate)                      │
//! │  9 │ 0x0E00_0010 │ 0x0600_0010 │ Undefined                            │
//! │ 10 │ 0x0F00_0000 │ 0x0F00_0000 │ Software Interrupt                   │
//! │ 11 │ 0x0F00_0010 │ 0x0E00_0000 │ Coprocessor Data Operation           │
//! │ 12 │ 0x0F00_0010 │ 0x0E00_0010 │ Coprocessor Register Transfer        │
//! │ 13 │ 0x0E00_0000 │ 0x0C00_0000 │ Coprocessor Data Transfer            │
//! │ 14 │ 0x0E00_0000 │ 0x0800_0000 │ Block Data Transfer (LDM, STM)       │
//! │ 15 │ 0x0E00_0000 │ 0x0A00_0000 │ Branch (B, BL)                       │
//! │ 16 │ 0x0C00_0000 │ 0x0400_0000 │ Single Data Transfer (LDR, STR)      │
//! │ 17 │ 0x0C00_0000 │ 0x0000_0000 │ Data Processing                      │
//! └────┴─────────────┴─────────────┴──────────────────────────────────────┘
//! ```
//!
//! The masks are deliberately loose where the architecture defines
//! should-be-one/should-be-zero fields: field extraction checks those and
//! reports [`DecodeFault::Malformed`] instead of guessing.
//!
//! ## Instruction Encoding Example
//!
//! ```text
//! ADD R0, R1, R2, LSL #3
//!
//! 31-28  27-26  25  24-21  20  19-16  15-12  11-7   6-5  4  3-0
//! [1110] [ 00 ] [0] [0100] [0] [0001] [0000] [00011][00] [0][0010]
//!   ↑       ↑    ↑    ↑     ↑    ↑      ↑      ↑     ↑   ↑   ↑
//!   │       │    │    │     │    │      │      │     │   │   └─ Rm = R2
//!   │       │    │    │     │    │      │      │     │   └──── Shift by imm
//!   │       │    │    │     │    │      │      │     └──────── LSL
//!   │       │    │    │     │    │      │      └────────────── Shift = 3
//!   │       │    │    │     │    │      └───────────────────── Rd = R0
//!   │       │    │    │     │    └──────────────────────────── Rn = R1
//!   │       │    │    │     └───────────────────────────────── S = 0 (no flags)
//!   │       │    │    └─────────────────────────────────────── ADD opcode
//!   │       │    └──────────────────────────────────────────── Register operand
//!   │       └───────────────────────────────────────────────── Data processing
//!   └───────────────────────────────────────────────────────── Always execute
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{AluSecondOperandInfo, ArmModeAluInstruction, ShiftOperator};
use crate::cpu::condition::Condition;
use crate::cpu::decode::{DecodeEntry, DecodeFault, classify};
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, ReadWriteKind, ShiftKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmFamily {
    BranchAndExchange,
    SingleDataSwap,
    MultiplyLong,
    Multiply,
    HalfwordDataTransfer,
    StatusToRegister,
    RegisterToStatus,
    ImmediateToStatus,
    Undefined,
    SoftwareInterrupt,
    CoprocessorDataOperation,
    CoprocessorRegisterTransfer,
    CoprocessorDataTransfer,
    BlockDataTransfer,
    Branch,
    SingleDataTransfer,
    DataProcessing,
}

pub const ARM_DECODE_TABLE: [DecodeEntry<u32, ArmFamily>; 17] = [
    DecodeEntry::new(0x0FF0_00F0, 0x0120_0010, ArmFamily::BranchAndExchange),
    DecodeEntry::new(0x0FB0_00F0, 0x0100_0090, ArmFamily::SingleDataSwap),
    DecodeEntry::new(0x0F80_00F0, 0x0080_0090, ArmFamily::MultiplyLong),
    DecodeEntry::new(0x0FC0_00F0, 0x0000_0090, ArmFamily::Multiply),
    DecodeEntry::new(0x0E00_0090, 0x0000_0090, ArmFamily::HalfwordDataTransfer),
    DecodeEntry::new(0x0FB0_0000, 0x0100_0000, ArmFamily::StatusToRegister),
    DecodeEntry::new(0x0FB0_0000, 0x0120_0000, ArmFamily::RegisterToStatus),
    DecodeEntry::new(0x0FB0_0000, 0x0320_0000, ArmFamily::ImmediateToStatus),
    DecodeEntry::new(0x0E00_0010, 0x0600_0010, ArmFamily::Undefined),
    DecodeEntry::new(0x0F00_0000, 0x0F00_0000, ArmFamily::SoftwareInterrupt),
    DecodeEntry::new(0x0F00_0010, 0x0E00_0000, ArmFamily::CoprocessorDataOperation),
    DecodeEntry::new(0x0F00_0010, 0x0E00_0010, ArmFamily::CoprocessorRegisterTransfer),
    DecodeEntry::new(0x0E00_0000, 0x0C00_0000, ArmFamily::CoprocessorDataTransfer),
    DecodeEntry::new(0x0E00_0000, 0x0800_0000, ArmFamily::BlockDataTransfer),
    DecodeEntry::new(0x0E00_0000, 0x0A00_0000, ArmFamily::Branch),
    DecodeEntry::new(0x0C00_0000, 0x0400_0000, ArmFamily::SingleDataTransfer),
    DecodeEntry::new(0x0C00_0000, 0x0000_0000, ArmFamily::DataProcessing),
];

/// CPSR or SPSR, selected by bit 22 of PSR transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value { Self::Spsr } else { Self::Cpsr }
    }
}

impl std::fmt::Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cpsr => "CPSR",
            Self::Spsr => "SPSR",
        })
    }
}

/// Source of the value written by MSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsrOperand {
    Register(usize),
    Immediate(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyVariant {
    Mul,
    Mla,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl ArmModeMultiplyLongVariant {
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Smull | Self::Smlal)
    }

    #[must_use]
    pub const fn accumulates(self) -> bool {
        matches!(self, Self::Umlal | Self::Smlal)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: usize,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HalfwordDataTransferOffset {
    Immediate(u32),
    Register(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    },
    Mrs {
        psr_kind: PsrKind,
        destination: usize,
    },
    Msr {
        psr_kind: PsrKind,
        /// Bit 0 selects the control field, bit 3 the flags field.
        field_mask: u32,
        operand: MsrOperand,
    },
    Multiply {
        variant: ArmModeMultiplyVariant,
        should_set_codes: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    },
    MultiplyLong {
        variant: ArmModeMultiplyLongVariant,
        should_set_codes: bool,
        rdhi: usize,
        rdlo: usize,
        rs: usize,
        rm: usize,
    },
    SingleDataSwap {
        quantity: ReadWriteKind,
        base_register: usize,
        destination: usize,
        source: usize,
    },
    BranchAndExchange {
        register: usize,
    },
    HalfwordDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: usize,
        source_destination_register: usize,
        transfer_kind: HalfwordTransferKind,
        offset: HalfwordDataTransferOffset,
    },
    SingleDataTransfer {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        offsetting: Offsetting,
        base_register: usize,
        destination: usize,
        offset_info: SingleDataTransferOffsetInfo,
    },
    Undefined,
    BlockDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: usize,
        register_list: u16,
    },
    Branch {
        link: bool,
        /// Byte offset, sign-extended, relative to the pipelined PC.
        offset: u32,
    },
    CoprocessorDataTransfer {
        coprocessor: u32,
    },
    CoprocessorDataOperation {
        coprocessor: u32,
    },
    CoprocessorRegisterTransfer {
        coprocessor: u32,
    },
    SoftwareInterrupt {
        comment: u32,
    },
}

fn register(op_code: u32, lsb: u8) -> usize {
    op_code.get_bits(lsb..=lsb + 3) as usize
}

impl TryFrom<u32> for ArmModeInstruction {
    type Error = DecodeFault;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        let family = classify(&ARM_DECODE_TABLE, op_code).ok_or(DecodeFault::NoMatch)?;
        Self::decode_family(family, op_code)
    }
}

impl ArmModeInstruction {
    /// Extracts the fields of `op_code` once its family is known.
    #[allow(clippy::too_many_lines)]
    pub fn decode_family(family: ArmFamily, op_code: u32) -> Result<Self, DecodeFault> {
        match family {
            ArmFamily::BranchAndExchange => {
                if op_code.get_bits(8..=19) != 0xFFF {
                    return Err(DecodeFault::Malformed("BX with bits 8-19 not all set"));
                }
                Ok(Self::BranchAndExchange {
                    register: register(op_code, 0),
                })
            }
            ArmFamily::SingleDataSwap => {
                if op_code.get_bits(8..=11) != 0 {
                    return Err(DecodeFault::Malformed("SWP with non-zero bits 8-11"));
                }
                Ok(Self::SingleDataSwap {
                    quantity: op_code.get_bit(22).into(),
                    base_register: register(op_code, 16),
                    destination: register(op_code, 12),
                    source: register(op_code, 0),
                })
            }
            ArmFamily::MultiplyLong => {
                let variant = match (op_code.get_bit(22), op_code.get_bit(21)) {
                    (false, false) => ArmModeMultiplyLongVariant::Umull,
                    (false, true) => ArmModeMultiplyLongVariant::Umlal,
                    (true, false) => ArmModeMultiplyLongVariant::Smull,
                    (true, true) => ArmModeMultiplyLongVariant::Smlal,
                };
                Ok(Self::MultiplyLong {
                    variant,
                    should_set_codes: op_code.get_bit(20),
                    rdhi: register(op_code, 16),
                    rdlo: register(op_code, 12),
                    rs: register(op_code, 8),
                    rm: register(op_code, 0),
                })
            }
            ArmFamily::Multiply => Ok(Self::Multiply {
                variant: if op_code.get_bit(21) {
                    ArmModeMultiplyVariant::Mla
                } else {
                    ArmModeMultiplyVariant::Mul
                },
                should_set_codes: op_code.get_bit(20),
                rd: register(op_code, 16),
                rn: register(op_code, 12),
                rs: register(op_code, 8),
                rm: register(op_code, 0),
            }),
            ArmFamily::HalfwordDataTransfer => Self::decode_halfword(op_code),
            ArmFamily::StatusToRegister => {
                if op_code.get_bits(16..=19) != 0xF || op_code.get_bits(0..=11) != 0 {
                    return Err(DecodeFault::Malformed("MRS with reserved bits violated"));
                }
                Ok(Self::Mrs {
                    psr_kind: op_code.get_bit(22).into(),
                    destination: register(op_code, 12),
                })
            }
            ArmFamily::RegisterToStatus | ArmFamily::ImmediateToStatus => {
                if op_code.get_bits(12..=15) != 0xF {
                    return Err(DecodeFault::Malformed("MSR with bits 12-15 not all set"));
                }
                let operand = if family == ArmFamily::ImmediateToStatus {
                    MsrOperand::Immediate(
                        op_code
                            .get_bits(0..=7)
                            .rotate_right(op_code.get_bits(8..=11) * 2),
                    )
                } else {
                    if op_code.get_bits(4..=11) != 0 {
                        return Err(DecodeFault::Malformed("MSR with non-zero bits 4-11"));
                    }
                    MsrOperand::Register(register(op_code, 0))
                };
                Ok(Self::Msr {
                    psr_kind: op_code.get_bit(22).into(),
                    field_mask: op_code.get_bits(16..=19),
                    operand,
                })
            }
            ArmFamily::Undefined => Ok(Self::Undefined),
            ArmFamily::SoftwareInterrupt => Ok(Self::SoftwareInterrupt {
                comment: op_code.get_bits(0..=23),
            }),
            ArmFamily::CoprocessorDataOperation => Ok(Self::CoprocessorDataOperation {
                coprocessor: op_code.get_bits(8..=11),
            }),
            ArmFamily::CoprocessorRegisterTransfer => Ok(Self::CoprocessorRegisterTransfer {
                coprocessor: op_code.get_bits(8..=11),
            }),
            ArmFamily::CoprocessorDataTransfer => Ok(Self::CoprocessorDataTransfer {
                coprocessor: op_code.get_bits(8..=11),
            }),
            ArmFamily::BlockDataTransfer => Ok(Self::BlockDataTransfer {
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                base_register: register(op_code, 16),
                register_list: op_code.get_bits(0..=15) as u16,
            }),
            ArmFamily::Branch => Ok(Self::Branch {
                link: op_code.get_bit(24),
                offset: (op_code.get_bits(0..=23) << 2).sign_extended(26),
            }),
            ArmFamily::SingleDataTransfer => {
                let offset_info = if op_code.get_bit(25) {
                    SingleDataTransferOffsetInfo::RegisterImmediate {
                        shift_amount: op_code.get_bits(7..=11),
                        shift_kind: op_code.get_bits(5..=6).into(),
                        reg_offset: register(op_code, 0),
                    }
                } else {
                    SingleDataTransferOffsetInfo::Immediate {
                        offset: op_code.get_bits(0..=11),
                    }
                };
                Ok(Self::SingleDataTransfer {
                    load_store: op_code.get_bit(20).into(),
                    quantity: op_code.get_bit(22).into(),
                    write_back: op_code.get_bit(21),
                    indexing: op_code.get_bit(24).into(),
                    offsetting: op_code.get_bit(23).into(),
                    base_register: register(op_code, 16),
                    destination: register(op_code, 12),
                    offset_info,
                })
            }
            ArmFamily::DataProcessing => Self::decode_data_processing(op_code),
        }
    }

    fn decode_halfword(op_code: u32) -> Result<Self, DecodeFault> {
        let load_store: LoadStoreKind = op_code.get_bit(20).into();
        let transfer_kind = match op_code.get_bits(5..=6) {
            0b01 => HalfwordTransferKind::UnsignedHalfwords,
            0b10 => HalfwordTransferKind::SignedByte,
            0b11 => HalfwordTransferKind::SignedHalfwords,
            _ => return Err(DecodeFault::Malformed("halfword transfer with SH=00")),
        };
        if load_store == LoadStoreKind::Store
            && transfer_kind != HalfwordTransferKind::UnsignedHalfwords
        {
            return Err(DecodeFault::Malformed("signed halfword transfer with L=0"));
        }

        let offset = if op_code.get_bit(22) {
            HalfwordDataTransferOffset::Immediate(
                (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
            )
        } else {
            if op_code.get_bits(8..=11) != 0 {
                return Err(DecodeFault::Malformed(
                    "register halfword transfer with non-zero bits 8-11",
                ));
            }
            HalfwordDataTransferOffset::Register(register(op_code, 0))
        };

        Ok(Self::HalfwordDataTransfer {
            indexing: op_code.get_bit(24).into(),
            offsetting: op_code.get_bit(23).into(),
            write_back: op_code.get_bit(21),
            load_store,
            base_register: register(op_code, 16),
            source_destination_register: register(op_code, 12),
            transfer_kind,
            offset,
        })
    }

    fn decode_data_processing(op_code: u32) -> Result<Self, DecodeFault> {
        let alu_instruction = ArmModeAluInstruction::from(op_code.get_bits(21..=24));
        let set_conditions = op_code.get_bit(20);
        if alu_instruction.is_test() && !set_conditions {
            return Err(DecodeFault::Malformed("test instruction with S=0"));
        }

        let op2 = if op_code.get_bit(25) {
            AluSecondOperandInfo::Immediate {
                base: op_code.get_bits(0..=7),
                shift: op_code.get_bits(8..=11) * 2,
            }
        } else {
            let shift_op = if op_code.get_bit(4) {
                ShiftOperator::Register(register(op_code, 8))
            } else {
                ShiftOperator::Immediate(op_code.get_bits(7..=11))
            };
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind: op_code.get_bits(5..=6).into(),
                register: register(op_code, 0),
            }
        };

        Ok(Self::DataProcessing {
            alu_instruction,
            set_conditions,
            rn: register(op_code, 16),
            destination: register(op_code, 12),
            op2,
        })
    }
}

impl std::fmt::Display for ArmModeMultiplyLongVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Umull => "UMULL",
            Self::Umlal => "UMLAL",
            Self::Smull => "SMULL",
            Self::Smlal => "SMLAL",
        })
    }
}

impl std::fmt::Display for SingleDataTransferOffsetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { offset } => write!(f, "#{offset:#X}"),
            Self::RegisterImmediate {
                shift_amount: 0,
                shift_kind: ShiftKind::Lsl,
                reg_offset,
            } => write!(f, "R{reg_offset}"),
            Self::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => write!(f, "R{reg_offset}, {shift_kind} #{shift_amount}"),
        }
    }
}

fn register_list(list: u16) -> String {
    let registers: Vec<String> = (0..16)
        .filter(|idx| list.get_bit(*idx))
        .map(|idx| format!("R{idx}"))
        .collect();
    registers.join(", ")
}

fn sign(offsetting: Offsetting) -> &'static str {
    match offsetting {
        Offsetting::Down => "-",
        Offsetting::Up => "",
    }
}

impl ArmModeInstruction {
    /// Assembly text of the instruction, `condition` included.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn disassembler(&self, condition: Condition) -> String {
        match self {
            Self::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                let set_string = if *set_conditions { "S" } else { "" };
                if alu_instruction.is_test() {
                    format!("{alu_instruction}{condition} R{rn}, {op2}")
                } else if alu_instruction.is_move() {
                    format!("{alu_instruction}{condition}{set_string} R{destination}, {op2}")
                } else {
                    format!("{alu_instruction}{condition}{set_string} R{destination}, R{rn}, {op2}")
                }
            }
            Self::Mrs {
                psr_kind,
                destination,
            } => format!("MRS{condition} R{destination}, {psr_kind}"),
            Self::Msr {
                psr_kind,
                field_mask,
                operand,
            } => {
                let mut fields = String::new();
                if field_mask.get_bit(3) {
                    fields.push('f');
                }
                if field_mask.get_bit(0) {
                    fields.push('c');
                }
                let operand = match operand {
                    MsrOperand::Register(rm) => format!("R{rm}"),
                    MsrOperand::Immediate(value) => format!("#{value:#X}"),
                };
                format!("MSR{condition} {psr_kind}_{fields}, {operand}")
            }
            Self::Multiply {
                variant,
                should_set_codes,
                rd,
                rn,
                rs,
                rm,
            } => {
                let set_string = if *should_set_codes { "S" } else { "" };
                match variant {
                    ArmModeMultiplyVariant::Mul => {
                        format!("MUL{condition}{set_string} R{rd}, R{rm}, R{rs}")
                    }
                    ArmModeMultiplyVariant::Mla => {
                        format!("MLA{condition}{set_string} R{rd}, R{rm}, R{rs}, R{rn}")
                    }
                }
            }
            Self::MultiplyLong {
                variant,
                should_set_codes,
                rdhi,
                rdlo,
                rs,
                rm,
            } => {
                let set_string = if *should_set_codes { "S" } else { "" };
                format!("{variant}{condition}{set_string} R{rdlo}, R{rdhi}, R{rm}, R{rs}")
            }
            Self::SingleDataSwap {
                quantity,
                base_register,
                destination,
                source,
            } => {
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                format!("SWP{condition}{b} R{destination}, R{source}, [R{base_register}]")
            }
            Self::BranchAndExchange { register } => format!("BX{condition} R{register}"),
            Self::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                base_register,
                source_destination_register,
                transfer_kind,
                offset,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let offset = match offset {
                    HalfwordDataTransferOffset::Immediate(value) => {
                        format!("#{}{value:#X}", sign(*offsetting))
                    }
                    HalfwordDataTransferOffset::Register(rm) => {
                        format!("{}R{rm}", sign(*offsetting))
                    }
                };
                let address = match indexing {
                    Indexing::Pre => {
                        let w = if *write_back { "!" } else { "" };
                        format!("[R{base_register}, {offset}]{w}")
                    }
                    Indexing::Post => format!("[R{base_register}], {offset}"),
                };
                format!("{op}{condition}{transfer_kind} R{source_destination_register}, {address}")
            }
            Self::SingleDataTransfer {
                load_store,
                quantity,
                write_back,
                indexing,
                offsetting,
                base_register,
                destination,
                offset_info,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                let offset = match offset_info {
                    SingleDataTransferOffsetInfo::Immediate { offset } => {
                        format!("#{}{offset:#X}", sign(*offsetting))
                    }
                    SingleDataTransferOffsetInfo::RegisterImmediate { .. } => {
                        format!("{}{offset_info}", sign(*offsetting))
                    }
                };
                let address = match indexing {
                    Indexing::Pre => {
                        let w = if *write_back { "!" } else { "" };
                        format!("[R{base_register}, {offset}]{w}")
                    }
                    Indexing::Post => format!("[R{base_register}], {offset}"),
                };
                format!("{op}{condition}{b} R{destination}, {address}")
            }
            Self::Undefined => format!("UND{condition}"),
            Self::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                base_register,
                register_list: list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDM",
                    LoadStoreKind::Store => "STM",
                };
                let suffix = match (offsetting, indexing) {
                    (Offsetting::Up, Indexing::Post) => "IA",
                    (Offsetting::Up, Indexing::Pre) => "IB",
                    (Offsetting::Down, Indexing::Post) => "DA",
                    (Offsetting::Down, Indexing::Pre) => "DB",
                };
                let w = if *write_back { "!" } else { "" };
                let s = if *load_psr { "^" } else { "" };
                format!(
                    "{op}{condition}{suffix} R{base_register}{w}, {{{}}}{s}",
                    register_list(*list)
                )
            }
            Self::Branch { link, offset } => {
                let l = if *link { "L" } else { "" };
                format!("B{l}{condition} {offset:#010X}")
            }
            Self::CoprocessorDataTransfer { coprocessor } => {
                format!("LDC/STC{condition} p{coprocessor}")
            }
            Self::CoprocessorDataOperation { coprocessor } => {
                format!("CDP{condition} p{coprocessor}")
            }
            Self::CoprocessorRegisterTransfer { coprocessor } => {
                format!("MRC/MCR{condition} p{coprocessor}")
            }
            Self::SoftwareInterrupt { comment } => format!("SWI{condition} {comment:#X}"),
        }
    }
}
