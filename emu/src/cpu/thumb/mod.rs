//! # Thumb Instruction Set (16-bit)
//!
//! Compressed encoding of a subset of ARM. Only branches are conditional,
//! and most formats reach r0-r7 alone; format 5 and the SP/PC-relative
//! formats are the way to the high registers.
//!
//! Decoding walks [`instruction::THUMB_DECODE_TABLE`]. Formats are
//! executed by the same ALU and block transfer code as their ARM
//! counterparts.
//!
//! ## Submodules
//!
//! - [`instruction`] - Decoding (`TryFrom<u16>`) and disassembly
//! - [`operations`] - Execution
//! - [`alu_instructions`] - Format 4 and format 5 operations
//! - [`mode`] - Opcode with raw bits

pub mod alu_instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod instruction;
pub mod mode;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::missing_panics_doc)]
pub mod operations;
