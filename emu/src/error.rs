use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::psr::CpuState;

/// Register state captured when a fatal error is raised, enough to replay
/// the failing instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    /// r0-r15 as seen from the mode that was running.
    pub registers: [u32; 16],
    pub cpsr: u32,

    /// `None` in User/System mode.
    pub spsr: Option<u32>,
}

impl std::fmt::Display for RegisterSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, value) in self.registers.iter().enumerate() {
            let sep = if idx % 4 == 3 { '\n' } else { ' ' };
            write!(f, "R{idx:<2}={value:08X}{sep}")?;
        }
        write!(f, "CPSR={:08X}", self.cpsr)?;
        if let Some(spsr) = self.spsr {
            write!(f, " SPSR={spsr:08X}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuErrorKind {
    /// No decode table entry matches the opcode.
    #[error("no instruction family matches the opcode")]
    DecodeError,

    /// The family is recognised but this core does not implement it.
    #[error("unsupported instruction: {0}")]
    UnsupportedInstruction(&'static str),

    /// Reserved bits violate the documented encoding of the family.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(&'static str),
}

/// A fatal condition raised while stepping the CPU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at pc {pc:#010X} ({state} opcode {opcode:#010X})")]
pub struct CpuError {
    pub kind: CpuErrorKind,
    pub pc: u32,
    pub opcode: u32,
    pub state: CpuState,
    pub snapshot: RegisterSnapshot,
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("cartridge image is {0} bytes, the header needs at least 0xC0")]
    TooSmall(usize),

    #[error("cartridge header field `{0}` is not ASCII")]
    NotAscii(&'static str),

    #[error("BIOS image must be 16 KiB, got {0} bytes")]
    BiosSize(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_error_message() {
        let error = CpuError {
            kind: CpuErrorKind::MalformedEncoding("SWP with non-zero bits 8-11"),
            pc: 0x0300_0010,
            opcode: 0xE100_0F91,
            state: CpuState::Arm,
            snapshot: RegisterSnapshot {
                registers: [0; 16],
                cpsr: 0x1F,
                spsr: None,
            },
        };

        assert_eq!(
            error.to_string(),
            "malformed encoding: SWP with non-zero bits 8-11 at pc 0x03000010 (ARM opcode 0xE1000F91)"
        );
    }

    #[test]
    fn check_snapshot_display() {
        let mut registers = [0; 16];
        registers[15] = 0x0800_0000;
        let snapshot = RegisterSnapshot {
            registers,
            cpsr: 0xD2,
            spsr: Some(0x1F),
        };
        let text = snapshot.to_string();
        assert!(text.contains("R15=08000000"));
        assert!(text.ends_with("CPSR=000000D2 SPSR=0000001F"));
    }
}
