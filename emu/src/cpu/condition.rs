//! # Conditional Execution
//!
//! Every ARM instruction carries a 4-bit condition in bits 31-28; in Thumb
//! state only the conditional branch (format 16) does. The condition is
//! tested against the N, Z, C and V flags of the CPSR before the instruction
//! reaches its executor. A failed condition turns the instruction into a
//! one-cycle no-op.
//!
//! ```text
//! ┌───────┬────────┬─────────────────────┬─────────────────────────────────┐
//! │ Code  │ Suffix │     Meaning         │          Flags Tested           │
//! ├───────┼────────┼─────────────────────┼─────────────────────────────────┤
//! │ 0000  │   EQ   │ Equal               │ Z=1                             │
//! │ 0001  │   NE   │ Not equal           │ Z=0                             │
//! │ 0010  │   CS   │ Carry set / ≥ (uns) │ C=1                             │
//! │ 0011  │   CC   │ Carry clear / < (u) │ C=0                             │
//! │ 0100  │   MI   │ Minus / negative    │ N=1                             │
//! │ 0101  │   PL   │ Plus / non-negative │ N=0                             │
//! │ 0110  │   VS   │ Overflow set        │ V=1                             │
//! │ 0111  │   VC   │ Overflow clear      │ V=0                             │
//! │ 1000  │   HI   │ Higher (unsigned)   │ C=1 AND Z=0                     │
//! │ 1001  │   LS   │ Lower/same (unsig)  │ C=0 OR Z=1                      │
//! │ 1010  │   GE   │ ≥ (signed)          │ N=V                             │
//! │ 1011  │   LT   │ < (signed)          │ N≠V                             │
//! │ 1100  │   GT   │ > (signed)          │ Z=0 AND N=V                     │
//! │ 1101  │   LE   │ ≤ (signed)          │ Z=1 OR N≠V                      │
//! │ 1110  │   AL   │ Always              │ (unconditional)                 │
//! │ 1111  │   NV   │ Never (reserved)    │ (never executes on ARMv4)       │
//! └───────┴────────┴─────────────────────┴─────────────────────────────────┘
//! ```
//!
//! The evaluation itself lives on [`Psr::can_execute`](super::psr::Psr::can_execute).

use serde::{Deserialize, Serialize};

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Condition {
    EQ = 0x0,
    NE = 0x1,
    CS = 0x2,
    CC = 0x3,
    MI = 0x4,
    PL = 0x5,
    VS = 0x6,
    VC = 0x7,
    HI = 0x8,
    LS = 0x9,
    GE = 0xA,
    LT = 0xB,
    GT = 0xC,
    LE = 0xD,
    AL = 0xE,
    NV = 0xF,
}

impl Condition {
    pub const ALL: [Self; 16] = [
        Self::EQ,
        Self::NE,
        Self::CS,
        Self::CC,
        Self::MI,
        Self::PL,
        Self::VS,
        Self::VC,
        Self::HI,
        Self::LS,
        Self::GE,
        Self::LT,
        Self::GT,
        Self::LE,
        Self::AL,
        Self::NV,
    ];
}

impl From<u8> for Condition {
    /// Only the low nibble is considered.
    fn from(value: u8) -> Self {
        Self::ALL[usize::from(value & 0xF)]
    }
}

impl From<u32> for Condition {
    fn from(value: u32) -> Self {
        Self::from((value & 0xF) as u8)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // AL is implied in assembly syntax.
            Self::AL => Ok(()),
            _ => write!(f, "{self:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_from_nibble() {
        assert_eq!(Condition::from(0xE_u8), Condition::AL);
        assert_eq!(Condition::from(0x1F_u8), Condition::NV);
        assert_eq!(Condition::from(0xA_u32), Condition::GE);
        for (idx, cond) in Condition::ALL.iter().enumerate() {
            assert_eq!(*cond as usize, idx);
        }
    }

    #[test]
    fn check_display_omits_always() {
        assert_eq!(Condition::AL.to_string(), "");
        assert_eq!(Condition::NE.to_string(), "NE");
    }
}
