//! # Register banks
//!
//! ```text
//!             User/System  FIQ       Supervisor Abort     IRQ       Undefined
//!  R0-R7      ─────────────────── shared by every mode ──────────────────────
//!  R8-R12     R8-R12       R8_fiq-   ──────────── same as User ─────────────
//!                          R12_fiq
//!  R13 (SP)   R13          R13_fiq   R13_svc    R13_abt   R13_irq   R13_und
//!  R14 (LR)   R14          R14_fiq   R14_svc    R14_abt   R14_irq   R14_und
//!  R15 (PC)   ─────────────────── shared by every mode ──────────────────────
//!  CPSR       ─────────────────── shared by every mode ──────────────────────
//!  SPSR       -            SPSR_fiq  SPSR_svc   SPSR_abt  SPSR_irq  SPSR_und
//! ```
//!
//! Nothing is copied on a mode switch: every access names the bank it
//! wants, and the current bank is derived from the mode bits of the CPSR.

use serde::{Deserialize, Serialize};

use crate::cpu::psr::Psr;

pub const BANK_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bank {
    User = 0,
    Fiq = 1,
    Irq = 2,
    Supervisor = 3,
    Abort = 4,
    Undefined = 5,
}

impl Bank {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Storage for every banked register. Index with [`Bank::index`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BankedRegisters {
    /// R8-R12 as seen by every mode but FIQ.
    pub high: [u32; 5],

    /// R8_fiq-R12_fiq.
    pub high_fiq: [u32; 5],

    pub stack_pointer: [u32; BANK_COUNT],
    pub link_register: [u32; BANK_COUNT],

    /// The `Bank::User` slot exists only to keep indexing uniform and is
    /// never read.
    pub spsr: [Psr; BANK_COUNT],
}

impl BankedRegisters {
    /// Slot backing r8-r14 of `bank`, `None` for indices outside 8..=14.
    pub fn slot_mut(&mut self, index: usize, bank: Bank) -> Option<&mut u32> {
        match index {
            8..=12 if bank == Bank::Fiq => self.high_fiq.get_mut(index - 8),
            8..=12 => self.high.get_mut(index - 8),
            13 => self.stack_pointer.get_mut(bank.index()),
            14 => self.link_register.get_mut(bank.index()),
            _ => None,
        }
    }

    #[must_use]
    pub fn slot(&self, index: usize, bank: Bank) -> Option<u32> {
        match index {
            8..=12 if bank == Bank::Fiq => self.high_fiq.get(index - 8).copied(),
            8..=12 => self.high.get(index - 8).copied(),
            13 => self.stack_pointer.get(bank.index()).copied(),
            14 => self.link_register.get(bank.index()).copied(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_fiq_owns_high_registers() {
        let mut banks = BankedRegisters::default();
        if let Some(r) = banks.slot_mut(10, Bank::Fiq) {
            *r = 0xAA;
        }
        if let Some(r) = banks.slot_mut(10, Bank::Irq) {
            *r = 0xBB;
        }

        assert_eq!(banks.slot(10, Bank::Fiq), Some(0xAA));
        assert_eq!(banks.slot(10, Bank::User), Some(0xBB));
        assert_eq!(banks.slot(10, Bank::Supervisor), Some(0xBB));
    }

    #[test]
    fn check_stack_pointer_per_bank() {
        let mut banks = BankedRegisters::default();
        for (i, bank) in [Bank::User, Bank::Fiq, Bank::Irq, Bank::Supervisor]
            .into_iter()
            .enumerate()
        {
            if let Some(sp) = banks.slot_mut(13, bank) {
                *sp = 0x100 * (i as u32 + 1);
            }
        }

        assert_eq!(banks.slot(13, Bank::User), Some(0x100));
        assert_eq!(banks.slot(13, Bank::Irq), Some(0x300));
        assert_eq!(banks.slot(13, Bank::Abort), Some(0));
        assert_eq!(banks.slot(3, Bank::Abort), None);
    }
}
