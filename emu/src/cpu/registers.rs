use serde::{Deserialize, Serialize};

use crate::cpu::psr::Psr;
use crate::cpu::register_bank::{Bank, BankedRegisters};

pub const REG_SP: usize = 0xD;
pub const REG_LR: usize = 0xE;
pub const REG_PROGRAM_COUNTER: usize = 0xF;

/// The whole ARM7TDMI register file: r0-r7 and r15 are shared, r8-r14
/// and the SPSR are resolved through the [`Bank`] passed on each access.
///
/// r15 holds the address of the instruction being executed; the pipeline
/// offset is applied by the CPU when r15 is used as an operand.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Registers {
    low: [u32; 8],
    banked: BankedRegisters,
    program_counter: u32,
}

impl Registers {
    #[must_use]
    pub fn register_at(&self, index: usize, bank: Bank) -> u32 {
        match index {
            0..=7 => self.low[index],
            REG_PROGRAM_COUNTER => self.program_counter,
            _ => self.banked.slot(index, bank).unwrap_or_default(),
        }
    }

    pub fn set_register_at(&mut self, index: usize, value: u32, bank: Bank) {
        match index {
            0..=7 => self.low[index] = value,
            REG_PROGRAM_COUNTER => self.program_counter = value,
            _ => {
                if let Some(slot) = self.banked.slot_mut(index, bank) {
                    *slot = value;
                }
            }
        }
    }

    /// Saved status of `bank`, `None` for User/System which have none.
    #[must_use]
    pub fn spsr(&self, bank: Bank) -> Option<Psr> {
        match bank {
            Bank::User => None,
            _ => Some(self.banked.spsr[bank.index()]),
        }
    }

    /// Writes to the User/System bank are dropped.
    pub fn set_spsr(&mut self, bank: Bank, psr: Psr) {
        if bank != Bank::User {
            self.banked.spsr[bank.index()] = psr;
        }
    }

    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.program_counter
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.program_counter = new_value;
    }

    pub const fn advance_program_counter(&mut self, bytes: u32) {
        self.program_counter = self.program_counter.wrapping_add(bytes);
    }

    /// r0-r15 as seen from `bank`.
    #[must_use]
    pub fn to_array(&self, bank: Bank) -> [u32; 16] {
        std::array::from_fn(|i| self.register_at(i, bank))
    }
}
