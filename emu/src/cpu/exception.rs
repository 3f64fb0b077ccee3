//! # Exceptions
//!
//! | Exception          | Vector | Mode       | LR on entry (ARM/Thumb) | Return            |
//! |--------------------|--------|------------|-------------------------|-------------------|
//! | Reset              | 0x00   | Supervisor | -                       | -                 |
//! | Undefined          | 0x04   | Undefined  | next instruction        | MOVS PC, LR       |
//! | Software interrupt | 0x08   | Supervisor | next instruction        | MOVS PC, LR       |
//! | Prefetch abort     | 0x0C   | Abort      | -                       | -                 |
//! | Data abort         | 0x10   | Abort      | -                       | -                 |
//! | IRQ                | 0x18   | IRQ        | next instruction + 4    | SUBS PC, LR, #4   |
//! | FIQ                | 0x1C   | FIQ        | next instruction + 4    | SUBS PC, LR, #4   |
//!
//! Entry saves CPSR into the SPSR of the target mode, switches mode, enters
//! ARM state and masks IRQs (and FIQs for Reset/FIQ). Switching mode is all
//! it takes to bring the target bank's r13/r14 live.
//!
//! The GBA never raises aborts or FIQs; they are listed for completeness.

use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::CpuState;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Reset,
    Undefined,
    SoftwareInterrupt,
    PrefetchAbort,
    DataAbort,
    Irq,
    Fiq,
}

impl Exception {
    #[must_use]
    pub const fn vector(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::Undefined => 0x04,
            Self::SoftwareInterrupt => 0x08,
            Self::PrefetchAbort => 0x0C,
            Self::DataAbort => 0x10,
            Self::Irq => 0x18,
            Self::Fiq => 0x1C,
        }
    }

    #[must_use]
    pub const fn mode(self) -> Mode {
        match self {
            Self::Reset | Self::SoftwareInterrupt => Mode::Supervisor,
            Self::Undefined => Mode::Undefined,
            Self::PrefetchAbort | Self::DataAbort => Mode::Abort,
            Self::Irq => Mode::Irq,
            Self::Fiq => Mode::Fiq,
        }
    }

    const fn disables_fiq(self) -> bool {
        matches!(self, Self::Reset | Self::Fiq)
    }
}

impl Arm7tdmi {
    /// Enters `exception`, with `return_address` stored in the link
    /// register of the target mode.
    pub fn raise_exception(&mut self, exception: Exception, return_address: u32) {
        let old_cpsr = self.cpsr;
        let mode = exception.mode();

        tracing::debug!(
            "{exception:?} from {} at {:#010X}, LR={return_address:#010X}",
            old_cpsr.mode(),
            self.registers.program_counter()
        );

        self.cpsr.set_mode(mode);
        self.registers.set_spsr(mode.bank(), old_cpsr);
        self.registers
            .set_register_at(REG_LR, return_address, mode.bank());

        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        if exception.disables_fiq() {
            self.cpsr.set_fiq_disable(true);
        }

        self.write_register(REG_PROGRAM_COUNTER, exception.vector());
    }

    /// Copies the SPSR of the current mode back into CPSR, which also
    /// switches back the register bank. Does nothing in User/System mode.
    pub fn restore_cpsr_from_spsr(&mut self) {
        if let Some(spsr) = self.spsr() {
            self.cpsr = spsr;
        } else {
            tracing::debug!("no SPSR to restore in {} mode", self.cpsr.mode());
        }
    }
}
