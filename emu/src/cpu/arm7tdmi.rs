use crate::bus::{AccessWidth, Bus};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::exception::Exception;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::Bank;
use crate::cpu::registers::{REG_PROGRAM_COUNTER, Registers};
use crate::cpu::thumb::mode::ThumbModeOpcode;
use crate::error::{CpuError, CpuErrorKind, RegisterSnapshot};

/// Called after every retired instruction, skipped ones included.
pub type RetireHook = Box<dyn FnMut(&Retired)>;

/// A decoded instruction of either set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Arm(ArmModeOpcode),
    Thumb(ThumbModeOpcode),
}

impl Decoded {
    #[must_use]
    pub fn condition(&self) -> Condition {
        match self {
            Self::Arm(op_code) => op_code.condition,
            Self::Thumb(op_code) => op_code.condition(),
        }
    }
}

impl std::fmt::Display for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arm(op_code) => f.write_str(&op_code.instruction.disassembler(op_code.condition)),
            Self::Thumb(op_code) => f.write_str(&op_code.instruction.disassembler()),
        }
    }
}

/// What the retire hook sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retired {
    /// Address the instruction was fetched from.
    pub pc: u32,
    pub opcode: u32,
    pub decoded: Decoded,
    pub condition_passed: bool,
    pub cycles: u32,
}

pub struct Arm7tdmi {
    pub bus: Bus,

    pub cpsr: Psr,
    pub registers: Registers,

    /// Set whenever r15 is written, so that `step` does not advance it.
    pipeline_flushed: bool,
    retire_hook: Option<RetireHook>,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        Self::new(Bus::default())
    }
}

impl Arm7tdmi {
    /// Power-on state: Supervisor, ARM, IRQ and FIQ masked, PC at the reset
    /// vector.
    #[must_use]
    pub fn new(bus: Bus) -> Self {
        let mut cpsr = Psr::from(Mode::Supervisor);
        cpsr.set_cpu_state(CpuState::Arm);
        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);

        Self {
            bus,
            cpsr,
            registers: Registers::default(),
            pipeline_flushed: false,
            retire_hook: None,
        }
    }

    /// Bank currently mapped onto r8-r14.
    #[must_use]
    pub fn bank(&self) -> Bank {
        self.cpsr.mode().bank()
    }

    /// Raw register value in the current bank. r15 reads as the address of
    /// the instruction being executed.
    #[must_use]
    pub fn read_register(&self, index: usize) -> u32 {
        self.registers.register_at(index, self.bank())
    }

    /// Register value as an instruction operand: r15 reads ahead of the
    /// executing instruction by two instruction widths.
    #[must_use]
    pub fn operand_register(&self, index: usize) -> u32 {
        if index == REG_PROGRAM_COUNTER {
            self.registers
                .program_counter()
                .wrapping_add(self.cpsr.cpu_state().pipeline_offset())
        } else {
            self.read_register(index)
        }
    }

    /// Writes to r15 are aligned to the current state and flush the
    /// pipeline.
    pub fn write_register(&mut self, index: usize, value: u32) {
        if index == REG_PROGRAM_COUNTER {
            let aligned = match self.cpsr.cpu_state() {
                CpuState::Arm => value & !0b11,
                CpuState::Thumb => value & !0b1,
            };
            self.registers.set_program_counter(aligned);
            self.pipeline_flushed = true;
        } else {
            let bank = self.bank();
            self.registers.set_register_at(index, value, bank);
        }
    }

    /// User bank view, used by LDM/STM with the S bit set.
    #[must_use]
    pub fn read_user_register(&self, index: usize) -> u32 {
        self.registers.register_at(index, Bank::User)
    }

    pub fn write_user_register(&mut self, index: usize, value: u32) {
        if index == REG_PROGRAM_COUNTER {
            self.write_register(index, value);
        } else {
            self.registers.set_register_at(index, value, Bank::User);
        }
    }

    #[must_use]
    pub const fn cpsr(&self) -> Psr {
        self.cpsr
    }

    /// Saved status of the current mode, `None` in User/System.
    #[must_use]
    pub fn spsr(&self) -> Option<Psr> {
        self.registers.spsr(self.bank())
    }

    pub fn set_spsr(&mut self, psr: Psr) {
        let bank = self.bank();
        self.registers.set_spsr(bank, psr);
    }

    #[must_use]
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            registers: self.registers.to_array(self.bank()),
            cpsr: self.cpsr.into(),
            spsr: self.spsr().map(u32::from),
        }
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.bus.interrupt_control.is_halted()
    }

    pub fn set_retire_hook(&mut self, hook: RetireHook) {
        self.retire_hook = Some(hook);
    }

    fn fault(&self, kind: CpuErrorKind, pc: u32, opcode: u32) -> CpuError {
        let error = CpuError {
            kind,
            pc,
            opcode,
            state: self.cpsr.cpu_state(),
            snapshot: self.snapshot(),
        };
        tracing::error!("{error}");
        error
    }

    fn fetch_decode(&mut self, pc: u32) -> Result<(u32, Decoded), CpuError> {
        match self.cpsr.cpu_state() {
            CpuState::Arm => {
                let raw = self.bus.fetch_word(pc);
                let op_code = ArmModeOpcode::try_from(raw)
                    .map_err(|fault| self.fault(fault.into(), pc, raw))?;
                Ok((raw, Decoded::Arm(op_code)))
            }
            CpuState::Thumb => {
                let raw = self.bus.fetch_half_word(pc);
                let op_code = ThumbModeOpcode::try_from(raw)
                    .map_err(|fault| self.fault(fault.into(), pc, raw.into()))?;
                Ok((raw.into(), Decoded::Thumb(op_code)))
            }
        }
    }

    /// Cost of refilling the pipeline at the current PC: two fetches.
    fn refill_cycles(&self) -> u32 {
        let width = match self.cpsr.cpu_state() {
            CpuState::Arm => AccessWidth::Word,
            CpuState::Thumb => AccessWidth::HalfWord,
        };
        Bus::access_cost(self.registers.program_counter(), width) * 2
    }

    fn enter_irq(&mut self) -> u32 {
        // PC holds the next unexecuted instruction; the handler returns
        // with SUBS PC, LR, #4.
        let return_address = self.registers.program_counter().wrapping_add(4);
        self.raise_exception(Exception::Irq, return_address);
        self.pipeline_flushed = false;
        self.refill_cycles()
    }

    /// Executes one instruction, or enters the IRQ handler if an enabled
    /// interrupt is pending. Returns the cycles spent.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        if self.bus.interrupt_control.irq_pending() && !self.cpsr.irq_disable() {
            return Ok(self.enter_irq());
        }

        // Anything left over was spent outside the CPU.
        self.bus.take_access_cycles();

        let pc = self.registers.program_counter();
        let width = self.cpsr.cpu_state().instruction_width();
        self.pipeline_flushed = false;

        let (opcode, decoded) = self.fetch_decode(pc)?;
        let condition_passed = self.cpsr.can_execute(decoded.condition());

        let cycles = if condition_passed {
            let internal = match decoded {
                Decoded::Arm(op_code) => self.execute_arm(op_code),
                Decoded::Thumb(op_code) => Ok(self.execute_thumb(op_code)),
            }
            .map_err(|kind| self.fault(kind, pc, opcode))?;

            let mut cycles = self.bus.take_access_cycles() + internal;
            if self.pipeline_flushed {
                cycles += self.refill_cycles();
            } else {
                self.registers.advance_program_counter(width);
            }
            cycles
        } else {
            self.bus.take_access_cycles();
            self.registers.advance_program_counter(width);
            1
        };
        self.pipeline_flushed = false;

        let skipped = if condition_passed { "" } else { " [skipped]" };
        #[cfg(feature = "disassembler")]
        tracing::trace!("{pc:#010X} {opcode:08X} {decoded}{skipped} ({cycles} cycles)");
        #[cfg(not(feature = "disassembler"))]
        tracing::trace!("{pc:#010X} {opcode:08X}{skipped} ({cycles} cycles)");

        if let Some(hook) = self.retire_hook.as_mut() {
            hook(&Retired {
                pc,
                opcode,
                decoded,
                condition_passed,
                cycles,
            });
        }

        Ok(cycles)
    }
}
