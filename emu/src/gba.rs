//! # GBA
//!
//! Owns the CPU (which owns the bus) and drives the instruction loop:
//!
//! ```text
//! step:  CPU instruction (or idle while halted) ─► active DMA transfers ─► timers
//! ```
//!
//! DMA runs to completion between two instructions, so the CPU never sees
//! a half-done transfer.

use crate::bus::Bus;
use crate::cartridge::GamePak;
use crate::cartridge_header::CartridgeHeader;
use crate::config::{BootMode, GbaConfig};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::hardware::dma::StartTiming;
use crate::cpu::hardware::internal_memory::{BIOS_SIZE, InternalMemory};
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::Bank;
use crate::cpu::registers::{REG_PROGRAM_COUNTER, REG_SP};
use crate::error::{CartridgeError, CpuError};

/// Cycles in one frame: 228 lines of 1232 cycles.
pub const CYCLES_PER_FRAME: u32 = 280_896;

const ROM_START: u32 = 0x0800_0000;
const SP_USER: u32 = 0x0300_7F00;
const SP_IRQ: u32 = 0x0300_7FA0;
const SP_SUPERVISOR: u32 = 0x0300_7FE0;

pub struct Gba {
    pub cpu: Arm7tdmi,

    /// `None` when the image is too short or malformed to carry a header.
    pub cartridge_header: Option<CartridgeHeader>,
}

impl Gba {
    /// Builds a powered-on system. Without a BIOS image a small stand-in is
    /// mapped that can only return from SWIs and dispatch IRQs.
    pub fn new(
        config: GbaConfig,
        bios: Option<&[u8]>,
        cartridge: Vec<u8>,
    ) -> Result<Self, CartridgeError> {
        let bios: [u8; BIOS_SIZE] = match bios {
            Some(image) => image
                .try_into()
                .map_err(|_| CartridgeError::BiosSize(image.len()))?,
            None => InternalMemory::bios_stub(),
        };

        let cartridge_header = match CartridgeHeader::new(&cartridge) {
            Ok(header) => Some(header),
            Err(error) => {
                tracing::debug!("no cartridge header: {error}");
                None
            }
        };

        let pak = GamePak::new(cartridge, config.backup);
        let bus = Bus::new(InternalMemory::new(&bios), Box::new(pak));
        let mut cpu = Arm7tdmi::new(bus);

        match config.boot {
            BootMode::Bios => {}
            BootMode::Direct => skip_bios(&mut cpu),
        }
        tracing::info!(
            "{:?} boot, PC={:#010X}",
            config.boot,
            cpu.read_register(REG_PROGRAM_COUNTER)
        );

        Ok(Self {
            cpu,
            cartridge_header,
        })
    }

    /// Runs one instruction, or idles until the next timer overflow while
    /// halted. Returns the cycles that went by.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        let cycles = if self.cpu.is_halted() {
            self.idle(u32::MAX)
        } else {
            self.cpu.step()?
        };
        Ok(cycles + self.after_cpu(cycles))
    }

    /// Runs until at least `cycle_budget` cycles went by and returns how
    /// many did. The last instruction may overshoot the budget.
    pub fn run(&mut self, cycle_budget: u32) -> Result<u32, CpuError> {
        let mut spent = 0;
        while spent < cycle_budget {
            let cycles = if self.cpu.is_halted() {
                self.idle(cycle_budget - spent)
            } else {
                self.cpu.step()?
            };
            spent += cycles + self.after_cpu(cycles);
        }
        Ok(spent)
    }

    /// Marks `interrupt` as requested in IF.
    pub fn set_pending(&mut self, interrupt: Interrupt) {
        self.cpu.bus.interrupt_control.request(interrupt);
    }

    /// Starts the channels waiting for `timing` and runs them. Returns the
    /// cycles the transfers took.
    pub fn dma_event(&mut self, timing: StartTiming) -> u32 {
        self.cpu.bus.dma.trigger(timing);
        let cycles = self.cpu.bus.run_dma();
        self.cpu.bus.tick(cycles);
        cycles
    }

    /// Cycles a halted CPU sleeps: up to the next timer overflow, bounded by
    /// `limit`. With no timer running, the whole `limit` (one cycle at least).
    fn idle(&self, limit: u32) -> u32 {
        let cycles = match self.cpu.bus.timers.cycles_until_overflow() {
            Some(overflow) => overflow.min(limit),
            None if limit == u32::MAX => 1,
            None => limit,
        };
        cycles.max(1)
    }

    /// Runs pending DMA and advances the timers by the time the CPU and the
    /// transfers took. Returns the DMA cycles.
    fn after_cpu(&mut self, cpu_cycles: u32) -> u32 {
        let dma_cycles = self.cpu.bus.run_dma();
        self.cpu.bus.tick(cpu_cycles + dma_cycles);
        dma_cycles
    }
}

/// State the BIOS leaves behind before jumping to the cartridge.
fn skip_bios(cpu: &mut Arm7tdmi) {
    cpu.registers.set_register_at(REG_SP, SP_IRQ, Bank::Irq);
    cpu.registers
        .set_register_at(REG_SP, SP_SUPERVISOR, Bank::Supervisor);

    cpu.cpsr = Psr::from(Mode::System);
    cpu.cpsr.set_cpu_state(CpuState::Arm);
    cpu.write_register(REG_SP, SP_USER);
    cpu.write_register(REG_PROGRAM_COUNTER, ROM_START);
    cpu.bus.interrupt_control.post_boot_flag = 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::REG_LR;
    use crate::error::CpuErrorKind;
    use pretty_assertions::assert_eq;

    const IWRAM: u32 = 0x0300_0000;
    const IO: u32 = 0x0400_0000;

    fn rom(program: &[u32]) -> Vec<u8> {
        program.iter().flat_map(|op| op.to_le_bytes()).collect()
    }

    /// Direct boot into a ROM spinning on `B .`.
    fn idle_gba() -> Gba {
        Gba::new(GbaConfig::default(), None, rom(&[0xEAFF_FFFE])).unwrap()
    }

    #[test]
    fn check_direct_boot_state() {
        let gba = idle_gba();
        let cpu = &gba.cpu;

        assert_eq!(cpu.cpsr().mode(), Mode::System);
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Arm);
        assert!(!cpu.cpsr().irq_disable());
        assert_eq!(cpu.read_register(REG_PROGRAM_COUNTER), ROM_START);
        assert_eq!(cpu.read_register(REG_SP), SP_USER);
        assert_eq!(cpu.registers.register_at(REG_SP, Bank::Irq), SP_IRQ);
        assert_eq!(
            cpu.registers.register_at(REG_SP, Bank::Supervisor),
            SP_SUPERVISOR
        );
        assert!(gba.cartridge_header.is_none());
    }

    #[test]
    fn check_bios_boot_state() {
        let config = GbaConfig {
            boot: BootMode::Bios,
            ..GbaConfig::default()
        };
        let gba = Gba::new(config, Some(&[0; BIOS_SIZE]), Vec::new()).unwrap();

        assert_eq!(gba.cpu.cpsr().mode(), Mode::Supervisor);
        assert!(gba.cpu.cpsr().irq_disable());
        assert_eq!(gba.cpu.read_register(REG_PROGRAM_COUNTER), 0);
    }

    #[test]
    fn check_bios_size_is_validated() {
        let result = Gba::new(GbaConfig::default(), Some(&[0; 16]), Vec::new());
        assert!(matches!(result, Err(CartridgeError::BiosSize(16))));
    }

    #[test]
    fn check_run_spends_budget() {
        let mut gba = idle_gba();
        // Each `B .` costs one 8-cycle ROM fetch plus two refill fetches.
        let spent = gba.run(100).unwrap();
        assert!(spent >= 100);
        assert!(spent < 100 + 24);
        assert_eq!(gba.cpu.read_register(REG_PROGRAM_COUNTER), ROM_START);
    }

    #[test]
    fn check_irq_round_trip_through_bios_stub() {
        let mut gba = idle_gba();

        let handler = [
            0xE3A0_5042, // MOV R5, #0x42
            0xE3A0_0301, // MOV R0, #0x04000000
            0xE280_0C02, // ADD R0, R0, #0x200
            0xE3A0_1001, // MOV R1, #1
            0xE1C0_10B2, // STRH R1, [R0, #2]  (acknowledge VBlank in IF)
            0xE12F_FF1E, // BX LR
        ];
        for (idx, op_code) in handler.iter().enumerate() {
            gba.cpu.bus.write_word(IWRAM + idx as u32 * 4, *op_code);
        }
        gba.cpu.bus.write_word(0x0300_7FFC, IWRAM);
        gba.cpu.bus.write_half_word(IO + 0x200, Interrupt::VBlank.mask());
        gba.cpu.bus.write_half_word(IO + 0x208, 1);

        gba.step().unwrap();
        gba.set_pending(Interrupt::VBlank);
        gba.step().unwrap();

        assert_eq!(gba.cpu.cpsr().mode(), Mode::Irq);
        assert_eq!(gba.cpu.read_register(REG_PROGRAM_COUNTER), 0x18);
        assert_eq!(gba.cpu.read_register(REG_LR), ROM_START + 4);
        assert_eq!(
            gba.cpu.spsr().map(|spsr| spsr.mode()),
            Some(Mode::System)
        );

        for _ in 0..50 {
            if gba.cpu.cpsr().mode() == Mode::System {
                break;
            }
            gba.step().unwrap();
        }

        assert_eq!(gba.cpu.cpsr().mode(), Mode::System);
        assert_eq!(gba.cpu.read_register(REG_PROGRAM_COUNTER), ROM_START);
        assert_eq!(gba.cpu.read_register(5), 0x42);
        assert_eq!(gba.cpu.bus.interrupt_control.interrupt_request, 0);
        assert_eq!(gba.cpu.registers.register_at(REG_SP, Bank::Irq), SP_IRQ);
    }

    #[test]
    fn check_immediate_dma_runs_after_instruction() {
        let mut gba = idle_gba();
        for idx in 0..4 {
            gba.cpu.bus.write_word(IWRAM + idx * 4, 0x1111_1111 * (idx + 1));
        }

        // DMA3: 4 words IWRAM -> IWRAM + 0x100, immediate, IRQ on completion.
        gba.cpu.bus.write_word(IO + 0xD4, IWRAM);
        gba.cpu.bus.write_word(IO + 0xD8, IWRAM + 0x100);
        gba.cpu.bus.write_half_word(IO + 0xDC, 4);
        gba.cpu.bus.write_half_word(IO + 0xDE, 0xC400);

        gba.step().unwrap();

        for idx in 0..4 {
            assert_eq!(
                gba.cpu.bus.read_word(IWRAM + 0x100 + idx * 4),
                0x1111_1111 * (idx + 1)
            );
        }
        assert!(!gba.cpu.bus.dma.channels[3].enabled());
        assert_eq!(
            gba.cpu.bus.interrupt_control.interrupt_request,
            Interrupt::Dma3.mask()
        );
    }

    #[test]
    fn check_dma_event_starts_waiting_channel() {
        let mut gba = idle_gba();
        gba.cpu.bus.write_word(IWRAM, 0xABCD_1234);

        // DMA0: one halfword on VBlank.
        gba.cpu.bus.write_word(IO + 0xB0, IWRAM);
        gba.cpu.bus.write_word(IO + 0xB4, IWRAM + 0x10);
        gba.cpu.bus.write_half_word(IO + 0xB8, 1);
        gba.cpu.bus.write_half_word(IO + 0xBA, 0x9000);

        gba.step().unwrap();
        assert_eq!(gba.cpu.bus.read_word(IWRAM + 0x10), 0);

        gba.dma_event(StartTiming::HBlank);
        assert_eq!(gba.cpu.bus.read_word(IWRAM + 0x10), 0);

        let cycles = gba.dma_event(StartTiming::VBlank);
        assert!(cycles > 0);
        assert_eq!(gba.cpu.bus.read_word(IWRAM + 0x10), 0x1234);
    }

    #[test]
    fn check_timer_overflow_raises_irq() {
        let mut gba = idle_gba();
        // Timer 0: reload 0xFFF0, prescaler 1, IRQ enabled.
        gba.cpu.bus.write_half_word(IO + 0x100, 0xFFF0);
        gba.cpu.bus.write_half_word(IO + 0x102, 0x00C0);

        gba.run(100).unwrap();

        assert_ne!(
            gba.cpu.bus.interrupt_control.interrupt_request & Interrupt::Timer0.mask(),
            0
        );
    }

    #[test]
    fn check_halt_wakes_on_timer() {
        let mut gba = idle_gba();
        gba.cpu.bus.write_half_word(IO + 0x200, Interrupt::Timer1.mask());
        // Timer 1: reload 0xFF00, prescaler 64, IRQ enabled.
        gba.cpu.bus.write_half_word(IO + 0x104, 0xFF00);
        gba.cpu.bus.write_half_word(IO + 0x106, 0x00C1);

        gba.cpu.bus.write_byte(IO + 0x301, 0);
        assert!(gba.cpu.is_halted());

        // 256 ticks of 64 cycles.
        let spent = gba.step().unwrap();
        assert_eq!(spent, 0x100 * 64);
        assert!(!gba.cpu.is_halted());
    }

    #[test]
    fn check_halt_consumes_budget() {
        let mut gba = idle_gba();
        gba.cpu.bus.write_byte(IO + 0x301, 0);

        let spent = gba.run(CYCLES_PER_FRAME).unwrap();
        assert_eq!(spent, CYCLES_PER_FRAME);
        assert!(gba.cpu.is_halted());
        assert_eq!(gba.cpu.read_register(REG_PROGRAM_COUNTER), ROM_START);
    }

    #[test]
    fn check_decode_error_stops_run() {
        // BX R0 into Thumb code at ROM + 8, which has no valid format.
        let mut program = rom(&[0xE28F_0001, 0xE12F_FF10, 0x0000_0000]);
        program.extend_from_slice(&0xE800_u16.to_le_bytes());
        let mut gba = Gba::new(GbaConfig::default(), None, program).unwrap();

        let error = gba.run(1000).unwrap_err();
        assert_eq!(error.kind, CpuErrorKind::DecodeError);
        assert_eq!(error.state, CpuState::Thumb);
        assert_eq!(error.pc, ROM_START + 12);
        assert_eq!(error.opcode, 0xE800);
    }
}
