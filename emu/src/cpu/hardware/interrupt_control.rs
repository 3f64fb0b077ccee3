//! # Interrupt Controller
//!
//! ```text
//!              set_pending(source)            IME && !I && (IE & IF) != 0
//!   ┌──────┐ ───────────────────► ┌─────────┐ ───────────────────────────► ┌───────┐
//!   │ Idle │                      │ Pending │                              │ Taken │
//!   └──────┘ ◄─────────────────── └─────────┘                              └───────┘
//!               write 1 to IF bit
//! ```
//!
//! | Offset | Register | Access                                   |
//! |--------|----------|------------------------------------------|
//! | 0x200  | IE       | R/W                                      |
//! | 0x202  | IF       | R, writing 1 clears the bit              |
//! | 0x204  | WAITCNT  | R/W, stored only                         |
//! | 0x208  | IME      | R/W, only bit 0 matters                  |
//! | 0x300  | POSTFLG  | R/W                                      |
//! | 0x301  | HALTCNT  | W, any write halts the CPU               |
//!
//! A halted CPU wakes as soon as `IE & IF != 0`, regardless of IME and of
//! the CPSR I bit.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::io_device::IoDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

impl Interrupt {
    const TIMERS: [Self; 4] = [Self::Timer0, Self::Timer1, Self::Timer2, Self::Timer3];
    const DMAS: [Self; 4] = [Self::Dma0, Self::Dma1, Self::Dma2, Self::Dma3];

    /// Bit of this source in IE and IF.
    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }

    /// Overflow source of timer `index` (only the two low bits are used).
    #[must_use]
    pub const fn timer(index: usize) -> Self {
        Self::TIMERS[index & 0b11]
    }

    /// Completion source of DMA channel `index` (only the two low bits are used).
    #[must_use]
    pub const fn dma(index: usize) -> Self {
        Self::DMAS[index & 0b11]
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InterruptControl {
    pub interrupt_enable: u16,

    /// Interrupt Request Flags (IF), bits are set when interrupts are requested,
    /// cleared by writing 1 to the corresponding bit
    pub interrupt_request: u16,
    pub wait_state_control: u16,
    pub interrupt_master_enable: u16,
    pub post_boot_flag: u8,
    halted: bool,
}

impl InterruptControl {
    /// Marks `interrupt` as pending. Wakes a halted CPU if it is enabled.
    pub fn request(&mut self, interrupt: Interrupt) {
        self.raise(interrupt.mask());
    }

    /// Marks every source in `mask` as pending.
    pub fn raise(&mut self, mask: u16) {
        self.interrupt_request |= mask & 0x3FFF;
        self.update_halt();
    }

    /// Write-1-to-clear on IF.
    pub const fn acknowledge(&mut self, mask: u16) {
        self.interrupt_request &= !mask;
    }

    /// Whether an IRQ exception should be taken at the next instruction
    /// boundary (the CPSR I bit is checked by the CPU).
    #[must_use]
    pub const fn irq_pending(&self) -> bool {
        self.interrupt_master_enable & 1 == 1 && self.wake_condition()
    }

    #[must_use]
    pub const fn wake_condition(&self) -> bool {
        self.interrupt_enable & self.interrupt_request & 0x3FFF != 0
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt(&mut self) {
        self.halted = true;
        self.update_halt();
    }

    fn update_halt(&mut self) {
        if self.halted && self.wake_condition() {
            tracing::debug!(
                "waking from halt, IE={:04X} IF={:04X}",
                self.interrupt_enable,
                self.interrupt_request
            );
            self.halted = false;
        }
    }
}

impl IoDevice for InterruptControl {
    type Address = u32;
    type Value = u8;

    fn read_at(&self, address: Self::Address) -> Self::Value {
        match address {
            0x200 => self.interrupt_enable.get_byte(0),
            0x201 => self.interrupt_enable.get_byte(1),
            0x202 => self.interrupt_request.get_byte(0),
            0x203 => self.interrupt_request.get_byte(1),
            0x204 => self.wait_state_control.get_byte(0),
            0x205 => self.wait_state_control.get_byte(1),
            0x208 => self.interrupt_master_enable.get_byte(0),
            0x209 => self.interrupt_master_enable.get_byte(1),
            0x300 => self.post_boot_flag,
            _ => 0,
        }
    }

    fn write_at(&mut self, address: Self::Address, value: Self::Value) {
        match address {
            0x200 => {
                self.interrupt_enable.set_byte(0, value);
                self.update_halt();
            }
            0x201 => {
                self.interrupt_enable.set_byte(1, value);
                self.update_halt();
            }
            0x202 => self.acknowledge(u16::from(value)),
            0x203 => self.acknowledge(u16::from(value) << 8),
            0x204 => self.wait_state_control.set_byte(0, value),
            0x205 => self.wait_state_control.set_byte(1, value),
            0x208 => self.interrupt_master_enable.set_byte(0, value),
            0x209 => self.interrupt_master_enable.set_byte(1, value),
            0x300 => self.post_boot_flag = value & 1,
            // Bit 7 selects STOP, which needs the LCD/sound collaborators to
            // power down. Both are treated as HALT.
            0x301 => self.halt(),
            _ => {}
        }
    }
}
