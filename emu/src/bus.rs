//! # Memory Bus
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬───────────┬─────────────────┐
//! │ Top byte     │ Region                   │ Mirror    │ Cycles 8/16/32  │
//! ├──────────────┼──────────────────────────┼───────────┼─────────────────┤
//! │ 0x00         │ BIOS (16 KiB, protected) │ -         │ 1 / 1 / 1       │
//! │ 0x02         │ EWRAM (256 KiB)          │ 256 KiB   │ 3 / 3 / 6       │
//! │ 0x03         │ IWRAM (32 KiB)           │ 32 KiB    │ 1 / 1 / 1       │
//! │ 0x04         │ I/O registers            │ -         │ 1 / 1 / 1       │
//! │ 0x05         │ Palette RAM (1 KiB)      │ 1 KiB     │ 1 / 1 / 2       │
//! │ 0x06         │ VRAM (96 KiB)            │ 128 KiB   │ 1 / 1 / 2       │
//! │ 0x07         │ OAM (1 KiB)              │ 1 KiB     │ 1 / 1 / 1       │
//! │ 0x08-0x0D    │ Game Pak ROM             │ 3 windows │ 5 / 5 / 8       │
//! │ 0x0E-0x0F    │ Game Pak backup          │ 64 KiB    │ 5 / 5 / 8       │
//! │ anything else│ open bus                 │           │ 1 / 1 / 1       │
//! └──────────────┴──────────────────────────┴───────────┴─────────────────┘
//! ```
//!
//! Halfword and word accesses are force-aligned here. Rotating misaligned
//! loads is left to the CPU, which knows which instruction asked.
//!
//! Every access adds its cost to a counter the CPU drains with
//! [`Bus::take_access_cycles`] once per instruction.

use std::ops::RangeInclusive;

use crate::bitwise::Bits;
use crate::cartridge::{Cartridge, GamePak};
use crate::cpu::hardware::dma::Dma;
use crate::cpu::hardware::internal_memory::{BIOS_SIZE, InternalMemory};
use crate::cpu::hardware::interrupt_control::InterruptControl;
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::timers::Timers;
use crate::io_device::IoDevice;

pub type BoxedIoDevice = Box<dyn IoDevice<Address = u32, Value = u8>>;

const IO_SIZE: u32 = 0x400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    HalfWord,
    Word,
}

struct AttachedDevice {
    range: RangeInclusive<u32>,
    device: BoxedIoDevice,
}

pub struct Bus {
    pub internal_memory: InternalMemory,
    cartridge: Box<dyn Cartridge>,

    pub interrupt_control: InterruptControl,
    pub timers: Timers,
    pub dma: Dma,
    io_devices: Vec<AttachedDevice>,

    /// I/O offsets nobody handles, so software reads back what it wrote.
    io_registers: Vec<u8>,

    /// Last opcode fetched, what an unmapped read sees on the bus.
    last_fetched: u32,
    last_bios_fetch: u32,
    executing_bios: bool,

    access_cycles: u32,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(InternalMemory::default(), Box::new(GamePak::default()))
    }
}

impl Bus {
    #[must_use]
    pub fn new(internal_memory: InternalMemory, cartridge: Box<dyn Cartridge>) -> Self {
        let mut bus = Self {
            internal_memory,
            cartridge,
            interrupt_control: InterruptControl::default(),
            timers: Timers::default(),
            dma: Dma::default(),
            io_devices: Vec::new(),
            io_registers: vec![0; IO_SIZE as usize],
            last_fetched: 0,
            last_bios_fetch: 0,
            executing_bios: false,
            access_cycles: 0,
        };
        bus.attach_io_device(0x130..=0x133, Box::new(Keypad::new()));
        bus
    }

    /// Routes the I/O offsets in `range` to `device`. Devices previously
    /// attached over an overlapping range are dropped.
    pub fn attach_io_device(&mut self, range: RangeInclusive<u32>, device: BoxedIoDevice) {
        self.io_devices.retain(|attached| {
            attached.range.end() < range.start() || attached.range.start() > range.end()
        });
        self.io_devices.push(AttachedDevice { range, device });
    }

    #[must_use]
    pub fn cartridge(&self) -> &dyn Cartridge {
        self.cartridge.as_ref()
    }

    /// Cycles spent on bus accesses since the last call.
    pub fn take_access_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.access_cycles)
    }

    /// Cycles one access of `width` at `address` costs.
    #[must_use]
    pub const fn access_cost(address: u32, width: AccessWidth) -> u32 {
        let wide = matches!(width, AccessWidth::Word);
        match address >> 24 {
            0x02 => {
                if wide {
                    6
                } else {
                    3
                }
            }
            0x05 | 0x06 => {
                if wide {
                    2
                } else {
                    1
                }
            }
            0x08..=0x0F => {
                if wide {
                    8
                } else {
                    5
                }
            }
            _ => 1,
        }
    }

    /// Advances the timers and raises their overflow interrupts.
    pub fn tick(&mut self, cycles: u32) {
        let interrupts = self.timers.tick(cycles);
        if interrupts != 0 {
            self.interrupt_control.raise(interrupts);
        }
    }

    fn open_bus(&self, address: u32) -> u8 {
        tracing::debug!("open bus read at {address:#010X}");
        self.last_fetched.get_byte((address & 0b11) as u8)
    }

    fn read_bios(&self, address: u32) -> u8 {
        if self.executing_bios {
            self.internal_memory
                .read_at(address)
                .unwrap_or_else(|| self.open_bus(address))
        } else {
            self.last_bios_fetch.get_byte((address & 0b11) as u8)
        }
    }

    fn read_io(&self, address: u32) -> u8 {
        let offset = address & 0x00FF_FFFF;
        match offset {
            0x0B0..=0x0DF => self.dma.read_at(offset),
            0x100..=0x10F => self.timers.read_at(offset),
            0x200..=0x20B | 0x300..=0x301 => self.interrupt_control.read_at(offset),
            _ if offset < IO_SIZE => self
                .io_devices
                .iter()
                .find(|attached| attached.range.contains(&offset))
                .map_or(self.io_registers[offset as usize], |attached| {
                    attached.device.read_at(offset)
                }),
            _ => self.open_bus(address),
        }
    }

    fn write_io(&mut self, address: u32, value: u8) {
        let offset = address & 0x00FF_FFFF;
        match offset {
            0x0B0..=0x0DF => self.dma.write_at(offset, value),
            0x100..=0x10F => self.timers.write_at(offset, value),
            0x200..=0x20B | 0x300..=0x301 => self.interrupt_control.write_at(offset, value),
            _ if offset < IO_SIZE => {
                if let Some(attached) = self
                    .io_devices
                    .iter_mut()
                    .find(|attached| attached.range.contains(&offset))
                {
                    attached.device.write_at(offset, value);
                } else {
                    self.io_registers[offset as usize] = value;
                }
            }
            _ => tracing::debug!("unmapped I/O write {value:#04X} at {address:#010X}"),
        }
    }

    fn read_raw(&self, address: u32) -> u8 {
        match address >> 24 {
            0x00 if address < BIOS_SIZE as u32 => self.read_bios(address),
            0x02 | 0x03 | 0x05 | 0x06 | 0x07 => self
                .internal_memory
                .read_at(address)
                .unwrap_or_else(|| self.open_bus(address)),
            0x04 => self.read_io(address),
            0x08..=0x0F => self.cartridge.read(address),
            _ => self.open_bus(address),
        }
    }

    fn write_raw(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x04 => self.write_io(address, value),
            0x08..=0x0F => self.cartridge.write(address, value),
            _ => {
                if !self.internal_memory.write_at(address, value) {
                    tracing::debug!("unmapped write {value:#04X} at {address:#010X}");
                }
            }
        }
    }

    pub fn read_byte(&mut self, address: u32) -> u8 {
        self.access_cycles += Self::access_cost(address, AccessWidth::Byte);
        self.read_raw(address)
    }

    pub fn read_half_word(&mut self, address: u32) -> u16 {
        let address = address & !1;
        self.access_cycles += Self::access_cost(address, AccessWidth::HalfWord);
        u16::from_le_bytes([self.read_raw(address), self.read_raw(address + 1)])
    }

    pub fn read_word(&mut self, address: u32) -> u32 {
        let address = address & !3;
        self.access_cycles += Self::access_cost(address, AccessWidth::Word);
        u32::from_le_bytes([
            self.read_raw(address),
            self.read_raw(address + 1),
            self.read_raw(address + 2),
            self.read_raw(address + 3),
        ])
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        self.access_cycles += Self::access_cost(address, AccessWidth::Byte);
        match address >> 24 {
            // Palette and VRAM have a 16-bit data bus: the byte lands in
            // both halves.
            0x05 | 0x06 => {
                let address = address & !1;
                self.write_raw(address, value);
                self.write_raw(address + 1, value);
            }
            0x07 => tracing::debug!("ignoring 8-bit OAM write at {address:#010X}"),
            _ => self.write_raw(address, value),
        }
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) {
        let address = address & !1;
        self.access_cycles += Self::access_cost(address, AccessWidth::HalfWord);
        for (idx, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_raw(address + idx as u32, byte);
        }
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        let address = address & !3;
        self.access_cycles += Self::access_cost(address, AccessWidth::Word);
        for (idx, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_raw(address + idx as u32, byte);
        }
    }

    /// Width-generic read, zero-extended to 32 bits.
    pub fn read(&mut self, width: AccessWidth, address: u32) -> u32 {
        match width {
            AccessWidth::Byte => self.read_byte(address).into(),
            AccessWidth::HalfWord => self.read_half_word(address).into(),
            AccessWidth::Word => self.read_word(address),
        }
    }

    /// Width-generic write, `value` is truncated to `width`.
    pub fn write(&mut self, width: AccessWidth, address: u32, value: u32) {
        match width {
            AccessWidth::Byte => self.write_byte(address, value as u8),
            AccessWidth::HalfWord => self.write_half_word(address, value as u16),
            AccessWidth::Word => self.write_word(address, value),
        }
    }

    /// ARM instruction fetch. Updates the open bus and BIOS latches.
    pub fn fetch_word(&mut self, address: u32) -> u32 {
        self.executing_bios = address < BIOS_SIZE as u32;
        let op_code = self.read_word(address);
        self.last_fetched = op_code;
        if self.executing_bios {
            self.last_bios_fetch = op_code;
        }
        op_code
    }

    /// Thumb instruction fetch. The opcode shows up on both halves of the
    /// open bus.
    pub fn fetch_half_word(&mut self, address: u32) -> u16 {
        self.executing_bios = address < BIOS_SIZE as u32;
        let op_code = self.read_half_word(address);
        self.last_fetched = u32::from(op_code) * 0x0001_0001;
        if self.executing_bios {
            self.last_bios_fetch = self.last_fetched;
        }
        op_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::BackupKind;
    use pretty_assertions::assert_eq;

    struct Latch(u8);

    impl IoDevice for Latch {
        type Address = u32;
        type Value = u8;

        fn read_at(&self, _address: u32) -> u8 {
            self.0
        }

        fn write_at(&mut self, _address: u32, value: u8) {
            self.0 = value.wrapping_add(1);
        }
    }

    #[test]
    fn test_word_round_trip_in_iwram() {
        let mut bus = Bus::default();
        bus.write_word(0x0300_0102, 0xDEAD_BEEF);
        // Force-aligned to 0x03000100.
        assert_eq!(bus.read_word(0x0300_0100), 0xDEAD_BEEF);
        assert_eq!(bus.read_half_word(0x0300_0103), 0xDEAD);
        assert_eq!(bus.read_byte(0x0300_0100), 0xEF);
    }

    #[test]
    fn test_open_bus_returns_last_fetch() {
        let mut bus = Bus::default();
        bus.write_word(0x0300_0000, 0x1234_5678);
        bus.fetch_word(0x0300_0000);

        assert_eq!(bus.read_word(0x1000_0000), 0x1234_5678);
        assert_eq!(bus.read_byte(0x0000_4001), 0x56);
    }

    #[test]
    fn test_bios_protection() {
        let mut bus = Bus::default();
        // Executing from the BIOS: reads are honored.
        let swi_vector = bus.fetch_word(0x0000_0008);
        assert_eq!(swi_vector, 0xE1B0_F00E);
        assert_eq!(bus.read_word(0x0000_0018), 0xEA00_0042);

        // Outside of the BIOS the last BIOS fetch is returned instead.
        bus.fetch_word(0x0300_0000);
        assert_eq!(bus.read_word(0x0000_0018), 0xE1B0_F00E);

        // Writes are discarded.
        bus.write_word(0x0000_0008, 0);
        bus.fetch_word(0x0000_0000);
        assert_eq!(bus.read_word(0x0000_0008), 0xE1B0_F00E);
    }

    #[test]
    fn test_io_dispatch() {
        let mut bus = Bus::default();

        // IE/IF through the interrupt controller.
        bus.write_half_word(0x0400_0200, 0x0001);
        bus.interrupt_control.interrupt_request = 0x0003;
        bus.write_half_word(0x0400_0202, 0x0002);
        assert_eq!(bus.read_half_word(0x0400_0202), 0x0001);

        // Default keypad: nothing pressed.
        assert_eq!(bus.read_half_word(0x0400_0130), 0x03FF);

        // Unhandled offsets are latched.
        bus.write_half_word(0x0400_0000, 0x0403);
        assert_eq!(bus.read_half_word(0x0400_0000), 0x0403);
    }

    #[test]
    fn test_attach_io_device_replaces_overlap() {
        let mut bus = Bus::default();
        bus.attach_io_device(0x130..=0x131, Box::new(Latch(0x42)));
        assert_eq!(bus.read_byte(0x0400_0130), 0x42);

        bus.write_byte(0x0400_0131, 7);
        assert_eq!(bus.read_byte(0x0400_0130), 8);
        // The keypad was dropped, KEYCNT now falls back to the latch store.
        assert_eq!(bus.read_byte(0x0400_0132), 0);
    }

    #[test]
    fn test_haltcnt_halts() {
        let mut bus = Bus::default();
        bus.write_byte(0x0400_0301, 0);
        assert!(bus.interrupt_control.is_halted());
    }

    #[test]
    fn test_timer_tick_raises_interrupt() {
        let mut bus = Bus::default();
        bus.write_word(0x0400_0100, 0x00C0_FFFF);
        bus.tick(1);
        assert_eq!(bus.interrupt_control.interrupt_request, 0b1000);
        assert_eq!(bus.read_half_word(0x0400_0100), 0xFFFF);
    }

    #[test]
    fn test_access_costs() {
        let mut bus = Bus::new(
            InternalMemory::default(),
            Box::new(GamePak::new(vec![0; 16], BackupKind::None)),
        );
        bus.read_word(0x0200_0000);
        assert_eq!(bus.take_access_cycles(), 6);
        bus.read_half_word(0x0800_0000);
        bus.read_byte(0x0300_0000);
        assert_eq!(bus.take_access_cycles(), 6);
        bus.write_word(0x0600_0000, 0);
        assert_eq!(bus.take_access_cycles(), 2);
        assert_eq!(bus.take_access_cycles(), 0);
    }

    #[test]
    fn test_palette_byte_write_is_duplicated() {
        let mut bus = Bus::default();
        bus.write_byte(0x0500_0003, 0x1F);
        assert_eq!(bus.read_half_word(0x0500_0002), 0x1F1F);

        bus.write_byte(0x0700_0000, 0x1F);
        assert_eq!(bus.read_byte(0x0700_0000), 0);
    }

    #[test]
    fn test_generic_access() {
        let mut bus = Bus::default();
        bus.write(AccessWidth::HalfWord, 0x0200_0010, 0xABCD_1234);
        assert_eq!(bus.read(AccessWidth::Word, 0x0200_0010), 0x1234);
        assert_eq!(bus.read(AccessWidth::Byte, 0x0200_0011), 0x12);
    }
}
