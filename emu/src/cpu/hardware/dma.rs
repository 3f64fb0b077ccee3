//! # DMA Controller
//!
//! Four channels, 12 bytes of registers each starting at `0x0B0`:
//!
//! ```text
//! +0x0  SAD    source address (W)
//! +0x4  DAD    destination address (W)
//! +0x8  CNT_L  word count (W)
//! +0xA  CNT_H  control (R/W)
//!
//! CNT_H
//!   15   14   13-12   11   10   9    8-7      6-5
//! ┌────┬────┬───────┬────┬────┬────┬────────┬────────┐
//! │ E  │ I  │Timing │DRQ │ W  │ R  │ Src ctl│ Dst ctl│
//! └────┴────┴───────┴────┴────┴────┴────────┴────────┘
//! ```
//!
//! Source, destination and count are latched when the enable bit goes from
//! 0 to 1. A triggered channel copies its whole count in one go: the CPU
//! does not run while it transfers. Channel 0 has the highest priority.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::io_device::IoDevice;

pub const CHANNELS: usize = 4;

/// Internal processing cycles charged for every transfer block.
const TRANSFER_OVERHEAD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    /// Increment during the transfer and restore the destination on repeat.
    IncrementReload,
}

impl From<u16> for AddressControl {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Increment,
            1 => Self::Decrement,
            2 => Self::Fixed,
            _ => Self::IncrementReload,
        }
    }
}

impl AddressControl {
    const fn step(self, address: u32, width: u32) -> u32 {
        match self {
            Self::Increment | Self::IncrementReload => address.wrapping_add(width),
            Self::Decrement => address.wrapping_sub(width),
            Self::Fixed => address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartTiming {
    Immediate,
    VBlank,
    HBlank,
    /// Sound FIFO for channels 1-2, video capture for channel 3.
    Special,
}

impl From<u16> for StartTiming {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Immediate,
            1 => Self::VBlank,
            2 => Self::HBlank,
            _ => Self::Special,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaChannel {
    pub source_address: u32,
    pub destination_address: u32,
    pub word_count: u16,
    control: u16,

    internal_source: u32,
    internal_destination: u32,
    internal_count: u32,

    /// Triggered and waiting to be serviced between two instructions.
    active: bool,
}

impl DmaChannel {
    #[must_use]
    pub const fn control(&self) -> u16 {
        self.control
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.control.get_bit(15)
    }

    #[must_use]
    pub fn irq_enabled(&self) -> bool {
        self.control.get_bit(14)
    }

    #[must_use]
    pub fn start_timing(&self) -> StartTiming {
        self.control.get_bits(12..=13).into()
    }

    #[must_use]
    pub fn word_transfer(&self) -> bool {
        self.control.get_bit(10)
    }

    #[must_use]
    pub fn repeat(&self) -> bool {
        self.control.get_bit(9)
    }

    #[must_use]
    pub fn source_control(&self) -> AddressControl {
        self.control.get_bits(7..=8).into()
    }

    #[must_use]
    pub fn destination_control(&self) -> AddressControl {
        self.control.get_bits(5..=6).into()
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Dma {
    pub channels: [DmaChannel; CHANNELS],
}

const fn source_mask(idx: usize) -> u32 {
    if idx == 3 { 0x0FFF_FFFF } else { 0x07FF_FFFF }
}

const fn destination_mask(idx: usize) -> u32 {
    if idx == 3 { 0x0FFF_FFFF } else { 0x07FF_FFFF }
}

/// Latched word count, where 0 means the maximum.
fn latched_count(idx: usize, word_count: u16) -> u32 {
    match (idx, word_count) {
        (3, 0) => 0x1_0000,
        (_, 0) => 0x4000,
        (3, count) => u32::from(count),
        (_, count) => u32::from(count & 0x3FFF),
    }
}

impl Dma {
    /// Activates every enabled channel waiting for `timing`.
    pub fn trigger(&mut self, timing: StartTiming) {
        for channel in &mut self.channels {
            if channel.enabled() && channel.start_timing() == timing {
                channel.active = true;
            }
        }
    }

    #[must_use]
    pub fn has_active(&self) -> bool {
        self.channels.iter().any(DmaChannel::is_active)
    }

    fn write_control(&mut self, idx: usize, value: u16) {
        let channel = &mut self.channels[idx];
        let was_enabled = channel.enabled();
        channel.control = value & 0xFFE0;

        if !was_enabled && channel.enabled() {
            channel.internal_source = channel.source_address & source_mask(idx);
            channel.internal_destination = channel.destination_address & destination_mask(idx);
            channel.internal_count = latched_count(idx, channel.word_count);
            channel.active = channel.start_timing() == StartTiming::Immediate;
        } else if !channel.enabled() {
            channel.active = false;
        }
    }
}

impl IoDevice for Dma {
    type Address = u32;
    type Value = u8;

    fn read_at(&self, address: Self::Address) -> Self::Value {
        let offset = address - 0xB0;
        let Some(channel) = self.channels.get((offset / 12) as usize) else {
            return 0;
        };
        // Only the control register can be read back.
        match offset % 12 {
            10 => channel.control.get_byte(0),
            11 => channel.control.get_byte(1),
            _ => 0,
        }
    }

    fn write_at(&mut self, address: Self::Address, value: Self::Value) {
        let offset = address - 0xB0;
        let idx = (offset / 12) as usize;
        let Some(channel) = self.channels.get_mut(idx) else {
            return;
        };
        match offset % 12 {
            byte @ 0..=3 => channel.source_address.set_byte(byte as u8, value),
            byte @ 4..=7 => channel.destination_address.set_byte(byte as u8 - 4, value),
            8 => channel.word_count.set_byte(0, value),
            9 => channel.word_count.set_byte(1, value),
            byte => {
                let mut control = channel.control;
                control.set_byte(byte as u8 - 10, value);
                self.write_control(idx, control);
            }
        }
    }
}

fn is_cartridge(address: u32) -> bool {
    (0x0800_0000..=0x0DFF_FFFF).contains(&address)
}

impl Bus {
    /// Runs every active channel to completion, highest priority first, and
    /// returns the cycles the transfers took.
    pub fn run_dma(&mut self) -> u32 {
        let mut cycles = 0;
        for idx in 0..CHANNELS {
            if self.dma.channels[idx].active {
                self.transfer(idx);
                cycles += self.take_access_cycles() + TRANSFER_OVERHEAD;
            }
        }
        cycles
    }

    fn transfer(&mut self, idx: usize) {
        let channel = self.dma.channels[idx];
        let width = if channel.word_transfer() { 4 } else { 2 };
        // Reload is not a valid source adjustment, it behaves as increment.
        let source_control = match channel.source_control() {
            AddressControl::IncrementReload => AddressControl::Increment,
            control => control,
        };
        let destination_control = channel.destination_control();

        let mut source = channel.internal_source;
        let mut destination = channel.internal_destination;

        tracing::debug!(
            "DMA{idx}: {} x{width} {source:#010X} -> {destination:#010X}",
            channel.internal_count
        );

        for _ in 0..channel.internal_count {
            if is_cartridge(destination) && idx != 3 {
                tracing::debug!("DMA{idx}: skipping write to cartridge {destination:#010X}");
            } else if width == 4 {
                let value = self.read_word(source & !3);
                self.write_word(destination & !3, value);
            } else {
                let value = self.read_half_word(source & !1);
                self.write_half_word(destination & !1, value);
            }
            source = source_control.step(source, width);
            destination = destination_control.step(destination, width);
        }

        // The transfer may have written this channel's own registers: only
        // the internal state and the enable bit are updated here.
        let live = &mut self.dma.channels[idx];
        live.internal_source = source;
        live.internal_destination = destination;
        live.active = false;

        if channel.repeat() && channel.start_timing() != StartTiming::Immediate {
            live.internal_count = latched_count(idx, live.word_count);
            if destination_control == AddressControl::IncrementReload {
                live.internal_destination = live.destination_address & destination_mask(idx);
            }
        } else {
            live.control.set_bit_off(15);
        }

        if channel.irq_enabled() {
            self.interrupt_control.request(Interrupt::dma(idx));
        }
    }
}
