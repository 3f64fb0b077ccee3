//! # Timers
//!
//! Four 16-bit up-counters. Each one either runs off the system clock
//! divided by its prescaler, or (timers 1-3) counts overflows of the timer
//! before it.
//!
//! ```text
//! TMxCNT_H
//!  15      8  7   6   5    3   2   1-0
//! ┌─────────┬───┬───┬───────┬───┬──────────┐
//! │ unused  │ E │ I │unused │ C │Prescaler │
//! └─────────┴───┴───┴───────┴───┴──────────┘
//!   E: enable  I: IRQ on overflow  C: cascade
//!   Prescaler: 0=F/1  1=F/64  2=F/256  3=F/1024
//! ```
//!
//! Cycles that do not fill a whole prescaler period are kept in a per-timer
//! remainder so nothing is lost between calls.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::io_device::IoDevice;

pub const PRESCALERS: [u32; 4] = [1, 64, 256, 1024];

const CONTROL_MASK: u16 = 0x00C7;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub counter: u16,
    pub reload: u16,
    control: u16,
    remainder: u32,
}

impl Timer {
    #[must_use]
    pub const fn control(&self) -> u16 {
        self.control
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.control.get_bit(7)
    }

    #[must_use]
    pub fn irq_enabled(&self) -> bool {
        self.control.get_bit(6)
    }

    #[must_use]
    pub fn cascade(&self) -> bool {
        self.control.get_bit(2)
    }

    #[must_use]
    pub fn prescaler(&self) -> u32 {
        PRESCALERS[usize::from(self.control & 0b11)]
    }

    /// A rising edge on the enable bit reloads the counter.
    pub fn set_control(&mut self, value: u16) {
        let was_enabled = self.enabled();
        self.control = value & CONTROL_MASK;
        if !was_enabled && self.enabled() {
            self.counter = self.reload;
            self.remainder = 0;
        }
    }

    /// Adds `ticks` to the counter and returns how many times it overflowed.
    fn increment(&mut self, ticks: u32) -> u32 {
        let to_overflow = 0x1_0000 - u32::from(self.counter);
        if ticks < to_overflow {
            self.counter += ticks as u16;
            return 0;
        }

        let period = 0x1_0000 - u32::from(self.reload);
        let left = ticks - to_overflow;
        self.counter = self.reload + (left % period) as u16;

        1 + left / period
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Timers {
    pub timers: [Timer; 4],
}

impl Timers {
    /// Advances every running timer by `cycles` and returns the IF bits of
    /// the timers that overflowed with their IRQ enabled.
    pub fn tick(&mut self, cycles: u32) -> u16 {
        let mut interrupts = 0;
        let mut previous_overflows = 0;

        for (idx, timer) in self.timers.iter_mut().enumerate() {
            if !timer.enabled() {
                previous_overflows = 0;
                continue;
            }

            // Timer 0 has nothing to cascade from.
            let ticks = if idx > 0 && timer.cascade() {
                previous_overflows
            } else {
                let total = timer.remainder + cycles;
                let prescaler = timer.prescaler();
                timer.remainder = total % prescaler;
                total / prescaler
            };

            let overflows = timer.increment(ticks);
            if overflows > 0 && timer.irq_enabled() {
                interrupts |= Interrupt::timer(idx).mask();
            }
            previous_overflows = overflows;
        }

        interrupts
    }

    /// Cycles until the first clock-driven timer overflows, used to skip
    /// ahead while the CPU is halted. Cascading timers only overflow after
    /// the one feeding them, so they never come first.
    #[must_use]
    pub fn cycles_until_overflow(&self) -> Option<u32> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(idx, timer)| timer.enabled() && !(*idx > 0 && timer.cascade()))
            .map(|(_, timer)| {
                let ticks = 0x1_0000 - u32::from(timer.counter);
                (ticks * timer.prescaler()).saturating_sub(timer.remainder)
            })
            .min()
    }
}

impl IoDevice for Timers {
    type Address = u32;
    type Value = u8;

    fn read_at(&self, address: Self::Address) -> Self::Value {
        let Some(timer) = self.timers.get(((address - 0x100) / 4) as usize) else {
            return 0;
        };
        match address & 0b11 {
            0 => timer.counter.get_byte(0),
            1 => timer.counter.get_byte(1),
            2 => timer.control.get_byte(0),
            _ => timer.control.get_byte(1),
        }
    }

    fn write_at(&mut self, address: Self::Address, value: Self::Value) {
        let Some(timer) = self.timers.get_mut(((address - 0x100) / 4) as usize) else {
            return;
        };
        match address & 0b11 {
            // Writes to the counter register go to the reload value.
            0 => timer.reload.set_byte(0, value),
            1 => timer.reload.set_byte(1, value),
            2 => {
                let mut control = timer.control;
                control.set_byte(0, value);
                timer.set_control(control);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn enable(timers: &mut Timers, idx: usize, control: u8) {
        timers.write_at(0x102 + 4 * idx as u32, control | 0x80);
    }

    #[test]
    fn check_overflow_with_cascade() {
        let mut timers = Timers::default();
        enable(&mut timers, 0, 0x40);
        enable(&mut timers, 1, 0x04);

        let interrupts = timers.tick(65541);

        assert_eq!(timers.timers[0].counter, 5);
        assert_eq!(timers.timers[1].counter, 1);
        assert_eq!(interrupts, Interrupt::Timer0.mask());
    }

    #[test]
    fn check_prescaler_remainder() {
        let mut timers = Timers::default();
        enable(&mut timers, 0, 0x01); // F/64

        for _ in 0..10 {
            timers.tick(10);
        }
        // 100 cycles = 1 tick and 36 left over.
        assert_eq!(timers.timers[0].counter, 1);
        timers.tick(28);
        assert_eq!(timers.timers[0].counter, 2);
    }

    #[test]
    fn check_reload_on_overflow() {
        let mut timers = Timers::default();
        timers.write_at(0x100, 0x00);
        timers.write_at(0x101, 0xFF); // reload 0xFF00
        enable(&mut timers, 0, 0x00);
        assert_eq!(timers.timers[0].counter, 0xFF00);

        // 0x100 to the first overflow, then 3 more periods of 0x100 and 0x10 extra.
        timers.tick(0x100 + 0x300 + 0x10);
        assert_eq!(timers.timers[0].counter, 0xFF10);
    }

    #[test]
    fn check_timer_zero_ignores_cascade() {
        let mut timers = Timers::default();
        enable(&mut timers, 0, 0x04);
        timers.tick(3);
        assert_eq!(timers.timers[0].counter, 3);
    }

    #[test]
    fn check_reads_return_live_counter() {
        let mut timers = Timers::default();
        timers.write_at(0x104, 0x34);
        timers.write_at(0x105, 0x12);
        enable(&mut timers, 1, 0x00);
        timers.tick(2);

        assert_eq!(timers.read_at(0x104), 0x36);
        assert_eq!(timers.read_at(0x105), 0x12);
        assert_eq!(timers.read_at(0x106), 0x80);
    }

    #[test]
    fn check_cycles_until_overflow() {
        let mut timers = Timers::default();
        assert_eq!(timers.cycles_until_overflow(), None);

        enable(&mut timers, 2, 0x01);
        timers.tick(10);
        assert_eq!(timers.cycles_until_overflow(), Some(0x1_0000 * 64 - 10));
    }
}
