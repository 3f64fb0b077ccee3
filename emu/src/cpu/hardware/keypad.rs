use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::io_device::IoDevice;

/// GBA button bit positions in KEYINPUT register (when pressed are set to 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GbaButton {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

/// Default handler of KEYINPUT (0x130) and KEYCNT (0x132).
///
/// Input mapping lives outside the core: a front end either drives this
/// handler through [`Keypad::set_button`] before attaching it, or attaches
/// its own device over the same range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keypad {
    pub key_input: u16,
    pub key_interrupt_control: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad {
    /// Create a new Keypad with all buttons released (all bits set to 1).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key_input: 0x03FF,
            key_interrupt_control: 0,
        }
    }

    /// Set button state: pressed = true, released = false.
    /// GBA uses active-low logic: bit 0 = pressed, bit 1 = released.
    pub const fn set_button(&mut self, button: GbaButton, pressed: bool) {
        if pressed {
            self.key_input &= !(button as u16);
        } else {
            self.key_input |= button as u16;
        }
    }
}

impl IoDevice for Keypad {
    type Address = u32;
    type Value = u8;

    fn read_at(&self, address: Self::Address) -> Self::Value {
        match address {
            0x130 => self.key_input.get_byte(0),
            0x131 => self.key_input.get_byte(1),
            0x132 => self.key_interrupt_control.get_byte(0),
            0x133 => self.key_interrupt_control.get_byte(1),
            _ => 0,
        }
    }

    fn write_at(&mut self, address: Self::Address, value: Self::Value) {
        match address {
            // KEYINPUT is read-only.
            0x132 => self.key_interrupt_control.set_byte(0, value),
            0x133 => self.key_interrupt_control.set_byte(1, value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_released_by_default() {
        let keypad = Keypad::default();
        assert_eq!(keypad.read_at(0x130), 0xFF);
        assert_eq!(keypad.read_at(0x131), 0x03);
    }

    #[test]
    fn check_press_is_active_low() {
        let mut keypad = Keypad::new();
        keypad.set_button(GbaButton::Start, true);
        assert_eq!(keypad.key_input, 0x03F7);

        keypad.write_at(0x130, 0x00);
        assert_eq!(keypad.key_input, 0x03F7);

        keypad.set_button(GbaButton::Start, false);
        assert_eq!(keypad.key_input, 0x03FF);
    }
}
