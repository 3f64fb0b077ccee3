//! # Game Pak
//!
//! ```text
//! 0x08000000-0x09FFFFFF  ROM, wait state 0
//! 0x0A000000-0x0BFFFFFF  ROM, wait state 1 (mirror)
//! 0x0C000000-0x0DFFFFFF  ROM, wait state 2 (mirror)
//! 0x0E000000-0x0E00FFFF  backup storage, 8-bit bus, mirrored up to 0x0FFFFFFF
//! ```
//!
//! The core only needs a byte-wide read/write surface. Backup protocols
//! (flash command sequences, EEPROM serial framing) belong to whatever
//! implements [`Cartridge`]; [`GamePak`] stores backup bytes as plain memory.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Kind of backup storage, supplied at load time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupKind {
    #[default]
    None,
    Sram,
    Flash64K,
    Flash128K,
    Eeprom,
}

impl BackupKind {
    /// Bytes of storage behind the backup window.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Sram | Self::Flash64K => 0x1_0000,
            Self::Flash128K => 0x2_0000,
            Self::Eeprom => 0x2000,
        }
    }
}

pub trait Cartridge {
    /// `address` is a full bus address in 0x08000000-0x0FFFFFFF.
    fn read(&self, address: u32) -> u8;

    /// `address` is a full bus address in 0x08000000-0x0FFFFFFF.
    fn write(&mut self, address: u32, value: u8);

    fn backup_kind(&self) -> BackupKind;
}

pub struct GamePak {
    rom: Vec<u8>,
    backup_kind: BackupKind,
    backup: Vec<u8>,
}

impl Default for GamePak {
    fn default() -> Self {
        Self::new(Vec::new(), BackupKind::None)
    }
}

impl GamePak {
    #[must_use]
    pub fn new(rom: Vec<u8>, backup_kind: BackupKind) -> Self {
        Self {
            rom,
            backup_kind,
            // Erased flash and fresh SRAM both read as 0xFF.
            backup: vec![0xFF; backup_kind.size()],
        }
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    #[must_use]
    pub fn backup(&self) -> &[u8] {
        &self.backup
    }

    fn read_rom(&self, address: usize) -> u8 {
        if let Some(byte) = self.rom.get(address) {
            *byte
        } else {
            // In GamePak ROM, the 16bits data and the lower 16bits of the
            // address are transferred on the same bus (AD0-15). When
            // requesting an address which is "empty", the GamePak ROM doesn't
            // overwrite the value present in AD0-15, which then still
            // contains the lower 16bits of the halfword address.
            (((address >> 1) & 0xFFFF) as u16).get_byte((address & 0b1) as u8)
        }
    }

    fn backup_offset(&self, address: u32) -> Option<usize> {
        let size = self.backup_kind.size();
        if size == 0 {
            return None;
        }
        Some((address as usize & 0xFFFF) % size)
    }
}

impl Cartridge for GamePak {
    fn read(&self, address: u32) -> u8 {
        match address >> 24 {
            0x08..=0x0D => self.read_rom((address & 0x01FF_FFFF) as usize),
            _ => self
                .backup_offset(address)
                .and_then(|offset| self.backup.get(offset).copied())
                .unwrap_or(0xFF),
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x08..=0x0D => {
                tracing::debug!("ignoring write {value:#04X} to ROM at {address:#010X}");
            }
            _ => {
                if let Some(offset) = self.backup_offset(address)
                    && let Some(byte) = self.backup.get_mut(offset)
                {
                    *byte = value;
                }
            }
        }
    }

    fn backup_kind(&self) -> BackupKind {
        self.backup_kind
    }
}
