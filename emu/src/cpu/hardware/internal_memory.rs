use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

pub const BIOS_SIZE: usize = 0x4000;

/// Opcodes of the stand-in BIOS used when no BIOS image is supplied.
const BIOS_STUB: [(usize, u32); 9] = [
    // SWI vector: MOVS PC, LR
    (0x08, 0xE1B0_F00E),
    // IRQ vector: B 0x128
    (0x18, 0xEA00_0042),
    // STMFD SP!, {R0-R3, R12, LR}
    (0x128, 0xE92D_500F),
    // MOV R0, #0x04000000
    (0x12C, 0xE3A0_0301),
    // ADD LR, PC, #0
    (0x130, 0xE28F_E000),
    // LDR PC, [R0, #-4]  (handler pointer mirrored at 0x03007FFC)
    (0x134, 0xE510_F004),
    // LDMFD SP!, {R0-R3, R12, LR}
    (0x138, 0xE8BD_500F),
    // SUBS PC, LR, #4
    (0x13C, 0xE25E_F004),
    // Reset vector: B 0x08000000 is out of reach, spin instead.
    (0x00, 0xEAFF_FFFE),
];

/// On-board memories of the GBA. Addresses passed in are full bus
/// addresses; mirroring is resolved here.
#[derive(Serialize, Deserialize)]
pub struct InternalMemory {
    /// From 0x00000000 to 0x00003FFF (16 `KBytes`).
    bios_system_rom: Vec<u8>,

    /// From 0x02000000 to 0x0203FFFF (256 `KBytes`), mirrored up to 0x02FFFFFF.
    working_ram: Vec<u8>,

    /// From 0x03000000 to 0x03007FFF (32 `KBytes`), mirrored up to 0x03FFFFFF.
    working_iram: Vec<u8>,

    /// From 0x05000000 to 0x050003FF (1 `KByte`).
    palette_ram: Vec<u8>,

    /// From 0x06000000 to 0x06017FFF (96 `KBytes`).
    video_ram: Vec<u8>,

    /// From 0x07000000 to 0x070003FF (1 `KByte`).
    object_attributes: Vec<u8>,
}

impl Default for InternalMemory {
    fn default() -> Self {
        Self::new(&Self::bios_stub())
    }
}

impl InternalMemory {
    #[must_use]
    pub fn new(bios: &[u8; BIOS_SIZE]) -> Self {
        Self {
            bios_system_rom: bios.to_vec(),
            working_ram: vec![0; 0x0004_0000],
            working_iram: vec![0; 0x0000_8000],
            palette_ram: vec![0; 0x400],
            video_ram: vec![0; 0x0001_8000],
            object_attributes: vec![0; 0x400],
        }
    }

    /// A BIOS image that only knows how to return from SWI and dispatch
    /// IRQs to the handler stored at `0x03007FFC`.
    #[must_use]
    pub fn bios_stub() -> [u8; BIOS_SIZE] {
        let mut bios = [0; BIOS_SIZE];
        for (address, op_code) in BIOS_STUB {
            for byte in 0..4 {
                bios[address + byte] = op_code.get_byte(byte as u8);
            }
        }
        bios
    }

    const fn video_ram_offset(address: u32) -> usize {
        let offset = (address & 0x1_FFFF) as usize;
        // 0x18000-0x1FFFF mirrors 0x10000-0x17FFF
        if offset >= 0x1_8000 { offset - 0x8000 } else { offset }
    }

    fn region_mut(&mut self, address: u32) -> Option<(&mut Vec<u8>, usize)> {
        match address >> 24 {
            0x02 => Some((&mut self.working_ram, (address & 0x3_FFFF) as usize)),
            0x03 => Some((&mut self.working_iram, (address & 0x7FFF) as usize)),
            0x05 => Some((&mut self.palette_ram, (address & 0x3FF) as usize)),
            0x06 => Some((&mut self.video_ram, Self::video_ram_offset(address))),
            0x07 => Some((&mut self.object_attributes, (address & 0x3FF) as usize)),
            _ => None,
        }
    }

    fn region(&self, address: u32) -> Option<(&Vec<u8>, usize)> {
        match address >> 24 {
            0x00 if (address as usize) < BIOS_SIZE => {
                Some((&self.bios_system_rom, address as usize))
            }
            0x02 => Some((&self.working_ram, (address & 0x3_FFFF) as usize)),
            0x03 => Some((&self.working_iram, (address & 0x7FFF) as usize)),
            0x05 => Some((&self.palette_ram, (address & 0x3FF) as usize)),
            0x06 => Some((&self.video_ram, Self::video_ram_offset(address))),
            0x07 => Some((&self.object_attributes, (address & 0x3FF) as usize)),
            _ => None,
        }
    }

    /// `None` when `address` is not backed by on-board memory.
    #[must_use]
    pub fn read_at(&self, address: u32) -> Option<u8> {
        self.region(address)
            .and_then(|(memory, offset)| memory.get(offset).copied())
    }

    /// BIOS and unmapped addresses are ignored. Returns whether the write
    /// landed somewhere.
    pub fn write_at(&mut self, address: u32, value: u8) -> bool {
        self.region_mut(address)
            .and_then(|(memory, offset)| memory.get_mut(offset))
            .map(|byte| *byte = value)
            .is_some()
    }
}
