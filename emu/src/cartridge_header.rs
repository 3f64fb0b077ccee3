use crate::error::CartridgeError;

const HEADER_SIZE: usize = 0xC0;

/// Contains the information of the cartridge header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    rom_entry_point: u32,
    game_title: String,
    game_code: String,
    maker_code: String,
    fixed_value: u8,
    software_version: u8,
    complement_check: u8,
    computed_check: u8,
}

impl CartridgeHeader {
    pub fn new(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_SIZE {
            return Err(CartridgeError::TooSmall(data.len()));
        }

        Ok(Self {
            rom_entry_point: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            game_title: into_ascii_str(&data[0xA0..0xAC], "game title")?,
            game_code: into_ascii_str(&data[0xAC..0xB0], "game code")?,
            maker_code: into_ascii_str(&data[0xB0..0xB2], "maker code")?,
            fixed_value: data[0xB2],
            software_version: data[0xBC],
            complement_check: data[0xBD],
            computed_check: header_checksum(data),
        })
    }

    /// 32bit ARM branch opcode
    #[must_use]
    pub const fn rom_entry_point(&self) -> u32 {
        self.rom_entry_point
    }

    #[must_use]
    pub fn game_title(&self) -> &str {
        self.game_title.as_str()
    }

    #[must_use]
    pub fn game_code(&self) -> &str {
        self.game_code.as_str()
    }

    #[must_use]
    pub fn maker_code(&self) -> &str {
        self.maker_code.as_str()
    }

    /// Usually 0x00
    #[must_use]
    pub const fn software_version(&self) -> u8 {
        self.software_version
    }

    #[must_use]
    pub const fn complement_check(&self) -> u8 {
        self.complement_check
    }

    /// The real BIOS refuses to boot a cartridge failing either check. The
    /// core does not, so homebrew with a sloppy header still runs.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.fixed_value == 0x96 && self.complement_check == self.computed_check
    }
}

fn header_checksum(data: &[u8]) -> u8 {
    data[0xA0..0xBD]
        .iter()
        .fold(0u8, |acc, &item| acc.wrapping_sub(item))
        .wrapping_sub(0x19)
}

/// Padding NULs are dropped.
fn into_ascii_str(data: &[u8], field: &'static str) -> Result<String, CartridgeError> {
    if !data.is_ascii() {
        return Err(CartridgeError::NotAscii(field));
    }

    Ok(data
        .iter()
        .take_while(|&&byte| byte != 0)
        .map(|&byte| char::from(byte))
        .collect())
}
