use serde::{Deserialize, Serialize};

use crate::cartridge::BackupKind;

/// Where execution starts after power on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootMode {
    /// Start at the reset vector and run the BIOS intro.
    Bios,

    /// Skip the BIOS: registers are set up the way the BIOS leaves them and
    /// execution starts at the cartridge entry point.
    #[default]
    Direct,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbaConfig {
    pub boot: BootMode,
    pub backup: BackupKind,
}
