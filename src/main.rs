use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use emu::cartridge::BackupKind;
use emu::config::{BootMode, GbaConfig};
use emu::cpu::hardware::dma::StartTiming;
use emu::cpu::hardware::interrupt_control::Interrupt;
use emu::gba::{CYCLES_PER_FRAME, Gba};

const DEFAULT_FRAMES: u32 = 60;

#[derive(Parser, Debug)]
#[command(version, about = "Runs a GBA ROM headless on the ARM7TDMI core.", long_about = None)]
struct Args {
    /// Path to the ROM image
    rom: PathBuf,

    /// Path to a 16 KiB BIOS image. A minimal stand-in is used otherwise.
    #[arg(long)]
    bios: Option<PathBuf>,

    /// JSON file with default settings, overridden by the flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long)]
    frames: Option<u32>,

    #[arg(long, value_enum)]
    boot: Option<BootArg>,

    #[arg(long, value_enum)]
    backup: Option<BackupArg>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BootArg {
    Bios,
    Direct,
}

impl From<BootArg> for BootMode {
    fn from(value: BootArg) -> Self {
        match value {
            BootArg::Bios => Self::Bios,
            BootArg::Direct => Self::Direct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackupArg {
    None,
    Sram,
    Flash64k,
    Flash128k,
    Eeprom,
}

impl From<BackupArg> for BackupKind {
    fn from(value: BackupArg) -> Self {
        match value {
            BackupArg::None => Self::None,
            BackupArg::Sram => Self::Sram,
            BackupArg::Flash64k => Self::Flash64K,
            BackupArg::Flash128k => Self::Flash128K,
            BackupArg::Eeprom => Self::Eeprom,
        }
    }
}

/// Contents of the `--config` file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    #[serde(flatten)]
    gba: GbaConfig,
    bios: Option<PathBuf>,
    frames: Option<u32>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
struct Settings {
    rom: PathBuf,
    bios: Option<PathBuf>,
    frames: u32,
    gba: GbaConfig,
    log_file: Option<PathBuf>,
}

impl Settings {
    fn merge(args: Args, file: FileConfig) -> Self {
        Self {
            rom: args.rom,
            bios: args.bios.or(file.bios),
            frames: args.frames.or(file.frames).unwrap_or(DEFAULT_FRAMES),
            gba: GbaConfig {
                boot: args.boot.map_or(file.gba.boot, BootMode::from),
                backup: args.backup.map_or(file.gba.backup, BackupKind::from),
            },
            log_file: args.log_file.or(file.log_file),
        }
    }
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Logs go to stderr, or through a non-blocking writer to `log_file`. The
/// returned guard flushes the file when dropped.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().ok_or("log file path has no file name")?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn print_header(gba: &Gba) {
    match &gba.cartridge_header {
        Some(header) => {
            println!("title:  {}", header.game_title());
            println!("code:   {}", header.game_code());
            println!("maker:  {}", header.maker_code());
            println!(
                "header: {}",
                if header.is_valid() { "valid" } else { "INVALID" }
            );
        }
        None => println!("no cartridge header"),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let file_config = load_file_config(args.config.as_deref())?;
    let settings = Settings::merge(args, file_config);
    let _guard = init_tracing(settings.log_file.as_deref())?;

    println!("tdmi v{}", env!("CARGO_PKG_VERSION"));
    println!("loading {}", settings.rom.display());

    let cartridge = fs::read(&settings.rom)?;
    let bios = settings.bios.as_deref().map(fs::read).transpose()?;
    let mut gba = Gba::new(settings.gba, bios.as_deref(), cartridge)?;
    print_header(&gba);

    let mut cycles = 0_u64;
    for frame in 0..settings.frames {
        match gba.run(CYCLES_PER_FRAME) {
            Ok(spent) => cycles += u64::from(spent),
            Err(error) => {
                println!("stopped in frame {frame}: {error}");
                println!("{}", error.snapshot);
                return Err(error.into());
            }
        }
        // No LCD is attached: signal the end of each frame ourselves.
        gba.set_pending(Interrupt::VBlank);
        cycles += u64::from(gba.dma_event(StartTiming::VBlank));
    }

    tracing::info!("ran {} frames, {cycles} cycles", settings.frames);
    println!("{}", gba.cpu.snapshot());
    Ok(())
}
