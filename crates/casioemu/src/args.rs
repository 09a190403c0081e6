use crate::EmulatorConfig;
use crate::error::ConfigError;
use crate::mmio::ScanSource;
use crate::mmio::screen::ScanTuning;
use crate::model::ModelInfo;
use casioemu_hw::HardwareId;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// Path to the model descriptor (JSON). Without one, a built-in layout for
    /// --hardware is used.
    pub model: Option<PathBuf>,

    /// Hardware id to emulate without a descriptor (3 ES PLUS, 4 ClassWiz,
    /// 5 ClassWiz II, 6 fx-5800P, 7 TI)
    #[arg(long, value_parser = parse_hardware)]
    pub hardware: Option<HardwareId>,

    /// Drop the emulation-only RAM trailer and debug aliases
    #[arg(long)]
    pub real_hardware: bool,

    /// Battery-backed RAM image, loaded at start and saved at exit
    #[arg(long)]
    pub ram: Option<PathBuf>,

    /// Do not load the RAM image (start from power-on noise)
    #[arg(long)]
    pub clean_ram: bool,

    /// Do not save the RAM image at exit
    #[arg(long)]
    pub preserve_ram: bool,

    /// Seed for power-on noise (hex: 0x1234 or decimal: 1234)
    #[arg(long, value_parser = parse_hex_or_dec)]
    pub seed: Option<u64>,

    /// Bus write performed after start-up, as ADDR=VALUE (repeatable)
    #[arg(long = "poke", value_parser = parse_poke)]
    pub pokes: Vec<(u32, u8)>,

    /// Location of a RAM-scanned display's bitmap, as SCREEN:STATUS
    #[arg(long, value_parser = parse_scan_source)]
    pub scan_source: Option<ScanSource>,

    /// Number of peripheral ticks to run (headless)
    #[arg(long, default_value_t = 0)]
    pub ticks: u64,

    /// Write the RAM contents to this file after running (headless)
    #[arg(long)]
    pub dump_ram: Option<PathBuf>,

    /// Step the display decay from ticks instead of a background thread
    #[arg(long)]
    pub no_background_decay: bool,

    /// Interval between two background decay ticks in microseconds
    #[arg(long)]
    pub decay_interval_us: Option<u64>,

    /// Refresh rate register value from which scan-line flicker is modelled
    #[arg(long)]
    pub flicker_threshold: Option<f32>,
}

impl Args {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.model.is_none() && self.hardware.is_none() {
            return Err("either a model descriptor or --hardware must be given".to_string());
        }
        if self.ram.is_none() && (self.clean_ram || self.preserve_ram) {
            return Err("--clean-ram and --preserve-ram require --ram".to_string());
        }
        if self.decay_interval_us == Some(0) {
            return Err("--decay-interval-us must be positive".to_string());
        }
        Ok(())
    }

    /// Load the model descriptor, or build the default one for --hardware
    pub fn load_model(&self) -> Result<ModelInfo, ConfigError> {
        let mut model = match (&self.model, self.hardware) {
            (Some(path), _) => ModelInfo::load(path)?,
            (None, Some(hw)) => ModelInfo::builtin(hw),
            (None, None) => return Err(ConfigError::NoModel),
        };
        if let Some(hw) = self.hardware {
            model.hardware_id = hw as u8;
        }
        model.real_hardware |= self.real_hardware;
        Ok(model)
    }

    /// Convert Args to EmulatorConfig
    pub fn to_emulator_config(&self) -> EmulatorConfig {
        let defaults = EmulatorConfig::default();
        EmulatorConfig {
            ram_file: self.ram.clone(),
            clean_ram: self.clean_ram,
            preserve_ram: self.preserve_ram,
            seed: self.seed,
            background_decay: !self.no_background_decay,
            decay_interval: self
                .decay_interval_us
                .map_or(defaults.decay_interval, Duration::from_micros),
            tuning: ScanTuning {
                flicker_threshold: self
                    .flicker_threshold
                    .unwrap_or(defaults.tuning.flicker_threshold),
                ..defaults.tuning
            },
        }
    }
}

pub fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

pub fn parse_address(s: &str) -> Result<u32, String> {
    let value = parse_hex_or_dec(s).map_err(|e| format!("{s:?}: {e}"))?;
    u32::try_from(value).map_err(|_| format!("{s:?} is not a 32-bit address"))
}

fn parse_hardware(s: &str) -> Result<HardwareId, String> {
    let id = parse_hex_or_dec(s).map_err(|e| format!("{s:?}: {e}"))?;
    u8::try_from(id)
        .ok()
        .and_then(|id| HardwareId::try_from(id).ok())
        .ok_or_else(|| format!("unknown hardware id {s}"))
}

/// `ADDR=VALUE`
pub fn parse_poke(s: &str) -> Result<(u32, u8), String> {
    let (address, value) = s
        .split_once('=')
        .ok_or_else(|| format!("{s:?} is not ADDR=VALUE"))?;
    let value = parse_hex_or_dec(value).map_err(|e| format!("{value:?}: {e}"))?;
    let value = u8::try_from(value).map_err(|_| format!("{value:#X} does not fit a byte"))?;
    Ok((parse_address(address)?, value))
}

/// `SCREEN:STATUS`
pub fn parse_scan_source(s: &str) -> Result<ScanSource, String> {
    let (screen, status) = s
        .split_once(':')
        .ok_or_else(|| format!("{s:?} is not SCREEN:STATUS"))?;
    Ok(ScanSource {
        screen_addr: parse_address(screen)?,
        status_addr: parse_address(status)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_hex_or_dec("0x1F"), Ok(31));
        assert_eq!(parse_hex_or_dec("31"), Ok(31));
        assert_eq!(parse_poke("0xF030=0xFF"), Ok((0xF030, 0xFF)));
        assert!(parse_poke("0xF030=0x100").is_err());
        assert!(parse_poke("0xF030").is_err());
        assert_eq!(
            parse_scan_source("0xD000:53248"),
            Ok(ScanSource {
                screen_addr: 0xD000,
                status_addr: 0xD000
            })
        );
    }

    #[test]
    fn test_args_to_config() {
        let args = Args::try_parse_from([
            "casioemu",
            "--hardware",
            "4",
            "--ram",
            "ram.bin",
            "--clean-ram",
            "--seed",
            "0x10",
            "--poke",
            "0xF03D=1",
            "--poke",
            "0xF030=0xFF",
            "--no-background-decay",
            "--flicker-threshold",
            "30",
        ])
        .unwrap();
        assert!(args.validate().is_ok());
        assert_eq!(args.hardware, Some(HardwareId::ClassWiz));
        assert_eq!(args.pokes, vec![(0xF03D, 1), (0xF030, 0xFF)]);

        let config = args.to_emulator_config();
        assert_eq!(config.ram_file, Some(PathBuf::from("ram.bin")));
        assert!(config.clean_ram && !config.preserve_ram);
        assert_eq!(config.seed, Some(0x10));
        assert!(!config.background_decay);
        assert_eq!(config.tuning.flicker_threshold, 30.0);

        let model = args.load_model().unwrap();
        assert_eq!(model.hardware().unwrap(), HardwareId::ClassWiz);
    }

    #[test]
    fn test_validation() {
        let args = Args::try_parse_from(["casioemu"]).unwrap();
        assert!(args.validate().is_err());
        let args = Args::try_parse_from(["casioemu", "--hardware", "3", "--preserve-ram"]).unwrap();
        assert!(args.validate().is_err());
        assert!(Args::try_parse_from(["casioemu", "--hardware", "9"]).is_err());

        let args = Args::try_parse_from(["casioemu"]).unwrap();
        assert!(matches!(args.load_model(), Err(ConfigError::NoModel)));
    }
}
