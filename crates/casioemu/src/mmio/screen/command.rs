//! Command-port display controller (TI board).
//!
//! The controller has no display RAM of its own. Firmware keeps a column-major
//! 1 bpp bitmap in main RAM and configures the glass through single command
//! bytes on the port 7 data register:
//!
//! | byte   | effect                               |
//! |--------|--------------------------------------|
//! | `0xA0` | display on                           |
//! | `0xAE` | display off                          |
//! | `0x81` | next byte is the contrast            |
//! | `0x00` | ignored in every state               |
//!
//! Anything else is ignored. The core hands the controller a snapshot of the
//! bitmap and status bytes once per frame through [`ScanTarget::present`].

use super::decay::{approach, command_ink, fade};
use super::{ScanSource, ScreenOptions, lock};
use crate::error::ConfigError;
use crate::mmio::{Peripheral, ScanTarget};
use crate::mmu::{Effects, RegionBinder, RegionId, RegionTag};
use crate::render::{DrawCall, SpriteSet};
use crate::scheduler::{DecayClock, DecayModel, DecayTicker};
use crate::sfr::IGNORE_READ;
use casioemu_hw::mmio::screen::command_port::{
    AUX, CMD_DISABLE, CMD_ENABLE, CMD_SET_CONTRAST, COMMAND,
};
use casioemu_hw::specs::display::CommandPortSpec;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, trace, warn};

const COMMAND_PORT: RegionTag = RegionTag(0);
const AUX_PORT: RegionTag = RegionTag(1);

/// Command decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CommandState {
    #[default]
    Idle,
    AwaitContrast,
}

#[derive(Debug, Default)]
struct ScanSnapshot {
    scan: Vec<u8>,
    status: Vec<u8>,
}

struct CommandShared {
    spec: &'static CommandPortSpec,
    enabled: AtomicBool,
    contrast: AtomicU8,
    snapshot: Mutex<ScanSnapshot>,
    cells: Mutex<Vec<f32>>,
}

impl CommandShared {
    fn new(spec: &'static CommandPortSpec) -> Self {
        Self {
            spec,
            enabled: AtomicBool::new(false),
            contrast: AtomicU8::new(0),
            snapshot: Mutex::new(ScanSnapshot::default()),
            cells: Mutex::new(vec![0.0; (spec.rows + 1) * spec.columns]),
        }
    }
}

impl DecayModel for CommandShared {
    fn step(&self, _t_ms: f32) {
        let spec = self.spec;
        let ratio = spec.decay_ratio;
        let mut cells = lock(&self.cells);

        if !self.enabled.load(Ordering::Acquire) {
            fade(&mut cells, ratio);
            return;
        }
        let ink = command_ink(self.contrast.load(Ordering::Acquire));
        let snapshot = lock(&self.snapshot);
        let (icon_row, dots) = cells.split_at_mut(spec.columns);

        for (cell, icon) in icon_row.iter_mut().zip(spec.icons) {
            let lit = snapshot
                .status
                .get(icon.offset as usize)
                .is_some_and(|byte| byte & icon.mask != 0);
            *cell = approach(*cell, if lit { ink.on } else { ink.off }, ratio);
        }

        if snapshot.scan.len() < spec.scan_len() {
            // Nothing presented yet
            fade(dots, ratio);
            return;
        }
        for ix in 0..spec.columns {
            for iy in 0..spec.rows {
                let i = ix * spec.rows + iy;
                let lit = snapshot.scan[i >> 3] & (1 << (i & 7)) != 0;
                let cell = &mut dots[iy * spec.columns + ix];
                *cell = approach(*cell, if lit { ink.on } else { ink.off }, ratio);
            }
        }
    }
}

pub struct CommandScreen {
    shared: Arc<CommandShared>,
    sprites: SpriteSet,
    options: ScreenOptions,
    state: CommandState,
    source: Option<ScanSource>,
    regions: Vec<RegionId>,
    ticker: Option<DecayTicker>,
    clock: DecayClock,
}

impl CommandScreen {
    pub fn new(spec: &'static CommandPortSpec, sprites: SpriteSet, options: ScreenOptions) -> Self {
        Self {
            shared: Arc::new(CommandShared::new(spec)),
            sprites,
            options,
            state: CommandState::Idle,
            source: None,
            regions: Vec::new(),
            ticker: None,
            clock: DecayClock::start(),
        }
    }

    pub fn spec(&self) -> &'static CommandPortSpec {
        self.shared.spec
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    pub fn contrast(&self) -> u8 {
        self.shared.contrast.load(Ordering::Acquire)
    }

    pub fn step_decay(&self, t_ms: f32) {
        self.shared.step(t_ms);
    }

    /// Copy of the intensity map: one icon row, then `rows` dot rows
    pub fn intensities(&self) -> Vec<f32> {
        lock(&self.shared.cells).clone()
    }

    fn command(&mut self, value: u8) {
        if value == 0 {
            return;
        }
        match self.state {
            CommandState::AwaitContrast => {
                trace!("Contrast set to {:#04X}", value);
                self.shared.contrast.store(value, Ordering::Release);
                self.state = CommandState::Idle;
            }
            CommandState::Idle => match value {
                CMD_ENABLE => {
                    debug!("Display on");
                    self.shared.enabled.store(true, Ordering::Release);
                }
                CMD_DISABLE => {
                    debug!("Display off");
                    self.shared.enabled.store(false, Ordering::Release);
                }
                CMD_SET_CONTRAST => self.state = CommandState::AwaitContrast,
                _ => {}
            },
        }
    }
}

impl Peripheral for CommandScreen {
    fn name(&self) -> &'static str {
        "Screen"
    }

    fn initialise(&mut self, regions: &mut RegionBinder<'_>) -> Result<(), ConfigError> {
        debug!("  Mapping display command port at {:#X}", COMMAND);
        self.regions
            .push(regions.map(COMMAND, 1, COMMAND_PORT, "Screen/Command")?);
        self.regions.push(regions.map(AUX, 1, AUX_PORT, "Screen/Aux")?);

        if self.options.background_decay {
            match DecayTicker::spawn("screen", self.shared.clone(), self.options.decay_interval) {
                Ok(ticker) => self.ticker = Some(ticker),
                Err(e) => warn!("Failed to start display decay thread, stepping on tick: {}", e),
            }
        }
        Ok(())
    }

    fn uninitialise(&mut self, regions: &mut RegionBinder<'_>) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
        for id in self.regions.drain(..) {
            regions.deactivate(id);
        }
    }

    fn reset(&mut self) {
        self.state = CommandState::Idle;
    }

    fn tick(&mut self) {
        if self.ticker.is_none() {
            self.shared.step(self.clock.now_ms());
        }
    }

    fn frame(&mut self, draw_calls: &mut Vec<DrawCall>) {
        let columns = self.shared.spec.columns;
        let cells = self.intensities();
        let (icons, dots) = cells.split_at(columns);
        self.sprites.push_icons(icons, draw_calls);
        self.sprites.push_dots(dots, columns, draw_calls);
    }

    fn read(&mut self, _tag: RegionTag, _offset: u32) -> u8 {
        IGNORE_READ
    }

    #[instrument(level = "trace", skip(self, _effects))]
    fn write(&mut self, tag: RegionTag, _offset: u32, value: u8, _effects: &mut Effects) {
        if tag == COMMAND_PORT {
            self.command(value);
        }
    }

    fn as_scan_target(&mut self) -> Option<&mut dyn ScanTarget> {
        Some(self)
    }
}

impl ScanTarget for CommandScreen {
    fn scan_source(&self) -> Option<ScanSource> {
        self.source
    }

    fn set_scan_source(&mut self, source: Option<ScanSource>) {
        self.source = source;
        if source.is_none() {
            *lock(&self.shared.snapshot) = ScanSnapshot::default();
        }
    }

    fn scan_lengths(&self) -> (usize, usize) {
        let spec = self.shared.spec;
        let status = spec
            .icons
            .iter()
            .map(|icon| icon.offset as usize + 1)
            .max()
            .unwrap_or(0);
        (spec.scan_len(), status)
    }

    fn present(&mut self, scan: Vec<u8>, status: Vec<u8>) {
        *lock(&self.shared.snapshot) = ScanSnapshot { scan, status };
    }
}

impl Drop for CommandScreen {
    fn drop(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::Peripherals;
    use crate::mmu::Mmu;
    use crate::model::ModelInfo;
    use casioemu_hw::HardwareId;
    use casioemu_hw::memory_map::ADDRESS_SPACE;
    use casioemu_hw::specs::display::TI;

    fn screen() -> CommandScreen {
        let model = ModelInfo::builtin(HardwareId::Ti);
        let sprites = SpriteSet::resolve(&model, TI.icons).unwrap();
        CommandScreen::new(
            &TI,
            sprites,
            ScreenOptions {
                background_decay: false,
                ..ScreenOptions::default()
            },
        )
    }

    #[test]
    fn test_command_sequence() {
        let mut screen = screen();
        let mut effects = Effects::new();
        assert!(!screen.is_enabled());

        screen.write(COMMAND_PORT, 0, CMD_ENABLE, &mut effects);
        assert!(screen.is_enabled());

        screen.write(COMMAND_PORT, 0, CMD_SET_CONTRAST, &mut effects);
        // Zero bytes are skipped even while a contrast byte is expected
        screen.write(COMMAND_PORT, 0, 0x00, &mut effects);
        screen.write(COMMAND_PORT, 0, 0x7B, &mut effects);
        assert_eq!(screen.contrast(), 0x7B);

        // Back in the idle state: 0x81 is a command again, 0x42 is ignored
        screen.write(COMMAND_PORT, 0, 0x42, &mut effects);
        assert_eq!(screen.contrast(), 0x7B);
        assert!(screen.is_enabled());

        screen.write(AUX_PORT, 0, CMD_DISABLE, &mut effects);
        assert!(screen.is_enabled());
        screen.write(COMMAND_PORT, 0, CMD_DISABLE, &mut effects);
        assert!(!screen.is_enabled());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ports_are_mapped_and_read_zero() {
        let mut mmu = Mmu::new(ADDRESS_SPACE);
        let mut peripherals = Peripherals::new();
        let id = peripherals.add(Box::new(screen()));
        peripherals
            .get_mut(id)
            .initialise(&mut RegionBinder::new(&mut mmu, id))
            .unwrap();

        assert_eq!(mmu.resolve(COMMAND).unwrap().label, "Screen/Command");
        assert_eq!(mmu.resolve(AUX).unwrap().label, "Screen/Aux");
        mmu.write(&mut peripherals, COMMAND, CMD_ENABLE);
        assert_eq!(mmu.read(&mut peripherals, COMMAND), IGNORE_READ);
        assert_eq!(mmu.read(&mut peripherals, AUX), IGNORE_READ);
    }

    #[test]
    fn test_presented_bitmap_lights_cells() {
        let mut screen = screen();
        let mut effects = Effects::new();
        screen.write(COMMAND_PORT, 0, CMD_ENABLE, &mut effects);
        screen.write(COMMAND_PORT, 0, CMD_SET_CONTRAST, &mut effects);
        screen.write(COMMAND_PORT, 0, 110, &mut effects);

        let (scan_len, status_len) = screen.scan_lengths();
        assert_eq!((scan_len, status_len), (192 * 64 / 8, 1));

        // Column 1, row 2: bit index 66
        let mut scan = vec![0u8; scan_len];
        scan[66 >> 3] |= 1 << (66 & 7);
        screen.present(scan, vec![0x02]);

        for _ in 0..100_000 {
            screen.step_decay(0.0);
        }
        let ink = command_ink(110);
        let cells = screen.intensities();
        let lit = 3 * 192 + 1;
        assert!((cells[lit] - ink.on).abs() < 1.0);
        assert!((cells[lit + 1] - ink.off).abs() < 1.0);
        assert!((cells[0] - ink.on).abs() < 1.0);

        screen.write(COMMAND_PORT, 0, CMD_DISABLE, &mut effects);
        let before = screen.intensities()[lit];
        screen.step_decay(0.0);
        assert!(screen.intensities()[lit] < before);
    }

    #[test]
    fn test_scan_map_follows_row_count() {
        static NARROW: CommandPortSpec = CommandPortSpec {
            columns: 8,
            rows: 16,
            decay_ratio: 0.5,
            icons: &[],
        };
        let model = ModelInfo::builtin(HardwareId::Ti);
        let sprites = SpriteSet::resolve(&model, NARROW.icons).unwrap();
        let mut screen = CommandScreen::new(
            &NARROW,
            sprites,
            ScreenOptions {
                background_decay: false,
                ..ScreenOptions::default()
            },
        );
        let mut effects = Effects::new();
        screen.write(COMMAND_PORT, 0, CMD_ENABLE, &mut effects);
        screen.write(COMMAND_PORT, 0, CMD_SET_CONTRAST, &mut effects);
        screen.write(COMMAND_PORT, 0, 110, &mut effects);

        // Column 1, row 2 of a 16-row map: bit index 18
        let mut scan = vec![0u8; NARROW.scan_len()];
        scan[18 >> 3] |= 1 << (18 & 7);
        screen.present(scan, Vec::new());
        for _ in 0..64 {
            screen.step_decay(0.0);
        }

        let ink = command_ink(110);
        let cells = screen.intensities();
        let lit = 3 * 8 + 1;
        assert!((cells[lit] - ink.on).abs() < 1.0);
        assert!(
            (8..cells.len())
                .filter(|&i| i != lit)
                .all(|i| (cells[i] - ink.off).abs() < 1.0)
        );
    }

    #[test]
    fn test_frame_covers_icon_and_dots() {
        let mut screen = screen();
        let mut calls = Vec::new();
        screen.frame(&mut calls);
        assert_eq!(calls.len(), 1 + 192 * 64);
    }
}
