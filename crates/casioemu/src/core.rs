//! Core emulator API.
//!
//! [`EmulatorCore`] owns the bus and every peripheral of one calculator. It is
//! driven from outside: a processor core (or a test) issues bus accesses and
//! calls [`EmulatorCore::tick`], a host frontend calls
//! [`EmulatorCore::frame`] once per displayed frame.

use crate::error::ConfigError;
use crate::memory::{self, Board, DeviceMap};
use crate::mmio::screen::{ScanTuning, ScreenOptions};
use crate::mmio::{Peripherals, ScanSource};
use crate::mmu::{Mmu, RegionBinder, RegionDescriptor};
use crate::model::ModelInfo;
use crate::render::DrawCall;
use casioemu_hw::HardwareId;
use casioemu_hw::specs::display::{DisplaySpec, display_spec};
use casioemu_hw::specs::timing::DECAY_TICK_INTERVAL_US;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Configuration for the emulator
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Battery-backed RAM image
    pub ram_file: Option<PathBuf>,
    /// Start from noise instead of loading the RAM image
    pub clean_ram: bool,
    /// Leave the RAM image untouched on shutdown
    pub preserve_ram: bool,
    /// Seed for power-on noise; entropy when `None`
    pub seed: Option<u64>,
    /// Decay the display on its own thread
    pub background_decay: bool,
    pub decay_interval: Duration,
    pub tuning: ScanTuning,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            ram_file: None,
            clean_ram: false,
            preserve_ram: false,
            seed: None,
            background_decay: true,
            decay_interval: Duration::from_micros(DECAY_TICK_INTERVAL_US),
            tuning: ScanTuning::default(),
        }
    }
}

impl EmulatorConfig {
    pub fn screen_options(&self, real_hardware: bool) -> ScreenOptions {
        ScreenOptions {
            real_hardware,
            background_decay: self.background_decay,
            decay_interval: self.decay_interval,
            tuning: self.tuning,
            seed: self.seed,
        }
    }
}

pub struct EmulatorCore {
    hardware: HardwareId,
    model: ModelInfo,
    mmu: Mmu,
    peripherals: Peripherals,
    devices: DeviceMap,
    ticks: u64,
    frames: u64,
    start_time: Instant,
    running: bool,
}

impl EmulatorCore {
    /// Build and initialise every peripheral of the model's hardware variant
    pub fn new(model: ModelInfo, config: EmulatorConfig) -> Result<Self, ConfigError> {
        let hardware = model.hardware()?;
        info!("=== {} ({}) ===", model.model_name, hardware);

        let Board {
            mmu,
            peripherals,
            devices,
        } = memory::setup_peripherals(&model, &config)?;
        debug!(
            "{} peripherals, {} regions",
            peripherals.len(),
            mmu.regions().count()
        );

        Ok(Self {
            hardware,
            model,
            mmu,
            peripherals,
            devices,
            ticks: 0,
            frames: 0,
            start_time: Instant::now(),
            running: true,
        })
    }

    pub fn hardware(&self) -> HardwareId {
        self.hardware
    }

    pub fn model(&self) -> &ModelInfo {
        &self.model
    }

    /// Rows (icon row included) and columns of the display's cell grid
    pub fn display_geometry(&self) -> (usize, usize) {
        match display_spec(self.hardware) {
            DisplaySpec::Matrix(spec) => (spec.rows, spec.columns()),
            DisplaySpec::CommandPort(spec) => (spec.rows + 1, spec.columns),
        }
    }

    /// Read a byte from the bus
    pub fn read(&mut self, address: u32) -> u8 {
        self.mmu.read(&mut self.peripherals, address)
    }

    /// Write a byte to the bus
    pub fn write(&mut self, address: u32, value: u8) {
        self.mmu.write(&mut self.peripherals, address, value);
    }

    /// Advance every peripheral by one step
    pub fn tick(&mut self) {
        for device in self.peripherals.iter_mut() {
            device.tick();
        }
        self.ticks += 1;
    }

    /// Draw calls of the current frame
    pub fn frame(&mut self) -> Vec<DrawCall> {
        self.present_scan_source();
        let mut draw_calls = Vec::new();
        for device in self.peripherals.iter_mut() {
            device.frame(&mut draw_calls);
        }
        self.frames += 1;
        draw_calls
    }

    /// Return every peripheral's registers to their reset values
    pub fn reset(&mut self) {
        debug!("Resetting peripherals");
        for device in self.peripherals.iter_mut() {
            device.reset();
        }
    }

    /// Uninitialise every peripheral in reverse order, flushing the RAM image.
    /// Later calls do nothing.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        info!("=== Shutting down ===");
        for id in self.peripherals.ids().rev() {
            self.peripherals
                .get_mut(id)
                .uninitialise(&mut RegionBinder::new(&mut self.mmu, id));
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Bus address of the first main RAM byte
    pub fn ram_base(&self) -> u32 {
        self.peripherals
            .get(self.devices.ram)
            .as_ram()
            .map_or(0, |ram| ram.base())
    }

    /// Main RAM contents, emulation trailer included
    pub fn ram(&self) -> &[u8] {
        self.peripherals
            .get(self.devices.ram)
            .as_ram()
            .map(|ram| ram.bytes())
            .unwrap_or_default()
    }

    /// Input area address the cursor sits on, when the model locates it
    pub fn cursor_highlight(&self) -> Option<u32> {
        let cursor = self.model.cursor_offset?;
        let input_area = self.model.input_area_offset?;
        let index = cursor.checked_sub(self.ram_base())? as usize;
        let position = *self.ram().get(index)?;
        input_area.checked_add(position as u32)
    }

    /// Raw pixel buffers of a buffer-based display; empty for other displays
    pub fn screen_buffers(&self) -> Vec<Vec<u8>> {
        self.peripherals
            .get(self.devices.screen)
            .as_screen()
            .map(|screen| screen.buffers())
            .unwrap_or_default()
    }

    /// Point a RAM-scanned display at its bitmap. Returns false when the
    /// display keeps its own buffers.
    pub fn set_scan_source(&mut self, source: Option<ScanSource>) -> bool {
        match self.peripherals.get_mut(self.devices.screen).as_scan_target() {
            Some(target) => {
                target.set_scan_source(source);
                true
            }
            None => false,
        }
    }

    /// Signal external interrupt edges on port `index`. Returns the bits that
    /// latched.
    pub fn raise_port_interrupt(&mut self, index: u8, bits: u8) -> u8 {
        let Some(id) = self.devices.ports else {
            return 0;
        };
        self.peripherals
            .get_mut(id)
            .as_ports()
            .map_or(0, |ports| ports.raise(index, bits))
    }

    /// True when port `index` has an enabled interrupt latched
    pub fn port_interrupt_pending(&mut self, index: u8) -> bool {
        let Some(id) = self.devices.ports else {
            return false;
        };
        self.peripherals
            .get_mut(id)
            .as_ports()
            .is_some_and(|ports| ports.pending(index))
    }

    /// Every declared region, bound or not
    pub fn regions(&self) -> impl Iterator<Item = &RegionDescriptor> {
        self.mmu.regions()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Copy the scan map out of RAM into a RAM-scanned display
    fn present_scan_source(&mut self) {
        let Some(target) = self.peripherals.get_mut(self.devices.screen).as_scan_target() else {
            return;
        };
        let Some(source) = target.scan_source() else {
            return;
        };
        let (scan_len, status_len) = target.scan_lengths();

        let scan = self.read_block(source.screen_addr, scan_len);
        let status = self.read_block(source.status_addr, status_len);
        if let Some(target) = self.peripherals.get_mut(self.devices.screen).as_scan_target() {
            target.present(scan, status);
        }
    }

    fn read_block(&mut self, base: u32, len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|i| self.mmu.read(&mut self.peripherals, base.wrapping_add(i)))
            .collect()
    }

    /// Log a summary of the emulator state
    pub fn print_final_state(&self) {
        info!("Ticks: {}, frames: {}", self.ticks, self.frames);
        info!("Elapsed time: {:.2?}", self.elapsed());
        let active: Vec<_> = self.regions().filter(|r| r.is_active()).collect();
        info!("Active regions: {}", active.len());
        for region in active {
            debug!(
                "  {:#07X}-{:#07X} {}",
                region.base,
                region.end() - 1,
                region.label
            );
        }
        if let Some(position) = self.cursor_highlight() {
            info!("Cursor at {:#X}", position);
        }
    }
}

impl Drop for EmulatorCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
