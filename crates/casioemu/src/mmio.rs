//! Memory-mapped peripherals.
//!
//! Every device on the bus implements [`Peripheral`] and lives in the
//! [`Peripherals`] arena owned by the emulator core. The bus refers to devices
//! only by [`PeripheralId`]; a device learns which of its regions was hit from
//! the [`RegionTag`] it chose when registering the region.
//!
//! # Memory Map
//! - `0xF030-0xF03F`: display controller registers
//! - `0xF210-0xF25F`: port data banks
//! - `0xF290-0xF296`: UART0
//! - `0xF800-`: display buffer
//! - `0xF980-0xF9C7`: port external interrupt banks
//! - RAM, RAM alias and program RAM: per variant, see `casioemu_hw::memory_map`

pub mod battery_ram;
pub mod generic;
pub mod ports;
pub mod screen;
pub mod uart;

use crate::error::ConfigError;
use crate::mmu::{Effects, RegionBinder, RegionTag};
use crate::render::DrawCall;

pub use battery_ram::BatteryRam;
pub use ports::PortGroup;
pub use screen::{CommandScreen, MatrixScreen, ScanSource};
pub use uart::Uart;

/// Stable index of a peripheral in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeripheralId(u16);

/// A device decoded on the bus.
///
/// Lifecycle: `initialise` once after construction, then any number of
/// `reset`/`tick`/`frame` calls interleaved with bus accesses, then
/// `uninitialise` on shutdown.
pub trait Peripheral: Send {
    fn name(&self) -> &'static str;

    /// Register the device's regions and allocate its state
    fn initialise(&mut self, regions: &mut RegionBinder<'_>) -> Result<(), ConfigError>;

    /// Release regions and flush anything persistent
    fn uninitialise(&mut self, _regions: &mut RegionBinder<'_>) {}

    /// Return registers to their reset values
    fn reset(&mut self) {}

    /// Advance one emulated step
    fn tick(&mut self) {}

    /// Append this frame's draw calls
    fn frame(&mut self, _draw_calls: &mut Vec<DrawCall>) {}

    fn read(&mut self, tag: RegionTag, offset: u32) -> u8;

    fn write(&mut self, tag: RegionTag, offset: u32, value: u8, effects: &mut Effects);

    /// RAM capability
    fn as_ram(&self) -> Option<&dyn RamProvider> {
        None
    }

    /// Display inspection capability
    fn as_screen(&self) -> Option<&dyn ScreenProvider> {
        None
    }

    /// Capability of displays fed from a RAM scan map
    fn as_scan_target(&mut self) -> Option<&mut dyn ScanTarget> {
        None
    }

    /// External interrupt inputs
    fn as_ports(&mut self) -> Option<&mut PortGroup> {
        None
    }
}

/// Peripheral exposing a block of RAM to inspection tools
pub trait RamProvider {
    /// Bus address of the first byte
    fn base(&self) -> u32;
    fn bytes(&self) -> &[u8];
}

/// Peripheral exposing its raw pixel buffers
pub trait ScreenProvider {
    /// Copy of every pixel buffer, first buffer first
    fn buffers(&self) -> Vec<Vec<u8>>;
}

/// Display that takes its pixels from memory owned by someone else
pub trait ScanTarget {
    /// Where in memory the scan map and status row live
    fn scan_source(&self) -> Option<ScanSource>;

    fn set_scan_source(&mut self, source: Option<ScanSource>);

    /// Buffer sizes the display expects: (scan map, status row)
    fn scan_lengths(&self) -> (usize, usize);

    /// Hand over a snapshot of the scan map and status row
    fn present(&mut self, scan: Vec<u8>, status: Vec<u8>);
}

/// Arena of peripherals indexed by [`PeripheralId`]
#[derive(Default)]
pub struct Peripherals {
    devices: Vec<Box<dyn Peripheral>>,
}

impl Peripherals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, device: Box<dyn Peripheral>) -> PeripheralId {
        let id = PeripheralId(self.devices.len() as u16);
        self.devices.push(device);
        id
    }

    pub fn get(&self, id: PeripheralId) -> &dyn Peripheral {
        self.devices[id.0 as usize].as_ref()
    }

    pub fn get_mut(&mut self, id: PeripheralId) -> &mut dyn Peripheral {
        self.devices[id.0 as usize].as_mut()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Ids in registration order
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = PeripheralId> + use<> {
        (0..self.devices.len() as u16).map(PeripheralId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Peripheral> {
        self.devices.iter().map(|d| d.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn Peripheral + 'static)> {
        self.devices.iter_mut().map(|d| d.as_mut())
    }
}
