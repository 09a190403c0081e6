//! Peripheral setup for the emulated boards.
//!
//! Builds the peripheral arena for one hardware variant and binds every
//! device's regions on a fresh bus. The set of devices is read from the
//! hardware tables; the only per-variant branch is the display family.

use crate::core::EmulatorConfig;
use crate::error::ConfigError;
use crate::mmio::battery_ram::RamImage;
use crate::mmio::{
    BatteryRam, CommandScreen, MatrixScreen, PeripheralId, Peripherals, PortGroup, Uart,
};
use crate::mmu::{Mmu, RegionBinder};
use crate::model::ModelInfo;
use crate::render::SpriteSet;
use casioemu_hw::HardwareId;
use casioemu_hw::memory_map::{ADDRESS_SPACE, ram_layout};
use casioemu_hw::mmio::{ports, uart};
use casioemu_hw::specs::display::{DisplaySpec, display_spec};
use tracing::{debug, info};

/// Where the well-known devices live in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMap {
    pub ram: PeripheralId,
    pub screen: PeripheralId,
    pub ports: Option<PeripheralId>,
    pub uart: Option<PeripheralId>,
}

/// A bus with every device of the variant bound
pub struct Board {
    pub mmu: Mmu,
    pub peripherals: Peripherals,
    pub devices: DeviceMap,
}

/// Create and initialise the peripherals of `model`'s hardware variant
pub fn setup_peripherals(model: &ModelInfo, config: &EmulatorConfig) -> Result<Board, ConfigError> {
    let hw = model.hardware()?;
    let real_hardware = model.real_hardware;
    let mut peripherals = Peripherals::new();

    let ram = peripherals.add(Box::new(BatteryRam::new(
        ram_layout(hw),
        real_hardware,
        hw == HardwareId::Fx5800P,
        RamImage {
            path: config.ram_file.clone(),
            clean: config.clean_ram,
            preserve: config.preserve_ram,
        },
        config.seed,
    )));

    let port_indices = ports::port_indices(hw);
    let ports = (!port_indices.is_empty())
        .then(|| peripherals.add(Box::new(PortGroup::new(port_indices))));
    let uart = uart::present(hw).then(|| peripherals.add(Box::new(Uart::new())));

    let options = config.screen_options(real_hardware);
    let screen = match display_spec(hw) {
        DisplaySpec::Matrix(spec) => {
            let sprites = SpriteSet::resolve(model, spec.icons)?;
            peripherals.add(Box::new(MatrixScreen::new(spec, sprites, options)))
        }
        DisplaySpec::CommandPort(spec) => {
            let sprites = SpriteSet::resolve(model, spec.icons)?;
            peripherals.add(Box::new(CommandScreen::new(spec, sprites, options)))
        }
    };

    let mut mmu = Mmu::new(ADDRESS_SPACE);
    info!("=== {} Peripheral Setup ===", hw);
    for id in peripherals.ids() {
        let device = peripherals.get_mut(id);
        debug!("Initialising {}", device.name());
        device.initialise(&mut RegionBinder::new(&mut mmu, id))?;
    }

    Ok(Board {
        mmu,
        peripherals,
        devices: DeviceMap {
            ram,
            screen,
            ports,
            uart,
        },
    })
}
