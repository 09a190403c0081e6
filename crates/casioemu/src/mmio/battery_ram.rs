//! Battery-backed RAM.
//!
//! The buffer comes up full of noise, is optionally overwritten from a raw
//! image file, and is written back to that file on shutdown. The image has no
//! header; its size is the buffer size of the variant.
//!
//! In emulation mode the buffer carries a 0x100 byte trailer that real chips
//! lack. It is not part of the main window; firmware patches reach it through
//! an alias region at a variant-specific legacy address.

use crate::error::ConfigError;
use crate::mmio::{Peripheral, RamProvider};
use crate::mmu::{Effects, RegionBinder, RegionId, RegionTag};
use crate::noise;
use casioemu_hw::memory_map::{RamLayout, pram};
use rand::rngs::StdRng;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const MAIN: RegionTag = RegionTag(0);
const TRAILER: RegionTag = RegionTag(1);
const PROGRAM: RegionTag = RegionTag(2);

/// Backing file handling
#[derive(Debug, Clone, Default)]
pub struct RamImage {
    /// Raw image to load from and save to
    pub path: Option<PathBuf>,
    /// Skip loading the image at start-up
    pub clean: bool,
    /// Skip saving the image at shutdown
    pub preserve: bool,
}

pub struct BatteryRam {
    layout: RamLayout,
    real_hardware: bool,
    with_program_ram: bool,
    image: RamImage,
    buffer: Vec<u8>,
    program: Vec<u8>,
    regions: Vec<RegionId>,
    ram_noise: StdRng,
    program_noise: StdRng,
}

impl BatteryRam {
    pub fn new(
        layout: RamLayout,
        real_hardware: bool,
        with_program_ram: bool,
        image: RamImage,
        seed: Option<u64>,
    ) -> Self {
        Self {
            layout,
            real_hardware,
            with_program_ram,
            image,
            buffer: Vec::new(),
            program: Vec::new(),
            regions: Vec::new(),
            ram_noise: noise::generator(seed, noise::NoiseStream::Ram),
            program_noise: noise::generator(seed, noise::NoiseStream::ProgramRam),
        }
    }

    /// Whole buffer, trailer included
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// fx-5800P program RAM (empty on other variants)
    pub fn program_ram(&self) -> &[u8] {
        &self.program
    }

    /// Overwrite the start of the buffer with the image at `path`.
    ///
    /// Returns the number of bytes loaded. A short image leaves the rest of the
    /// buffer untouched; a long one is cut to the buffer size.
    pub fn load_image(&mut self, path: &Path) -> io::Result<usize> {
        let data = std::fs::read(path)?;
        let len = data.len().min(self.buffer.len());
        self.buffer[..len].copy_from_slice(&data[..len]);
        if len < self.buffer.len() {
            debug!(
                "RAM image {:?} holds {:#X} of {:#X} bytes, rest keeps power-on noise",
                path,
                len,
                self.buffer.len()
            );
        }
        Ok(len)
    }

    /// Write the whole buffer to `path`
    pub fn save_image(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, &self.buffer)
    }

    fn cell(&mut self, tag: RegionTag, offset: u32) -> Option<&mut u8> {
        let offset = offset as usize;
        match tag {
            MAIN => self.buffer.get_mut(offset),
            TRAILER => self.buffer.get_mut(self.layout.size + offset),
            PROGRAM => self.program.get_mut(offset),
            _ => None,
        }
    }
}

impl Peripheral for BatteryRam {
    fn name(&self) -> &'static str {
        "BatteryBackedRAM"
    }

    fn initialise(&mut self, regions: &mut RegionBinder<'_>) -> Result<(), ConfigError> {
        self.buffer = vec![0; self.layout.buffer_len(self.real_hardware)];
        noise::fill(&mut self.ram_noise, &mut self.buffer);

        if let Some(path) = self.image.path.clone()
            && !self.image.clean
        {
            match self.load_image(&path) {
                Ok(len) => info!("Loaded {:#X} bytes of RAM from {:?}", len, path),
                Err(e) => warn!("Failed to load RAM image {:?}: {}", path, e),
            }
        }

        debug!(
            "  Mapping RAM at {:#X} ({}KB)",
            self.layout.base,
            self.layout.size / 1024
        );
        self.regions.push(regions.map(
            self.layout.base,
            self.layout.size as u32,
            MAIN,
            "BatteryBackedRAM",
        )?);

        if !self.real_hardware {
            debug!(
                "  Mapping RAM trailer alias at {:#X}",
                self.layout.alias_base
            );
            self.regions.push(regions.map(
                self.layout.alias_base,
                RamLayout::TRAILER_SIZE as u32,
                TRAILER,
                "BatteryBackedRAM/2",
            )?);
        }

        if self.with_program_ram {
            self.program = vec![0; pram::SIZE];
            noise::fill(&mut self.program_noise, &mut self.program);
            debug!(
                "  Mapping program RAM at {:#X} ({}KB)",
                pram::BASE,
                pram::SIZE / 1024
            );
            self.regions.push(regions.map(
                pram::BASE,
                pram::SIZE as u32,
                PROGRAM,
                "Segment4",
            )?);
        }
        Ok(())
    }

    fn uninitialise(&mut self, regions: &mut RegionBinder<'_>) {
        if let Some(path) = self.image.path.as_deref()
            && !self.image.preserve
        {
            match self.save_image(path) {
                Ok(()) => info!("Saved {:#X} bytes of RAM to {:?}", self.buffer.len(), path),
                Err(e) => warn!("Failed to save RAM image {:?}: {}", path, e),
            }
        }
        for id in self.regions.drain(..) {
            regions.deactivate(id);
        }
    }

    #[instrument(level = "trace", skip(self))]
    fn read(&mut self, tag: RegionTag, offset: u32) -> u8 {
        self.cell(tag, offset).map_or(0, |b| *b)
    }

    #[instrument(level = "trace", skip(self, _effects))]
    fn write(&mut self, tag: RegionTag, offset: u32, value: u8, _effects: &mut Effects) {
        if let Some(cell) = self.cell(tag, offset) {
            *cell = value;
        }
    }

    fn as_ram(&self) -> Option<&dyn RamProvider> {
        Some(self)
    }
}

impl RamProvider for BatteryRam {
    fn base(&self) -> u32 {
        self.layout.base
    }

    fn bytes(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::Peripherals;
    use crate::mmu::Mmu;
    use casioemu_hw::memory_map::ADDRESS_SPACE;

    const LAYOUT: RamLayout = RamLayout {
        base: 0x8000,
        size: 0x0E00,
        alias_base: 0x9800,
    };

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("casioemu-ram-{}-{}", std::process::id(), name))
    }

    fn mapped(ram: BatteryRam) -> (Mmu, Peripherals, crate::mmio::PeripheralId) {
        let mut mmu = Mmu::new(ADDRESS_SPACE);
        let mut peripherals = Peripherals::new();
        let id = peripherals.add(Box::new(ram));
        peripherals
            .get_mut(id)
            .initialise(&mut RegionBinder::new(&mut mmu, id))
            .unwrap();
        (mmu, peripherals, id)
    }

    #[test]
    fn test_trailer_is_reached_through_alias() {
        let ram = BatteryRam::new(LAYOUT, false, false, RamImage::default(), Some(1));
        let (mut mmu, mut peripherals, id) = mapped(ram);

        assert_eq!(peripherals.get(id).as_ram().unwrap().bytes().len(), 0x0F00);
        // Main window ends at the variant size
        assert!(mmu.resolve(0x8E00).is_none());

        mmu.write(&mut peripherals, 0x9800, 0x5A);
        mmu.write(&mut peripherals, 0x8000, 0xA5);
        let bytes = peripherals.get(id).as_ram().unwrap().bytes();
        assert_eq!(bytes[0x0E00], 0x5A);
        assert_eq!(bytes[0], 0xA5);
        assert_eq!(mmu.read(&mut peripherals, 0x9800), 0x5A);
    }

    #[test]
    fn test_real_hardware_has_no_trailer() {
        let ram = BatteryRam::new(LAYOUT, true, false, RamImage::default(), Some(1));
        let (mmu, peripherals, id) = mapped(ram);
        assert_eq!(peripherals.get(id).as_ram().unwrap().bytes().len(), 0x0E00);
        assert!(mmu.resolve(0x9800).is_none());
    }

    #[test]
    fn test_program_ram_segment() {
        let ram = BatteryRam::new(LAYOUT, false, true, RamImage::default(), Some(1));
        let (mut mmu, mut peripherals, _) = mapped(ram);
        mmu.write(&mut peripherals, pram::BASE + 0x10, 0x77);
        assert_eq!(mmu.read(&mut peripherals, pram::BASE + 0x10), 0x77);
        assert_eq!(
            mmu.resolve(pram::BASE + pram::SIZE as u32 - 1).unwrap().label,
            "Segment4"
        );
    }

    #[test]
    fn test_missing_image_keeps_noise() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let image = RamImage {
            path: Some(path.clone()),
            clean: false,
            preserve: true,
        };
        let reference = {
            let ram = BatteryRam::new(LAYOUT, false, false, RamImage::default(), Some(9));
            let (_, peripherals, id) = mapped(ram);
            peripherals.get(id).as_ram().unwrap().bytes().to_vec()
        };
        let ram = BatteryRam::new(LAYOUT, false, false, image, Some(9));
        let (_, peripherals, id) = mapped(ram);
        assert_eq!(peripherals.get(id).as_ram().unwrap().bytes(), &reference[..]);
        assert!(!path.exists());
    }

    #[test]
    fn test_save_on_uninitialise_unless_preserved() {
        let path = temp_path("save");
        let _ = std::fs::remove_file(&path);

        let image = RamImage {
            path: Some(path.clone()),
            clean: true,
            preserve: true,
        };
        let ram = BatteryRam::new(LAYOUT, false, false, image.clone(), Some(3));
        let (mut mmu, mut peripherals, id) = mapped(ram);
        peripherals
            .get_mut(id)
            .uninitialise(&mut RegionBinder::new(&mut mmu, id));
        assert!(!path.exists());
        assert!(mmu.resolve(LAYOUT.base).is_none());

        let ram = BatteryRam::new(
            LAYOUT,
            false,
            false,
            RamImage {
                preserve: false,
                ..image
            },
            Some(3),
        );
        let (mut mmu, mut peripherals, id) = mapped(ram);
        let expected = peripherals.get(id).as_ram().unwrap().bytes().to_vec();
        peripherals
            .get_mut(id)
            .uninitialise(&mut RegionBinder::new(&mut mmu, id));
        assert_eq!(std::fs::read(&path).unwrap(), expected);
        let _ = std::fs::remove_file(&path);
    }
}
