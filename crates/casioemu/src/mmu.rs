//! Byte-addressed memory bus.
//!
//! The bus owns the address map: a two-level page table from byte address to
//! the active [`RegionDescriptor`] covering it. It holds no device state of its
//! own; every access is forwarded to the peripheral that owns the region,
//! identified by its [`PeripheralId`] in the [`Peripherals`] arena.
//!
//! Peripherals cannot reach the bus while one of their handlers runs. Changes
//! they want to make to the address map (power-on/off of a register block) or
//! writes they forward to other addresses are queued in [`Effects`] and applied
//! by the bus once the handler returns.

use crate::error::ConfigError;
use crate::mmio::{self, PeripheralId, Peripherals};
use tracing::{error, trace, warn};

/// Bytes per page of the address table
pub const PAGE_SIZE: usize = 0x100;

/// Forwarded writes deeper than this are dropped
const MAX_FORWARD_DEPTH: usize = 8;

/// Stable handle to a region descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(u32);

/// Peripheral-defined discriminator telling a handler which of its regions was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionTag(pub u16);

/// Binding of a contiguous address range to a peripheral
#[derive(Debug, Clone)]
pub struct RegionDescriptor {
    pub base: u32,
    pub size: u32,
    pub owner: PeripheralId,
    pub tag: RegionTag,
    pub label: &'static str,
    active: bool,
}

impl RegionDescriptor {
    pub fn new(
        base: u32,
        size: u32,
        owner: PeripheralId,
        tag: RegionTag,
        label: &'static str,
    ) -> Self {
        Self {
            base,
            size,
            owner,
            tag,
            label,
            active: false,
        }
    }

    /// One past the last address of the region
    pub fn end(&self) -> u32 {
        self.base + self.size
    }

    pub fn contains(&self, address: u32) -> bool {
        (self.base..self.end()).contains(&address)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Address map change or side-channel write requested by a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEffect {
    Activate(RegionId),
    Deactivate(RegionId),
    Write { address: u32, value: u8 },
}

/// Queue of bus effects collected while a write handler runs
#[derive(Debug, Default)]
pub struct Effects {
    queue: Vec<BusEffect>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, id: RegionId) {
        self.queue.push(BusEffect::Activate(id));
    }

    pub fn deactivate(&mut self, id: RegionId) {
        self.queue.push(BusEffect::Deactivate(id));
    }

    /// Forward a byte write to another bus address
    pub fn write(&mut self, address: u32, value: u8) {
        self.queue.push(BusEffect::Write { address, value });
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, BusEffect> {
        self.queue.drain(..)
    }
}

type Page = Box<[Option<RegionId>; PAGE_SIZE]>;

/// Memory bus and address map
pub struct Mmu {
    space: u32,
    pages: Vec<Option<Page>>,
    regions: Vec<RegionDescriptor>,
}

impl Mmu {
    /// Create an empty bus covering `space` bytes
    pub fn new(space: u32) -> Self {
        let page_count = (space as usize).div_ceil(PAGE_SIZE);
        Self {
            space,
            pages: (0..page_count).map(|_| None).collect(),
            regions: Vec::new(),
        }
    }

    /// Size of the address space in bytes
    pub fn space(&self) -> u32 {
        self.space
    }

    /// Add a region descriptor without binding it
    pub fn declare(&mut self, descriptor: RegionDescriptor) -> Result<RegionId, ConfigError> {
        let end = descriptor.base as u64 + descriptor.size as u64;
        if descriptor.size == 0 || end > self.space as u64 {
            return Err(ConfigError::RegionOutOfRange {
                label: descriptor.label,
                base: descriptor.base,
                size: descriptor.size,
                space: self.space,
            });
        }
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(RegionDescriptor {
            active: false,
            ..descriptor
        });
        Ok(id)
    }

    /// Bind a declared region into the address map.
    ///
    /// Activating an already active region is a no-op. Fails without touching
    /// the map if any byte of the range belongs to another active region.
    pub fn activate(&mut self, id: RegionId) -> Result<(), ConfigError> {
        let descriptor = &self.regions[id.0 as usize];
        if descriptor.active {
            return Ok(());
        }
        for address in descriptor.base..descriptor.end() {
            if let Some(other) = self.slot(address) {
                let existing = &self.regions[other.0 as usize];
                return Err(ConfigError::RegionOverlap {
                    label: descriptor.label,
                    base: descriptor.base,
                    size: descriptor.size,
                    existing: existing.label,
                    address,
                });
            }
        }

        let (base, end) = (descriptor.base, descriptor.end());
        for address in base..end {
            *self.slot_mut(address) = Some(id);
        }
        self.regions[id.0 as usize].active = true;
        trace!(
            "Activated region {} at {:#X}-{:#X}",
            self.regions[id.0 as usize].label, base, end
        );
        Ok(())
    }

    /// Declare and activate a region in one step
    pub fn register(&mut self, descriptor: RegionDescriptor) -> Result<RegionId, ConfigError> {
        let id = self.declare(descriptor)?;
        self.activate(id)?;
        Ok(id)
    }

    /// Remove a region from the address map, keeping its descriptor
    pub fn deactivate(&mut self, id: RegionId) {
        let descriptor = &self.regions[id.0 as usize];
        if !descriptor.active {
            return;
        }
        let (base, end) = (descriptor.base, descriptor.end());
        for address in base..end {
            let slot = self.slot_mut(address);
            if *slot == Some(id) {
                *slot = None;
            }
        }
        self.regions[id.0 as usize].active = false;
        trace!(
            "Deactivated region {} at {:#X}-{:#X}",
            self.regions[id.0 as usize].label, base, end
        );
    }

    /// Active region covering `address`, if any
    pub fn resolve(&self, address: u32) -> Option<&RegionDescriptor> {
        if address >= self.space {
            return None;
        }
        self.slot(address).map(|id| &self.regions[id.0 as usize])
    }

    pub fn descriptor(&self, id: RegionId) -> &RegionDescriptor {
        &self.regions[id.0 as usize]
    }

    /// All descriptors ever declared, active or not
    pub fn regions(&self) -> impl Iterator<Item = &RegionDescriptor> {
        self.regions.iter()
    }

    /// Read one byte through the owning peripheral
    pub fn read(&self, peripherals: &mut Peripherals, address: u32) -> u8 {
        match self.resolve(address) {
            Some(region) => {
                let (owner, tag, offset) = (region.owner, region.tag, address - region.base);
                peripherals.get_mut(owner).read(tag, offset)
            }
            None => mmio::generic::read_handler(address),
        }
    }

    /// Write one byte through the owning peripheral and apply its effects
    pub fn write(&mut self, peripherals: &mut Peripherals, address: u32, value: u8) {
        self.write_at_depth(peripherals, address, value, 0);
    }

    fn write_at_depth(
        &mut self,
        peripherals: &mut Peripherals,
        address: u32,
        value: u8,
        depth: usize,
    ) {
        let Some(region) = self.resolve(address) else {
            mmio::generic::write_handler(address, value);
            return;
        };
        let (owner, tag, offset) = (region.owner, region.tag, address - region.base);

        let mut effects = Effects::new();
        peripherals
            .get_mut(owner)
            .write(tag, offset, value, &mut effects);
        if effects.is_empty() {
            return;
        }

        let queued: Vec<BusEffect> = effects.drain().collect();
        for effect in queued {
            match effect {
                BusEffect::Write { address, value } => {
                    if depth >= MAX_FORWARD_DEPTH {
                        warn!(
                            "Dropping forwarded write to {:#X}: forwarding depth exceeded",
                            address
                        );
                        continue;
                    }
                    self.write_at_depth(peripherals, address, value, depth + 1);
                }
                other => self.apply(other),
            }
        }
    }

    /// Apply a map change requested from a handler.
    ///
    /// Overlap at this point means two peripherals decode the same address,
    /// which no running program can recover from.
    pub(crate) fn apply(&mut self, effect: BusEffect) {
        match effect {
            BusEffect::Activate(id) => {
                if let Err(e) = self.activate(id) {
                    error!("{}", e);
                    panic!("inconsistent address map: {e}");
                }
            }
            BusEffect::Deactivate(id) => self.deactivate(id),
            BusEffect::Write { .. } => {}
        }
    }

    fn slot(&self, address: u32) -> Option<RegionId> {
        let index = address as usize;
        self.pages[index / PAGE_SIZE]
            .as_ref()
            .and_then(|page| page[index % PAGE_SIZE])
    }

    fn slot_mut(&mut self, address: u32) -> &mut Option<RegionId> {
        let index = address as usize;
        let page = self.pages[index / PAGE_SIZE].get_or_insert_with(|| Box::new([None; PAGE_SIZE]));
        &mut page[index % PAGE_SIZE]
    }
}

/// Region registration handle given to a peripheral during its lifecycle calls
pub struct RegionBinder<'a> {
    mmu: &'a mut Mmu,
    owner: PeripheralId,
}

impl<'a> RegionBinder<'a> {
    pub fn new(mmu: &'a mut Mmu, owner: PeripheralId) -> Self {
        Self { mmu, owner }
    }

    /// Declare a region owned by this peripheral without binding it
    pub fn declare(
        &mut self,
        base: u32,
        size: u32,
        tag: RegionTag,
        label: &'static str,
    ) -> Result<RegionId, ConfigError> {
        self.mmu
            .declare(RegionDescriptor::new(base, size, self.owner, tag, label))
    }

    /// Declare and bind a region owned by this peripheral
    pub fn map(
        &mut self,
        base: u32,
        size: u32,
        tag: RegionTag,
        label: &'static str,
    ) -> Result<RegionId, ConfigError> {
        let id = self.declare(base, size, tag, label)?;
        self.mmu.activate(id)?;
        Ok(id)
    }

    pub fn activate(&mut self, id: RegionId) -> Result<(), ConfigError> {
        self.mmu.activate(id)
    }

    pub fn deactivate(&mut self, id: RegionId) {
        self.mmu.deactivate(id);
    }
}
