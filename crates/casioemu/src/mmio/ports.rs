//! General purpose ports with edge-triggered external interrupts.
//!
//! Each port has a data bank at `0xF210 + 8 * index` and, except for port 6,
//! an interrupt bank at `0xF980 + 8 * index`. Which ports exist depends on the
//! variant (see `casioemu_hw::mmio::ports::port_indices`).
//!
//! Interrupt registers follow one convention on every port:
//! - Enable: plain storage
//! - Status: read-only, set by [`PortGroup::raise`] for enabled and armed bits
//! - Clear: writing 1s clears the matching Status bits
//! - Update: writing 1s re-arms the matching edge detectors
//!
//! An edge disarms its detector once latched, so a held line does not
//! retrigger until firmware writes Update.

use crate::error::ConfigError;
use crate::mmio::Peripheral;
use crate::mmu::{Effects, RegionBinder, RegionId, RegionTag};
use crate::sfr::{IGNORE_READ, Sfr};
use casioemu_hw::mmio::ports::{
    BANK_STRIDE, DATA_BANK_BASE, EXTENDED_MODE_PORTS, INTERRUPT_BANK_BASE, NO_INTERRUPT_PORT,
    WIDE_EXICON_PORT,
};
use tracing::{debug, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum PortRegister {
    Data = 0,
    Direction = 1,
    Control = 2,
    Mode01 = 3,
    Mode23 = 4,
    ExiCon = 5,
    Enable = 6,
    Status = 7,
    Clear = 8,
    Update = 9,
}

impl PortRegister {
    const ALL: [PortRegister; 10] = [
        PortRegister::Data,
        PortRegister::Direction,
        PortRegister::Control,
        PortRegister::Mode01,
        PortRegister::Mode23,
        PortRegister::ExiCon,
        PortRegister::Enable,
        PortRegister::Status,
        PortRegister::Clear,
        PortRegister::Update,
    ];

    fn tag(self, slot: usize) -> RegionTag {
        RegionTag(((slot as u16) << 4) | self as u16)
    }

    fn from_tag(tag: RegionTag) -> Option<(usize, PortRegister)> {
        let slot = (tag.0 >> 4) as usize;
        let register = *Self::ALL.get((tag.0 & 0xF) as usize)?;
        Some((slot, register))
    }
}

#[derive(Debug)]
struct InterruptBank {
    exicon: Sfr,
    enable: Sfr,
    status: Sfr,
    /// Edge detectors that may latch into Status
    armed: u8,
}

impl InterruptBank {
    fn new(wide: bool) -> Self {
        Self {
            exicon: if wide {
                Sfr::new(4, 0xFFFF_FFFF, 0)
            } else {
                Sfr::half(0xFFFF)
            },
            enable: Sfr::byte(0xFF),
            status: Sfr::byte(0xFF),
            armed: 0xFF,
        }
    }

    fn reset(&mut self) {
        self.exicon.reset();
        self.enable.reset();
        self.status.reset();
        self.armed = 0xFF;
    }
}

#[derive(Debug)]
struct Port {
    index: u8,
    data: Sfr,
    direction: Sfr,
    control: Sfr,
    mode01: Sfr,
    mode23: Option<Sfr>,
    interrupt: Option<InterruptBank>,
}

impl Port {
    fn new(index: u8) -> Self {
        Self {
            index,
            data: Sfr::byte(0xFF),
            direction: Sfr::byte(0xFF),
            control: Sfr::half(0xFFFF),
            mode01: Sfr::half(0xFFFF),
            mode23: EXTENDED_MODE_PORTS
                .contains(&index)
                .then(|| Sfr::half(0xFFFF)),
            interrupt: (index != NO_INTERRUPT_PORT)
                .then(|| InterruptBank::new(index == WIDE_EXICON_PORT)),
        }
    }

    fn reset(&mut self) {
        self.data.reset();
        self.direction.reset();
        self.control.reset();
        self.mode01.reset();
        if let Some(mode23) = self.mode23.as_mut() {
            mode23.reset();
        }
        if let Some(interrupt) = self.interrupt.as_mut() {
            interrupt.reset();
        }
    }

    fn storage(&mut self, register: PortRegister) -> Option<&mut Sfr> {
        match register {
            PortRegister::Data => Some(&mut self.data),
            PortRegister::Direction => Some(&mut self.direction),
            PortRegister::Control => Some(&mut self.control),
            PortRegister::Mode01 => Some(&mut self.mode01),
            PortRegister::Mode23 => self.mode23.as_mut(),
            PortRegister::ExiCon => self.interrupt.as_mut().map(|i| &mut i.exicon),
            PortRegister::Enable => self.interrupt.as_mut().map(|i| &mut i.enable),
            PortRegister::Status => self.interrupt.as_mut().map(|i| &mut i.status),
            PortRegister::Clear | PortRegister::Update => None,
        }
    }
}

/// All ports of one variant
pub struct PortGroup {
    ports: Vec<Port>,
    regions: Vec<RegionId>,
}

impl PortGroup {
    pub fn new(indices: &[u8]) -> Self {
        Self {
            ports: indices.iter().copied().map(Port::new).collect(),
            regions: Vec::new(),
        }
    }

    /// Port indices in this group
    pub fn indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.ports.iter().map(|p| p.index)
    }

    fn port(&self, index: u8) -> Option<&Port> {
        self.ports.iter().find(|p| p.index == index)
    }

    fn port_mut(&mut self, index: u8) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.index == index)
    }

    /// Signal edges on the pins in `bits` of port `index`.
    ///
    /// Latches the bits that are enabled and armed into Status and disarms
    /// them. Returns the newly latched bits.
    pub fn raise(&mut self, index: u8, bits: u8) -> u8 {
        let Some(interrupt) = self.port_mut(index).and_then(|p| p.interrupt.as_mut()) else {
            return 0;
        };
        let latched = bits & interrupt.enable.get() as u8 & interrupt.armed;
        interrupt.status.set_bits(latched as u32);
        interrupt.armed &= !latched;
        if latched != 0 {
            trace!("Port {} latched interrupt bits {:#04X}", index, latched);
        }
        latched
    }

    /// Interrupt status of port `index`
    pub fn status(&self, index: u8) -> u8 {
        self.port(index)
            .and_then(|p| p.interrupt.as_ref())
            .map_or(0, |i| i.status.get() as u8)
    }

    /// True when an enabled status bit is set
    pub fn pending(&self, index: u8) -> bool {
        self.port(index)
            .and_then(|p| p.interrupt.as_ref())
            .is_some_and(|i| i.status.get() & i.enable.get() != 0)
    }

    /// Data register of port `index` as last written
    pub fn data(&self, index: u8) -> u8 {
        self.port(index).map_or(0, |p| p.data.get() as u8)
    }
}

impl Peripheral for PortGroup {
    fn name(&self) -> &'static str {
        "Ports"
    }

    fn initialise(&mut self, regions: &mut RegionBinder<'_>) -> Result<(), ConfigError> {
        let mut ids = Vec::new();
        for (slot, port) in self.ports.iter().enumerate() {
            let i = port.index as u32;
            let mut base = DATA_BANK_BASE + i * BANK_STRIDE;
            debug!("  Mapping port {} data bank at {:#X}", port.index, base);

            ids.push(regions.map(base, 1, PortRegister::Data.tag(slot), "PortN/Data")?);
            base += 1;
            ids.push(regions.map(base, 1, PortRegister::Direction.tag(slot), "PortN/Direction")?);
            base += 1;
            ids.push(regions.map(base, 2, PortRegister::Control.tag(slot), "PortN/Control")?);
            base += 2;
            ids.push(regions.map(base, 2, PortRegister::Mode01.tag(slot), "PortN/Mode01")?);
            base += 2;
            if port.mode23.is_some() {
                ids.push(regions.map(base, 2, PortRegister::Mode23.tag(slot), "PortN/Mode23")?);
            }

            let Some(interrupt) = port.interrupt.as_ref() else {
                continue;
            };
            let base = INTERRUPT_BANK_BASE + i * BANK_STRIDE;
            debug!("  Mapping port {} interrupt bank at {:#X}", port.index, base);
            ids.push(regions.map(
                base,
                interrupt.exicon.width(),
                PortRegister::ExiCon.tag(slot),
                "PortN/ExI",
            )?);
            ids.push(regions.map(base + 4, 1, PortRegister::Enable.tag(slot), "PortN/Enable")?);
            ids.push(regions.map(base + 5, 1, PortRegister::Status.tag(slot), "PortN/Status")?);
            ids.push(regions.map(base + 6, 1, PortRegister::Clear.tag(slot), "PortN/Clear")?);
            ids.push(regions.map(base + 7, 1, PortRegister::Update.tag(slot), "PortN/Update")?);
        }
        self.regions = ids;
        Ok(())
    }

    fn uninitialise(&mut self, regions: &mut RegionBinder<'_>) {
        for id in self.regions.drain(..) {
            regions.deactivate(id);
        }
    }

    fn as_ports(&mut self) -> Option<&mut PortGroup> {
        Some(self)
    }

    fn reset(&mut self) {
        for port in &mut self.ports {
            port.reset();
        }
    }

    #[instrument(level = "trace", skip(self))]
    fn read(&mut self, tag: RegionTag, offset: u32) -> u8 {
        let Some((slot, register)) = PortRegister::from_tag(tag) else {
            return IGNORE_READ;
        };
        let Some(port) = self.ports.get_mut(slot) else {
            return IGNORE_READ;
        };
        port.storage(register)
            .map_or(IGNORE_READ, |sfr| sfr.read_byte(offset))
    }

    #[instrument(level = "trace", skip(self, _effects))]
    fn write(&mut self, tag: RegionTag, offset: u32, value: u8, _effects: &mut Effects) {
        let Some((slot, register)) = PortRegister::from_tag(tag) else {
            return;
        };
        let Some(port) = self.ports.get_mut(slot) else {
            return;
        };
        match register {
            // Status only changes through edges and Clear
            PortRegister::Status => {}
            PortRegister::Clear => {
                if let Some(interrupt) = port.interrupt.as_mut() {
                    interrupt.status.clear_bits(value as u32);
                }
            }
            PortRegister::Update => {
                if let Some(interrupt) = port.interrupt.as_mut() {
                    interrupt.armed |= value;
                }
            }
            other => {
                if let Some(sfr) = port.storage(other) {
                    sfr.write_byte(offset, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::Peripherals;
    use crate::mmu::Mmu;
    use casioemu_hw::HardwareId;
    use casioemu_hw::memory_map::ADDRESS_SPACE;
    use casioemu_hw::mmio::ports::port_indices;

    fn bus(indices: &[u8]) -> (Mmu, Peripherals, crate::mmio::PeripheralId) {
        let mut mmu = Mmu::new(ADDRESS_SPACE);
        let mut peripherals = Peripherals::new();
        let id = peripherals.add(Box::new(PortGroup::new(indices)));
        peripherals
            .get_mut(id)
            .initialise(&mut RegionBinder::new(&mut mmu, id))
            .unwrap();
        (mmu, peripherals, id)
    }

    #[test]
    fn test_classwiz_ports_do_not_overlap() {
        let (mmu, _, _) = bus(port_indices(HardwareId::ClassWiz));
        // Port 3 has both mode registers, port 4 follows at the next stride
        assert_eq!(mmu.resolve(0xF228 + 6).unwrap().label, "PortN/Mode23");
        assert_eq!(mmu.resolve(0xF230).unwrap().label, "PortN/Data");
        // Port 6 has no interrupt bank
        assert!(mmu.resolve(INTERRUPT_BANK_BASE + 6 * BANK_STRIDE + 4).is_none());
        // Port 2 has a four byte ExI register
        assert_eq!(mmu.resolve(0xF990 + 3).unwrap().label, "PortN/ExI");
        assert!(mmu.resolve(0xF980 + 2).is_none());
    }

    #[test]
    fn test_absent_ports_are_not_decoded() {
        let (mmu, _, _) = bus(port_indices(HardwareId::Ti));
        assert!(mmu.resolve(0xF238).is_none());
        assert!(mmu.resolve(0xF248).is_none());
        assert!(mmu.resolve(0xF218).is_none());
    }

    #[test]
    fn test_data_and_control_round_trip() {
        let (mut mmu, mut peripherals, _) = bus(&[0]);
        mmu.write(&mut peripherals, 0xF210, 0xA5);
        mmu.write(&mut peripherals, 0xF212, 0x34);
        mmu.write(&mut peripherals, 0xF213, 0x12);
        assert_eq!(mmu.read(&mut peripherals, 0xF210), 0xA5);
        assert_eq!(mmu.read(&mut peripherals, 0xF212), 0x34);
        assert_eq!(mmu.read(&mut peripherals, 0xF213), 0x12);
    }

    #[test]
    fn test_interrupt_latch_clear_and_rearm() {
        let mut group = PortGroup::new(&[0]);
        let mut effects = Effects::new();
        let enable = PortRegister::Enable.tag(0);
        let clear = PortRegister::Clear.tag(0);
        let update = PortRegister::Update.tag(0);
        let status = PortRegister::Status.tag(0);

        // Disabled bits never latch
        assert_eq!(group.raise(0, 0x01), 0);
        group.write(enable, 0, 0x03, &mut effects);
        assert_eq!(group.raise(0, 0x01), 0x01);
        assert!(group.pending(0));
        assert_eq!(group.read(status, 0), 0x01);

        // Status is read-only
        group.write(status, 0, 0x00, &mut effects);
        assert_eq!(group.status(0), 0x01);

        group.write(clear, 0, 0x01, &mut effects);
        assert_eq!(group.status(0), 0);
        assert!(!group.pending(0));
        assert_eq!(group.read(clear, 0), 0);

        // Disarmed until Update
        assert_eq!(group.raise(0, 0x01), 0);
        group.write(update, 0, 0x01, &mut effects);
        assert_eq!(group.read(update, 0), 0);
        assert_eq!(group.raise(0, 0x01), 0x01);
    }

    #[test]
    fn test_raise_on_port_without_interrupts() {
        let mut group = PortGroup::new(&[6]);
        assert_eq!(group.raise(6, 0xFF), 0);
        assert!(!group.pending(6));
        assert_eq!(group.raise(9, 0xFF), 0);
    }
}
