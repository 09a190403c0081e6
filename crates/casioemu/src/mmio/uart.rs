//! UART0 register block.
//!
//! Only the register file is modelled. Bytes written to the transmit buffer
//! are collected so a host can inspect what firmware sent; only the most
//! recent [`TX_HISTORY`] bytes are kept until the host drains them.

use crate::error::ConfigError;
use crate::mmio::Peripheral;
use crate::mmu::{Effects, RegionBinder, RegionId, RegionTag};
use crate::sfr::{IGNORE_READ, Sfr};
use casioemu_hw::mmio::uart::{masks, registers};
use std::collections::VecDeque;
use tracing::{debug, instrument, trace};

const BUFFER: RegionTag = RegionTag(0);
const CONTROL: RegionTag = RegionTag(1);
const MODE0: RegionTag = RegionTag(2);
const MODE1: RegionTag = RegionTag(3);
const BAUD: RegionTag = RegionTag(4);
const STATUS: RegionTag = RegionTag(5);

/// Transmitted bytes kept for the host
pub const TX_HISTORY: usize = 0x1000;

pub struct Uart {
    control: Sfr,
    mode0: Sfr,
    mode1: Sfr,
    baud: Sfr,
    status: Sfr,
    transmitted: VecDeque<u8>,
    regions: Vec<RegionId>,
}

impl Uart {
    pub fn new() -> Self {
        Self {
            control: Sfr::new(1, masks::CONTROL, 0),
            mode0: Sfr::new(1, masks::MODE0, 0),
            mode1: Sfr::new(1, masks::MODE1, 0),
            baud: Sfr::new(2, masks::BAUD, 0),
            status: Sfr::byte(0xFF),
            transmitted: VecDeque::new(),
            regions: Vec::new(),
        }
    }

    /// Take the bytes transmitted since the last call, oldest first
    pub fn take_transmitted(&mut self) -> Vec<u8> {
        self.transmitted.drain(..).collect()
    }

    /// Set status bits from the line side
    pub fn set_status(&mut self, bits: u8) {
        self.status.set_bits(bits as u32);
    }

    fn register(&mut self, tag: RegionTag) -> Option<&mut Sfr> {
        match tag {
            CONTROL => Some(&mut self.control),
            MODE0 => Some(&mut self.mode0),
            MODE1 => Some(&mut self.mode1),
            BAUD => Some(&mut self.baud),
            STATUS => Some(&mut self.status),
            _ => None,
        }
    }
}

impl Default for Uart {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripheral for Uart {
    fn name(&self) -> &'static str {
        "Uart"
    }

    fn initialise(&mut self, regions: &mut RegionBinder<'_>) -> Result<(), ConfigError> {
        debug!("  Mapping UART0 registers at {:#X}", registers::BUFFER);
        let layout = [
            (registers::BUFFER, 1, BUFFER, "Uart0/Buffer"),
            (registers::CONTROL, 1, CONTROL, "Uart0/Control"),
            (registers::MODE0, 1, MODE0, "Uart0/Mode0"),
            (registers::MODE1, 1, MODE1, "Uart0/Mode1"),
            (registers::BAUD, 2, BAUD, "Uart0/Baud"),
            (registers::STATUS, 1, STATUS, "Uart0/Status"),
        ];
        for (base, size, tag, label) in layout {
            self.regions.push(regions.map(base, size, tag, label)?);
        }
        Ok(())
    }

    fn uninitialise(&mut self, regions: &mut RegionBinder<'_>) {
        for id in self.regions.drain(..) {
            regions.deactivate(id);
        }
    }

    fn reset(&mut self) {
        self.control.reset();
        self.mode0.reset();
        self.mode1.reset();
        self.baud.reset();
        self.status.reset();
    }

    #[instrument(level = "trace", skip(self))]
    fn read(&mut self, tag: RegionTag, offset: u32) -> u8 {
        self.register(tag)
            .map_or(IGNORE_READ, |sfr| sfr.read_byte(offset))
    }

    #[instrument(level = "trace", skip(self, _effects))]
    fn write(&mut self, tag: RegionTag, offset: u32, value: u8, _effects: &mut Effects) {
        match tag {
            BUFFER => {
                trace!("UART0 transmit: {:#04X}", value);
                if self.transmitted.len() == TX_HISTORY {
                    self.transmitted.pop_front();
                }
                self.transmitted.push_back(value);
            }
            // Any write acknowledges every status bit
            STATUS => self.status.reset(),
            _ => {
                if let Some(sfr) = self.register(tag) {
                    sfr.write_byte(offset, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_masks() {
        let mut uart = Uart::new();
        let mut effects = Effects::new();
        uart.write(CONTROL, 0, 0xFF, &mut effects);
        uart.write(MODE0, 0, 0xFF, &mut effects);
        uart.write(MODE1, 0, 0xFF, &mut effects);
        uart.write(BAUD, 0, 0xFF, &mut effects);
        uart.write(BAUD, 1, 0xFF, &mut effects);

        assert_eq!(uart.read(CONTROL, 0), 0x01);
        assert_eq!(uart.read(MODE0, 0), 0b1_0111);
        assert_eq!(uart.read(MODE1, 0), 0x7F);
        assert_eq!(uart.read(BAUD, 0), 0xFF);
        assert_eq!(uart.read(BAUD, 1), 0x0F);
    }

    #[test]
    fn test_buffer_is_write_only() {
        let mut uart = Uart::new();
        let mut effects = Effects::new();
        uart.write(BUFFER, 0, b'4', &mut effects);
        uart.write(BUFFER, 0, b'2', &mut effects);
        assert_eq!(uart.read(BUFFER, 0), IGNORE_READ);
        assert_eq!(uart.take_transmitted(), b"42");
        assert!(uart.take_transmitted().is_empty());
    }

    #[test]
    fn test_transmit_history_is_bounded() {
        let mut uart = Uart::new();
        let mut effects = Effects::new();
        for i in 0..TX_HISTORY + 3 {
            uart.write(BUFFER, 0, i as u8, &mut effects);
        }
        let sent = uart.take_transmitted();
        assert_eq!(sent.len(), TX_HISTORY);
        // Oldest bytes were dropped first
        assert_eq!(sent[0], 3);
        assert_eq!(sent[TX_HISTORY - 1], (TX_HISTORY + 2) as u8);
    }

    #[test]
    fn test_status_write_clears() {
        let mut uart = Uart::new();
        let mut effects = Effects::new();
        uart.set_status(0x41);
        assert_eq!(uart.read(STATUS, 0), 0x41);
        uart.write(STATUS, 0, 0x01, &mut effects);
        assert_eq!(uart.read(STATUS, 0), 0x00);
    }
}
