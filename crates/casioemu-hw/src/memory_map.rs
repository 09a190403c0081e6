//! Address map of the emulated boards.
//!
//! All addresses are byte addresses in the flat data space seen by the bus.

use crate::HardwareId;

/// Size of the flat data address space (1 MiB)
pub const ADDRESS_SPACE: u32 = 0x10_0000;

/// Battery-backed RAM placement for one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamLayout {
    /// Base address of the main RAM window
    pub base: u32,
    /// Size of the main RAM window as seen on real hardware
    pub size: usize,
    /// Legacy address where the reserved trailer is aliased in emulation mode
    pub alias_base: u32,
}

impl RamLayout {
    /// Size of the extra trailer appended in emulation mode
    pub const TRAILER_SIZE: usize = 0x100;

    /// Total buffer length for the given mode
    pub fn buffer_len(&self, real_hardware: bool) -> usize {
        if real_hardware {
            self.size
        } else {
            self.size + Self::TRAILER_SIZE
        }
    }
}

/// RAM layout per hardware variant
pub fn ram_layout(hw: HardwareId) -> RamLayout {
    match hw {
        HardwareId::EsPlus => RamLayout {
            base: 0x8000,
            size: 0x0E00,
            alias_base: 0x9800,
        },
        HardwareId::ClassWiz => RamLayout {
            base: 0xD000,
            size: 0x2000,
            alias_base: 0x4_9800,
        },
        HardwareId::ClassWizII => RamLayout {
            base: 0x9000,
            size: 0x6000,
            alias_base: 0x8_9800,
        },
        // Program storage lives in the separate segment 4 window
        HardwareId::Fx5800P => RamLayout {
            base: 0x8000,
            size: 0x0E00,
            alias_base: 0x8_9800,
        },
        HardwareId::Ti => RamLayout {
            base: 0xD000,
            size: 0x2000,
            alias_base: 0x8_9800,
        },
    }
}

/// fx-5800P program RAM segment
pub mod pram {
    /// Program RAM base address (segment 4)
    pub const BASE: u32 = 0x4_0000;
    /// Program RAM size (32 KB)
    pub const SIZE: usize = 0x8000;
}
