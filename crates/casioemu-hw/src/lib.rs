//! Hardware description tables for the emulated calculator families.
//!
//! Everything in this crate is plain data: address maps, register masks and
//! display geometry for each [`HardwareId`]. The emulation core consumes these
//! tables instead of branching on the variant wherever it can.

pub mod memory_map;
pub mod mmio;
pub mod specs;

use std::fmt;

/// Product family of the emulated calculator.
///
/// The discriminants are the ids stored in model descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HardwareId {
    /// fx-ES PLUS family (nX-U8/100, 96×31 display)
    EsPlus = 3,
    /// fx-ClassWiz (EX) family (ML620, 192×63 display)
    ClassWiz = 4,
    /// fx-ClassWiz CW family (ML620, double-buffered 192×63 display)
    ClassWizII = 5,
    /// fx-5800P programmable (ES PLUS display, extra program RAM)
    Fx5800P = 6,
    /// TI-class board driven through a command-byte display port
    Ti = 7,
}

impl HardwareId {
    pub const ALL: [HardwareId; 5] = [
        HardwareId::EsPlus,
        HardwareId::ClassWiz,
        HardwareId::ClassWizII,
        HardwareId::Fx5800P,
        HardwareId::Ti,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HardwareId::EsPlus => "ES PLUS",
            HardwareId::ClassWiz => "ClassWiz",
            HardwareId::ClassWizII => "ClassWiz II",
            HardwareId::Fx5800P => "fx-5800P",
            HardwareId::Ti => "TI",
        }
    }
}

impl TryFrom<u8> for HardwareId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(HardwareId::EsPlus),
            4 => Ok(HardwareId::ClassWiz),
            5 => Ok(HardwareId::ClassWizII),
            6 => Ok(HardwareId::Fx5800P),
            7 => Ok(HardwareId::Ti),
            other => Err(other),
        }
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
