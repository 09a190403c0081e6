//! General purpose port groups with external interrupt support

use crate::HardwareId;

/// Base of the data/direction/control/mode bank of port 0
pub const DATA_BANK_BASE: u32 = 0xF210;

/// Base of the external interrupt bank of port 0
pub const INTERRUPT_BANK_BASE: u32 = 0xF980;

/// Stride between two ports in either bank
pub const BANK_STRIDE: u32 = 8;

/// Port without an interrupt bank
pub const NO_INTERRUPT_PORT: u8 = 6;

/// Port whose external interrupt configuration register is 4 bytes wide
pub const WIDE_EXICON_PORT: u8 = 2;

/// Ports that carry a second mode register
pub const EXTENDED_MODE_PORTS: [u8; 2] = [3, 5];

/// Ports physically present on the variant
pub fn port_indices(hw: HardwareId) -> &'static [u8] {
    match hw {
        HardwareId::EsPlus | HardwareId::Fx5800P => &[],
        HardwareId::ClassWiz | HardwareId::ClassWizII => &[0, 2, 3, 4, 5, 6, 7, 8],
        // Port 5 and port 7 data registers are owned by the display command port
        HardwareId::Ti => &[0, 2, 3, 4, 6, 8],
    }
}
