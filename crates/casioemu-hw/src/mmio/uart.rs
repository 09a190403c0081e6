//! UART0 registers

use crate::HardwareId;

pub mod registers {
    pub const BUFFER: u32 = 0xF290;
    pub const CONTROL: u32 = 0xF291;
    pub const MODE0: u32 = 0xF292;
    pub const MODE1: u32 = 0xF293;
    /// Baud rate timer (2 bytes)
    pub const BAUD: u32 = 0xF294;
    pub const STATUS: u32 = 0xF296;
}

pub mod masks {
    pub const CONTROL: u32 = 0x01;
    pub const MODE0: u32 = 0b1_0111;
    pub const MODE1: u32 = 0x7F;
    pub const BAUD: u32 = 0x0FFF;
}

pub fn present(hw: HardwareId) -> bool {
    matches!(
        hw,
        HardwareId::ClassWiz | HardwareId::ClassWizII | HardwareId::Ti
    )
}
