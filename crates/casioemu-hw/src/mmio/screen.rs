//! Display controller registers

/// Dot matrix buffer base address
pub const BUFFER_BASE: u32 = 0xF800;

/// Debug alias of the second ClassWiz II buffer (emulation mode only)
pub const BUFFER1_ALIAS_BASE: u32 = 0x8_9000;

/// Bus address that writes to the forwarding registers are mirrored to
pub const FORWARD_TARGET: u32 = 0xF817;

/// Display register addresses
pub mod registers {
    /// Visible row range (bit 5 blanks the glass)
    pub const RANGE: u32 = 0xF030;
    /// Display mode (bits 0-2), horizontal flip (bit 3), vertical flip (bit 4)
    pub const MODE: u32 = 0xF031;
    pub const CONTRAST: u32 = 0xF032;
    pub const BRIGHTNESS: u32 = 0xF033;
    /// Refresh rate (ES PLUS: undocumented two-bit register)
    pub const REFRESH_RATE: u32 = 0xF034;
    pub const CONTRAST2: u32 = 0xF035;
    pub const CONTRAST2_EN: u32 = 0xF036;
    /// Buffer select (bit 2 banks the second buffer on real hardware)
    pub const SELECT: u32 = 0xF037;
    /// DSPOFST: vertical scroll offset
    pub const OFFSET: u32 = 0xF039;
    /// Power control; bit 0 enables the controller
    pub const POWER: u32 = 0xF03D;
    pub const FORWARD0: u32 = 0xF03E;
    pub const FORWARD1: u32 = 0xF03F;
}

/// Writable bits of the power register
pub const POWER_MASK: u8 = 0x0F;

/// Power register bit that enables the controller
pub const POWER_ENABLE: u8 = 0x01;

/// Select register bit choosing the second buffer
pub const SELECT_BUFFER1: u8 = 0x04;

/// Command-port display (TI board)
pub mod command_port {
    /// Port 7 data register carrying command bytes
    pub const COMMAND: u32 = 0xF248;
    /// Port 5 data register, written by firmware and ignored
    pub const AUX: u32 = 0xF238;

    pub const CMD_ENABLE: u8 = 0xA0;
    pub const CMD_DISABLE: u8 = 0xAE;
    /// Next byte is the contrast value
    pub const CMD_SET_CONTRAST: u8 = 0x81;
}
