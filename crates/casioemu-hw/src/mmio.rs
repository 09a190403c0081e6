//! Special function register addresses.
//!
//! Register offsets follow the ML620/nX-U8 SFR map at 0xF000-0xFFFF.

pub mod ports;
pub mod screen;
pub mod uart;
