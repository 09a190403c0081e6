//! Open bus behaviour for addresses no peripheral decodes.
//!
//! Reads return zero and writes are dropped. Firmware routinely probes SFRs
//! that are absent on a given variant, so neither case is an error.

use tracing::{instrument, trace};

/// Value read from an undecoded address
pub const OPEN_BUS: u8 = 0x00;

/// Open bus read handler - returns zero
#[instrument(level = "trace")]
pub fn read_handler(addr: u32) -> u8 {
    trace!("Unmapped read: addr={:#X}", addr);
    OPEN_BUS
}

/// Open bus write handler - ignores writes
#[instrument(level = "trace")]
pub fn write_handler(addr: u32, value: u8) {
    trace!("Unmapped write: addr={:#X}, value={:#X}", addr, value);
}
