//! Display controllers.
//!
//! Two controller families exist:
//! - [`MatrixScreen`]: a dot matrix fed from one or two display buffers at
//!   0xF800, driven by mode/range/contrast/power registers
//! - [`CommandScreen`]: a controller configured through a command byte port
//!   that scans a bitmap kept in main RAM
//!
//! Both keep a per-cell intensity map that a background [`DecayTicker`]
//! advances independently of bus traffic. Registers shared with the ticker are
//! atomics and every buffer sits behind its own lock, so a bus access waits at
//! most for one buffer copy.
//!
//! [`DecayTicker`]: crate::scheduler::DecayTicker

pub mod command;
pub mod decay;
pub mod matrix;

pub use command::CommandScreen;
pub use decay::ScanTuning;
pub use matrix::MatrixScreen;

use casioemu_hw::specs::timing::DECAY_TICK_INTERVAL_US;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Construction options shared by both controller families
#[derive(Debug, Clone)]
pub struct ScreenOptions {
    /// Drop the emulation-only debug alias of the second buffer
    pub real_hardware: bool,
    /// Run the decay on a background thread; otherwise `tick` steps it
    pub background_decay: bool,
    pub decay_interval: Duration,
    pub tuning: ScanTuning,
    /// Seed of the power-on noise
    pub seed: Option<u64>,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            real_hardware: false,
            background_decay: true,
            decay_interval: Duration::from_micros(DECAY_TICK_INTERVAL_US),
            tuning: ScanTuning::default(),
            seed: None,
        }
    }
}

/// Location of the command-port display's bitmap in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSource {
    /// Address of the column-major 1 bpp dot bitmap
    pub screen_addr: u32,
    /// Address of the status icon bytes
    pub status_addr: u32,
}

/// Lock a display mutex, ignoring poisoning.
///
/// A panic on the ticker thread leaves plain bytes and floats behind, which
/// are still valid to read.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
