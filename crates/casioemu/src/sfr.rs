//! Special function register storage.
//!
//! Direct-storage registers keep only the bits in their writable mask; every
//! other bit reads back as the register's reset pattern. Multi-byte registers
//! are little-endian and addressed one byte lane at a time, matching the
//! byte-wide bus.

use std::sync::atomic::{AtomicU8, Ordering};

/// Value returned by write-only command ports
pub const IGNORE_READ: u8 = 0x00;

/// Masked register of 1, 2 or 4 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sfr {
    value: u32,
    mask: u32,
    reset: u32,
    width: u32,
}

impl Sfr {
    pub const fn new(width: u32, mask: u32, reset: u32) -> Self {
        Self {
            value: reset & mask,
            mask,
            reset,
            width,
        }
    }

    /// Single byte register with a zero reset pattern
    pub const fn byte(mask: u8) -> Self {
        Self::new(1, mask as u32, 0)
    }

    /// Two byte register with a zero reset pattern
    pub const fn half(mask: u16) -> Self {
        Self::new(2, mask as u32, 0)
    }

    /// Size in bytes
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Full register value as the bus sees it
    pub fn get(&self) -> u32 {
        (self.value & self.mask) | (self.reset & !self.mask)
    }

    /// Store a full value, keeping only writable bits
    pub fn set(&mut self, value: u32) {
        self.value = value & self.mask;
    }

    /// Read byte lane `lane` (0 = least significant)
    pub fn read_byte(&self, lane: u32) -> u8 {
        if lane >= self.width {
            return IGNORE_READ;
        }
        (self.get() >> (lane * 8)) as u8
    }

    /// Write byte lane `lane`; other lanes are untouched
    pub fn write_byte(&mut self, lane: u32, value: u8) {
        if lane >= self.width {
            return;
        }
        let shift = lane * 8;
        let lane_mask = self.mask & (0xFF << shift);
        self.value = (self.value & !lane_mask) | (((value as u32) << shift) & lane_mask);
    }

    /// Clear bits in the stored value
    pub fn clear_bits(&mut self, bits: u32) {
        self.value &= !bits;
    }

    /// Set bits in the stored value, bypassing nothing but the mask
    pub fn set_bits(&mut self, bits: u32) {
        self.value |= bits & self.mask;
    }

    pub fn reset(&mut self) {
        self.value = self.reset & self.mask;
    }
}

/// Single byte register readable from another thread.
///
/// Stores are masked and atomic, so a concurrent reader sees either the old or
/// the new value.
#[derive(Debug)]
pub struct AtomicSfr {
    value: AtomicU8,
    mask: u8,
}

impl AtomicSfr {
    pub const fn new(mask: u8) -> Self {
        Self {
            value: AtomicU8::new(0),
            mask,
        }
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn load(&self) -> u8 {
        self.value.load(Ordering::Acquire)
    }

    /// Store `value & mask`, returning the previous value
    pub fn store(&self, value: u8) -> u8 {
        self.value.swap(value & self.mask, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }
}
