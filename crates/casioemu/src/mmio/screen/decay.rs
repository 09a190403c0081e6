//! Analog response of the LCD glass.
//!
//! A cell's intensity never jumps: every tick it moves a small fraction of the
//! way toward the level its pixel asks for. Everything here is plain
//! arithmetic on registers and intensities so the tick can be driven by a
//! background thread or stepped directly.

use casioemu_hw::specs::timing::{FLICKER_THRESHOLD, SCAN_BRIGHTNESS_COEFF};

/// Rows covered by the scan-line profile
pub const SCAN_ROWS: usize = 64;

/// Rows per half of a split display
const HALF_ROWS: usize = 32;

/// Move `value` one tick toward `target`
#[inline]
pub fn approach(value: f32, target: f32, ratio: f32) -> f32 {
    value * ratio + target * (1.0 - ratio)
}

/// Let every cell fade toward black
pub fn fade(cells: &mut [f32], ratio: f32) {
    for cell in cells {
        *cell *= ratio;
    }
}

/// Target intensities of a lit and an unlit dot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InkLevels {
    pub on: f32,
    pub off: f32,
}

impl InkLevels {
    /// Level between off and on: `weight` 0 is off, 1 is on
    pub fn mix(&self, weight: f32) -> f32 {
        self.off + (self.on - self.off) * weight
    }
}

/// Ink levels of a matrix display from its contrast registers.
///
/// `contrast2` is the secondary contrast when its enable register is set.
pub fn matrix_ink(
    contrast: u8,
    brightness: u8,
    contrast2: Option<u8>,
    coeff: i32,
    base: i32,
) -> InkLevels {
    let brightness = brightness.max(3) as i32;
    let mut level = contrast as f32 - 11.0;
    if let Some(contrast2) = contrast2 {
        level += contrast2 as f32 * 0.5;
    }
    let level = (level as i32).max(0);
    InkLevels {
        on: (base + level * coeff - brightness * 8).max(0) as f32,
        off: (base + 20 + level * (coeff - 11) - brightness * 13).max(0) as f32,
    }
}

/// Ink levels of the command-port display
pub fn command_ink(contrast: u8) -> InkLevels {
    let on = (contrast as f32 - 100.0) * 20.0;
    InkLevels {
        on: on.clamp(0.0, 255.0),
        off: (on * 0.1).clamp(0.0, 255.0),
    }
}

/// What the controller drives, decoded from the low three mode bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFlags {
    pub dots: bool,
    pub status: bool,
    /// Dot contents are ignored; every dot shows the unlit level
    pub clear_dots: bool,
    /// Dots are driven at a flat reduced level
    pub flat_ink: bool,
}

/// `None` means the glass is blanked
pub fn decode_mode(mode: u8) -> Option<ModeFlags> {
    match mode & 0b111 {
        0b100 => Some(ModeFlags {
            dots: true,
            status: false,
            clear_dots: true,
            flat_ink: false,
        }),
        0b101 => Some(ModeFlags {
            dots: true,
            status: true,
            clear_dots: false,
            flat_ink: false,
        }),
        0b110 => Some(ModeFlags {
            dots: true,
            status: true,
            clear_dots: true,
            flat_ink: true,
        }),
        _ => None,
    }
}

/// Decoded range register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    /// Ink multiplier; fewer driven rows get a higher duty cycle
    pub gain: i32,
    /// Rows driven per half
    pub rows: usize,
}

/// `None` when the range register blanks the display
pub fn decode_range(range: u8) -> Option<ScanRange> {
    if range & 0b10_0000 != 0 {
        return None;
    }
    let quarters = 4 - (range & 0b11) as i32;
    Some(ScanRange {
        gain: 4 / quarters,
        rows: quarters as usize * 8,
    })
}

/// Buffer row shown on glass row `row` (1-based; row 0 is the icon row), or
/// `None` when the row is outside the driven range.
pub fn source_row(row: usize, offset: usize, rows: usize, range: ScanRange) -> Option<usize> {
    if row < HALF_ROWS {
        (row < range.rows).then_some((row + offset) % rows)
    } else if row <= HALF_ROWS + range.rows {
        Some((row - HALF_ROWS + range.rows + offset) % rows)
    } else {
        None
    }
}

/// Knobs of the scan-line flicker model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanTuning {
    /// Refresh rate register values below this light every row evenly
    pub flicker_threshold: f32,
    /// Brightness of the row currently being scanned
    pub brightness: f32,
}

impl Default for ScanTuning {
    fn default() -> Self {
        Self {
            flicker_threshold: FLICKER_THRESHOLD,
            brightness: SCAN_BRIGHTNESS_COEFF,
        }
    }
}

/// Per-row brightness of a slowly scanned passive display
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProfile {
    alpha: [f32; SCAN_ROWS],
}

impl Default for ScanProfile {
    fn default() -> Self {
        Self {
            alpha: [1.0; SCAN_ROWS],
        }
    }
}

impl ScanProfile {
    /// Recompute the profile at `t_ms` for the refresh rate register value
    pub fn update(&mut self, t_ms: f32, refresh_rate: f32, tuning: &ScanTuning) {
        if refresh_rate < tuning.flicker_threshold {
            self.alpha = [1.0; SCAN_ROWS];
            return;
        }
        let position = (t_ms * refresh_rate.powf(-0.6) * 5.0) % SCAN_ROWS as f32;
        let lead = position.floor() as usize;
        for i in 0..SCAN_ROWS {
            self.alpha[(i + lead) % SCAN_ROWS] =
                tuning.brightness - i as f32 / SCAN_ROWS as f32 * tuning.brightness;
        }
    }

    pub fn row(&self, row: usize) -> f32 {
        self.alpha[row % SCAN_ROWS]
    }
}

const fn reverse_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }
    table
}

/// Bit-reversed value of every byte
pub const BIT_REVERSE: [u8; 256] = reverse_table();

/// Mirror the visible part of every row in place: reverse the bits of each
/// byte, then the byte order. Applying it twice is the identity.
pub fn mirror_rows(buffer: &mut [u8], row_size: usize, visible: usize) {
    for row in buffer.chunks_exact_mut(row_size) {
        let row = &mut row[..visible];
        for byte in row.iter_mut() {
            *byte = BIT_REVERSE[*byte as usize];
        }
        row.reverse();
    }
}
