//! Buffer-based dot matrix controller (ES PLUS, ClassWiz, ClassWiz II).
//!
//! # States
//! Variants with a power register come up **Off**: only the power register is
//! decoded and the glass fades out. Writing power bit 0 = 1 binds the buffer
//! and register regions (**Active**). Writing bit 0 = 0 unbinds them, clears
//! the registers and fills the buffers with noise, since display RAM does not
//! survive losing power. The intensity map is kept across power cycles.
//! Variants without a power register are Active from initialisation.
//!
//! # Intensity map
//! `rows × columns` cells. Row 0 holds one cell per status icon in table
//! order; rows 1.. are the dots, in glass order (mirroring already applied).

use super::decay::{
    InkLevels, ScanProfile, ScanTuning, approach, decode_mode, decode_range, fade,
    matrix_ink, mirror_rows, source_row,
};
use super::{ScreenOptions, lock};
use crate::error::ConfigError;
use crate::mmio::{Peripheral, ScreenProvider};
use crate::mmu::{Effects, RegionBinder, RegionId, RegionTag};
use crate::noise;
use crate::render::{DrawCall, SpriteSet};
use crate::scheduler::{DecayClock, DecayModel, DecayTicker};
use crate::sfr::{AtomicSfr, IGNORE_READ};
use casioemu_hw::mmio::screen::{
    BUFFER_BASE, BUFFER1_ALIAS_BASE, FORWARD_TARGET, POWER_ENABLE, POWER_MASK, SELECT_BUFFER1,
    registers,
};
use casioemu_hw::specs::display::MatrixSpec;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};

const BUFFER: RegionTag = RegionTag(0);
const BUFFER1_ALIAS: RegionTag = RegionTag(1);
const RANGE: RegionTag = RegionTag(2);
const MODE: RegionTag = RegionTag(3);
const CONTRAST: RegionTag = RegionTag(4);
const BRIGHTNESS: RegionTag = RegionTag(5);
const REFRESH_RATE: RegionTag = RegionTag(6);
const CONTRAST2: RegionTag = RegionTag(7);
const CONTRAST2_EN: RegionTag = RegionTag(8);
const SELECT: RegionTag = RegionTag(9);
const OFFSET: RegionTag = RegionTag(10);
const POWER: RegionTag = RegionTag(11);
const FORWARD: RegionTag = RegionTag(12);
/// Part of the buffer past the hole
const BUFFER_TAIL: RegionTag = RegionTag(13);

/// Mode bit mirroring the dots horizontally
const MODE_FLIP_H: u8 = 0b1000;
/// Mode bit that, when clear, mirrors the dots vertically
const MODE_NO_FLIP_V: u8 = 0b1_0000;

/// Weight of each buffer in the dot level (first buffer first)
const SINGLE_BUFFER_WEIGHTS: &[f32] = &[1.0];
const DUAL_BUFFER_WEIGHTS: &[f32] = &[0.2, 0.8];

/// Flat level divisor used by the dimmed mode
const FLAT_INK_DIVISOR: f32 = 2.55;

#[derive(Debug)]
struct Registers {
    range: AtomicSfr,
    mode: AtomicSfr,
    contrast: AtomicSfr,
    brightness: AtomicSfr,
    refresh_rate: AtomicSfr,
    contrast2: AtomicSfr,
    contrast2_en: AtomicSfr,
    select: AtomicSfr,
    offset: AtomicSfr,
    power: AtomicSfr,
}

impl Registers {
    fn new(spec: &MatrixSpec) -> Self {
        let masks = &spec.masks;
        Self {
            range: AtomicSfr::new(masks.range),
            mode: AtomicSfr::new(masks.mode),
            contrast: AtomicSfr::new(masks.contrast),
            brightness: AtomicSfr::new(masks.brightness.unwrap_or(0)),
            refresh_rate: AtomicSfr::new(masks.refresh_rate),
            contrast2: AtomicSfr::new(masks.contrast2.unwrap_or(0)),
            contrast2_en: AtomicSfr::new(masks.contrast2_en.unwrap_or(0)),
            select: AtomicSfr::new(masks.select.unwrap_or(0)),
            offset: AtomicSfr::new(masks.offset.unwrap_or(0)),
            power: AtomicSfr::new(POWER_MASK),
        }
    }

    fn get(&self, tag: RegionTag) -> Option<&AtomicSfr> {
        match tag {
            RANGE => Some(&self.range),
            MODE => Some(&self.mode),
            CONTRAST => Some(&self.contrast),
            BRIGHTNESS => Some(&self.brightness),
            REFRESH_RATE => Some(&self.refresh_rate),
            CONTRAST2 => Some(&self.contrast2),
            CONTRAST2_EN => Some(&self.contrast2_en),
            SELECT => Some(&self.select),
            OFFSET => Some(&self.offset),
            POWER => Some(&self.power),
            _ => None,
        }
    }

    /// Everything but the power register
    fn reset(&self) {
        for sfr in [
            &self.range,
            &self.mode,
            &self.contrast,
            &self.brightness,
            &self.refresh_rate,
            &self.contrast2,
            &self.contrast2_en,
            &self.select,
            &self.offset,
        ] {
            sfr.reset();
        }
    }
}

#[derive(Debug)]
struct Glass {
    cells: Vec<f32>,
    scan: ScanProfile,
}

/// State shared between the bus side and the decay ticker
struct MatrixShared {
    spec: &'static MatrixSpec,
    tuning: ScanTuning,
    registers: Registers,
    buffers: Vec<Mutex<Vec<u8>>>,
    glass: Mutex<Glass>,
    enabled: AtomicBool,
}

impl MatrixShared {
    fn new(spec: &'static MatrixSpec, tuning: ScanTuning) -> Self {
        let buffer_count = if spec.dual_buffer { 2 } else { 1 };
        Self {
            spec,
            tuning,
            registers: Registers::new(spec),
            buffers: (0..buffer_count)
                .map(|_| Mutex::new(vec![0; spec.buffer_len()]))
                .collect(),
            glass: Mutex::new(Glass {
                cells: vec![0.0; spec.rows * spec.columns()],
                scan: ScanProfile::default(),
            }),
            enabled: AtomicBool::new(false),
        }
    }

    fn weights(&self) -> &'static [f32] {
        if self.spec.dual_buffer {
            DUAL_BUFFER_WEIGHTS
        } else {
            SINGLE_BUFFER_WEIGHTS
        }
    }

    fn ink(&self) -> InkLevels {
        let spec = self.spec;
        let registers = &self.registers;
        let (contrast2, contrast2_en) = spec.fixed_contrast2.unwrap_or((
            registers.contrast2.load(),
            registers.contrast2_en.load(),
        ));
        matrix_ink(
            registers.contrast.load(),
            registers.brightness.load(),
            (contrast2_en != 0).then_some(contrast2),
            spec.ink_coeff,
            spec.ink_base,
        )
    }
}

/// Level a dot asks for given the bits set across the buffers
fn dot_level(snapshot: &[Vec<u8>], weights: &[f32], index: usize, mask: u8, ink: InkLevels) -> f32 {
    let weight: f32 = snapshot
        .iter()
        .zip(weights)
        .filter(|(buffer, _)| buffer[index] & mask != 0)
        .map(|(_, weight)| weight)
        .sum();
    ink.mix(weight)
}

impl DecayModel for MatrixShared {
    fn step(&self, t_ms: f32) {
        let spec = self.spec;
        let registers = &self.registers;
        let ratio = spec.decay_ratio;

        let mut glass = lock(&self.glass);
        let Glass { cells, scan } = &mut *glass;

        let refresh = if spec.refresh_drives_scan {
            registers.refresh_rate.load() as f32
        } else {
            0.0
        };
        scan.update(t_ms, refresh, &self.tuning);
        let flicker = refresh >= self.tuning.flicker_threshold;

        if !self.enabled.load(Ordering::Acquire) {
            fade(cells, ratio);
            return;
        }
        let mode_register = registers.mode.load();
        let (Some(mode), Some(range)) = (
            decode_mode(mode_register),
            decode_range(registers.range.load()),
        ) else {
            fade(cells, ratio);
            return;
        };

        // Integer gain on integer levels, as the controller's duty cycle does
        let base = self.ink();
        let ink = InkLevels {
            on: base.on * range.gain as f32,
            off: base.off * range.gain as f32,
        };

        let snapshot: Vec<Vec<u8>> = self.buffers.iter().map(|b| lock(b).clone()).collect();
        let weights = self.weights();
        let (rows, row_size, columns) = (spec.rows, spec.row_size, spec.columns());
        let offset = registers.offset.load() as usize;
        let (icon_row, dot_rows) = cells.split_at_mut(columns);

        if mode.status {
            for (cell, icon) in icon_row.iter_mut().zip(spec.icons) {
                let index = (icon.offset as usize + offset * row_size) % (rows * row_size);
                let mut target = dot_level(&snapshot, weights, index, icon.mask, ink);
                if flicker {
                    target *= scan.row(0);
                }
                *cell = approach(*cell, target, ratio);
            }
        } else {
            fade(icon_row, ratio);
        }

        if !mode.dots {
            fade(dot_rows, ratio);
            return;
        }

        let dot_ink = if mode.flat_ink {
            let flat = (ink.off / FLAT_INK_DIVISOR).trunc();
            InkLevels { on: flat, off: flat }
        } else {
            ink
        };
        let flip_h = spec.mirroring && mode_register & MODE_FLIP_H != 0;
        let flip_v = spec.mirroring && mode_register & MODE_NO_FLIP_V == 0;

        for row in 1..rows {
            let line = &mut dot_rows[(row - 1) * columns..row * columns];
            let Some(source) = source_row(row, offset, rows, range) else {
                // Undriven rows relax toward black
                fade(line, ratio);
                continue;
            };
            let buffer_row = if flip_v {
                (spec.vflip_base + rows - source) % rows
            } else {
                source
            };
            let scan_gain = if flicker { scan.row(source) } else { 1.0 };

            for column in 0..columns {
                let mut target = if mode.clear_dots {
                    dot_ink.off
                } else {
                    let index = buffer_row * row_size + column / 8;
                    dot_level(&snapshot, weights, index, 0x80 >> (column % 8), dot_ink)
                };
                target *= scan_gain;
                let x = if flip_h { columns - 1 - column } else { column };
                line[x] = approach(line[x], target, ratio);
            }
        }
    }
}

/// Region handles bound while the display is powered
#[derive(Debug, Default)]
struct MatrixRegions {
    power: Option<RegionId>,
    body: Vec<RegionId>,
}

pub struct MatrixScreen {
    shared: Arc<MatrixShared>,
    sprites: SpriteSet,
    options: ScreenOptions,
    regions: MatrixRegions,
    ticker: Option<DecayTicker>,
    clock: DecayClock,
    noise: StdRng,
}

impl MatrixScreen {
    pub fn new(spec: &'static MatrixSpec, sprites: SpriteSet, options: ScreenOptions) -> Self {
        Self {
            shared: Arc::new(MatrixShared::new(spec, options.tuning)),
            sprites,
            noise: noise::generator(options.seed, noise::NoiseStream::Screen),
            options,
            regions: MatrixRegions::default(),
            ticker: None,
            clock: DecayClock::start(),
        }
    }

    pub fn spec(&self) -> &'static MatrixSpec {
        self.shared.spec
    }

    /// True while the controller is powered and its regions are bound
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Advance the decay by one tick at `t_ms`
    pub fn step_decay(&self, t_ms: f32) {
        self.shared.step(t_ms);
    }

    /// Copy of the intensity map
    pub fn intensities(&self) -> Vec<f32> {
        lock(&self.shared.glass).cells.clone()
    }

    fn uses_alias(&self) -> bool {
        self.shared.spec.dual_buffer && !self.options.real_hardware
    }

    fn fill_noise(&mut self) {
        for buffer in &self.shared.buffers {
            noise::fill(&mut self.noise, &mut lock(buffer));
        }
    }

    /// Buffer and byte offset a buffer-region access lands on; `None` for
    /// bytes that never reach the glass
    fn locate(&self, tag: RegionTag, offset: u32) -> Option<(&Mutex<Vec<u8>>, usize)> {
        let spec = self.shared.spec;
        let offset = match tag {
            BUFFER | BUFFER1_ALIAS => offset as usize,
            BUFFER_TAIL => offset as usize + spec.buffer_hole.map_or(0, |(at, len)| at + len),
            _ => return None,
        };
        if offset % spec.row_size >= spec.visible_row_bytes {
            return None;
        }
        let buffers = &self.shared.buffers;
        // Only dual-buffer controllers bank through Select
        let second = tag == BUFFER1_ALIAS
            || (spec.dual_buffer
                && self.options.real_hardware
                && self.shared.registers.select.load() & SELECT_BUFFER1 != 0);
        let buffer = if second { buffers.get(1) } else { buffers.first() }?;
        Some((buffer, offset))
    }

    fn declare_body(&mut self, regions: &mut RegionBinder<'_>) -> Result<(), ConfigError> {
        let spec = self.shared.spec;
        let masks = &spec.masks;
        let buffer_len = spec.buffer_len() as u32;
        let alias = self.uses_alias();
        let body = &mut self.regions.body;

        debug!(
            "  Mapping display buffer at {:#X} ({} bytes)",
            BUFFER_BASE, buffer_len
        );
        match spec.buffer_hole {
            Some((at, len)) => {
                let tail = (at + len) as u32;
                body.push(regions.declare(BUFFER_BASE, at as u32, BUFFER, "Screen/Buffer")?);
                body.push(regions.declare(
                    BUFFER_BASE + tail,
                    buffer_len - tail,
                    BUFFER_TAIL,
                    "Screen/Buffer",
                )?);
            }
            None => {
                body.push(regions.declare(BUFFER_BASE, buffer_len, BUFFER, "Screen/Buffer")?)
            }
        }
        if alias {
            debug!("  Mapping second display buffer alias at {:#X}", BUFFER1_ALIAS_BASE);
            body.push(regions.declare(
                BUFFER1_ALIAS_BASE,
                buffer_len,
                BUFFER1_ALIAS,
                "Screen/Buffer1",
            )?);
        }

        body.push(regions.declare(registers::RANGE, 1, RANGE, "Screen/Range")?);
        body.push(regions.declare(registers::MODE, 1, MODE, "Screen/Mode")?);
        body.push(regions.declare(registers::CONTRAST, 1, CONTRAST, "Screen/Contrast")?);
        let refresh_label = if spec.refresh_drives_scan {
            "Screen/RefreshRate"
        } else {
            "Screen/Unknown_F034"
        };
        body.push(regions.declare(registers::REFRESH_RATE, 1, REFRESH_RATE, refresh_label)?);

        let optional = [
            (masks.brightness, registers::BRIGHTNESS, BRIGHTNESS, "Screen/Brightness"),
            (masks.contrast2, registers::CONTRAST2, CONTRAST2, "Screen/Contrast2"),
            (masks.contrast2_en, registers::CONTRAST2_EN, CONTRAST2_EN, "Screen/Contrast2EN"),
            (masks.select, registers::SELECT, SELECT, "Screen/Select"),
            (masks.offset, registers::OFFSET, OFFSET, "Screen/DSPOFST"),
        ];
        for (mask, address, tag, label) in optional {
            if mask.is_some() {
                body.push(regions.declare(address, 1, tag, label)?);
            }
        }

        if spec.forward_registers {
            body.push(regions.declare(registers::FORWARD0, 1, FORWARD, "Screen/Unk1")?);
            body.push(regions.declare(registers::FORWARD1, 1, FORWARD, "Screen/Unk2")?);
        }
        Ok(())
    }

    fn power_up(&mut self, effects: &mut Effects) {
        if self.is_enabled() {
            return;
        }
        debug!("Display powered on");
        for id in &self.regions.body {
            effects.activate(*id);
        }
        self.shared.enabled.store(true, Ordering::Release);
    }

    fn power_down(&mut self, effects: &mut Effects) {
        debug!("Display powered off");
        self.fill_noise();
        for id in &self.regions.body {
            effects.deactivate(*id);
        }
        self.shared.registers.reset();
        self.shared.enabled.store(false, Ordering::Release);
    }

    fn write_mode(&mut self, value: u8) {
        let spec = self.shared.spec;
        let old = self.shared.registers.mode.store(value);
        if spec.flip_reverses_buffer && (old ^ value) & MODE_FLIP_H != 0 {
            for buffer in &self.shared.buffers {
                mirror_rows(&mut lock(buffer), spec.row_size, spec.visible_row_bytes);
            }
        }
    }
}

impl Peripheral for MatrixScreen {
    fn name(&self) -> &'static str {
        "Screen"
    }

    fn initialise(&mut self, regions: &mut RegionBinder<'_>) -> Result<(), ConfigError> {
        self.fill_noise();
        self.declare_body(regions)?;

        if self.shared.spec.power_register {
            debug!("  Mapping display power register at {:#X}", registers::POWER);
            self.regions.power =
                Some(regions.map(registers::POWER, 1, POWER, "Screen/Power")?);
        } else {
            for id in &self.regions.body {
                regions.activate(*id)?;
            }
            self.shared.enabled.store(true, Ordering::Release);
        }

        if self.options.background_decay {
            match DecayTicker::spawn("screen", self.shared.clone(), self.options.decay_interval) {
                Ok(ticker) => self.ticker = Some(ticker),
                Err(e) => warn!("Failed to start display decay thread, stepping on tick: {}", e),
            }
        }
        Ok(())
    }

    fn uninitialise(&mut self, regions: &mut RegionBinder<'_>) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
        for id in self.regions.body.drain(..).chain(self.regions.power.take()) {
            regions.deactivate(id);
        }
        self.shared.enabled.store(false, Ordering::Release);
    }

    /// A CPU reset reloads the controller registers. The power register,
    /// the buffers and the glass keep their state, so a powered display stays
    /// decoded across the reset.
    fn reset(&mut self) {
        self.shared.registers.reset();
    }

    fn tick(&mut self) {
        if self.ticker.is_none() {
            self.shared.step(self.clock.now_ms());
        }
    }

    fn frame(&mut self, draw_calls: &mut Vec<DrawCall>) {
        let columns = self.shared.spec.columns();
        let cells = self.intensities();
        let (icons, dots) = cells.split_at(columns);
        self.sprites.push_icons(icons, draw_calls);
        self.sprites.push_dots(dots, columns, draw_calls);
    }

    #[instrument(level = "trace", skip(self))]
    fn read(&mut self, tag: RegionTag, offset: u32) -> u8 {
        match tag {
            BUFFER | BUFFER_TAIL | BUFFER1_ALIAS => self
                .locate(tag, offset)
                .and_then(|(buffer, offset)| lock(buffer).get(offset).copied())
                .unwrap_or(IGNORE_READ),
            FORWARD => IGNORE_READ,
            _ => self
                .shared
                .registers
                .get(tag)
                .map_or(IGNORE_READ, AtomicSfr::load),
        }
    }

    #[instrument(level = "trace", skip(self, effects))]
    fn write(&mut self, tag: RegionTag, offset: u32, value: u8, effects: &mut Effects) {
        match tag {
            BUFFER | BUFFER_TAIL | BUFFER1_ALIAS => {
                if let Some((buffer, offset)) = self.locate(tag, offset) {
                    let mut buffer = lock(buffer);
                    if let Some(byte) = buffer.get_mut(offset) {
                        *byte = value;
                    }
                }
            }
            MODE => self.write_mode(value),
            POWER => {
                self.shared.registers.power.store(value);
                if value & POWER_ENABLE == 0 {
                    self.power_down(effects);
                } else {
                    self.power_up(effects);
                }
            }
            FORWARD => effects.write(FORWARD_TARGET, value),
            _ => {
                if let Some(sfr) = self.shared.registers.get(tag) {
                    sfr.store(value);
                }
            }
        }
    }

    fn as_screen(&self) -> Option<&dyn ScreenProvider> {
        Some(self)
    }
}

impl ScreenProvider for MatrixScreen {
    fn buffers(&self) -> Vec<Vec<u8>> {
        self.shared.buffers.iter().map(|b| lock(b).clone()).collect()
    }
}

impl Drop for MatrixScreen {
    fn drop(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}
