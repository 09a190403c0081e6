//! Draw calls handed to the host renderer.
//!
//! The core never touches a window. Each frame a display emits one
//! [`DrawCall`] per icon and per dot: which sprite to copy, where to put it,
//! and how opaque and what colour to make it.

use crate::error::ConfigError;
use crate::model::{ModelInfo, SpriteInfo};
use casioemu_hw::specs::display::{IconBit, PIXEL_SPRITE};
use serde::{Deserialize, Serialize};

/// Nominal full-ink intensity; anything above is drawn overdriven
pub const FULL_INK: f32 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed 0x00RRGGBB
    pub fn to_rgb(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

/// One sprite copy with opacity and colour modulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub sprite: &'static str,
    pub src: Rect,
    pub dest: Rect,
    pub alpha: u8,
    pub colour: Colour,
}

/// Opacity and colour for a cell of the given intensity.
///
/// Overdriven cells are fully opaque and shift away from the ink colour,
/// red fastest, blue slowest.
pub fn shade(intensity: f32, ink: Colour) -> (u8, Colour) {
    if intensity > FULL_INK {
        let excess = intensity - FULL_INK;
        let channel = |c: u8, k: f32| (c as i32 - (excess * k) as i32).max(0) as u8;
        (
            255,
            Colour::new(channel(ink.r, 1.0), channel(ink.g, 0.8), channel(ink.b, 0.1)),
        )
    } else {
        (intensity.clamp(0.0, FULL_INK) as u8, ink)
    }
}

/// Sprites a display draws with, resolved from the model descriptor
#[derive(Debug, Clone)]
pub struct SpriteSet {
    pub ink: Colour,
    pub pixel: SpriteInfo,
    /// One entry per icon bit; `None` when the descriptor has no such sprite
    pub icons: Vec<Option<(&'static str, SpriteInfo)>>,
}

impl SpriteSet {
    pub fn resolve(model: &ModelInfo, icons: &[IconBit]) -> Result<Self, ConfigError> {
        let pixel = model
            .sprite(PIXEL_SPRITE)
            .ok_or_else(|| ConfigError::MissingSprite(PIXEL_SPRITE.to_string()))?;
        Ok(Self {
            ink: model.ink_colour,
            pixel,
            icons: icons
                .iter()
                .map(|icon| model.sprite(icon.name).map(|s| (icon.name, s)))
                .collect(),
        })
    }

    /// Icon calls for the intensities in `cells` (one per icon, in table order).
    /// Icons are never overdriven.
    pub fn push_icons(&self, cells: &[f32], draw_calls: &mut Vec<DrawCall>) {
        for (icon, intensity) in self.icons.iter().zip(cells) {
            let Some((name, sprite)) = icon else {
                continue;
            };
            draw_calls.push(DrawCall {
                sprite: *name,
                src: sprite.src,
                dest: sprite.dest,
                alpha: intensity.clamp(0.0, FULL_INK) as u8,
                colour: self.ink,
            });
        }
    }

    /// Dot calls for a `columns` wide dot map, first row at the pixel sprite
    /// destination
    pub fn push_dots(&self, dots: &[f32], columns: usize, draw_calls: &mut Vec<DrawCall>) {
        let src = self.pixel.src;
        let origin = self.pixel.dest;
        for (index, &intensity) in dots.iter().enumerate() {
            let (row, col) = ((index / columns) as i32, (index % columns) as i32);
            let (alpha, colour) = shade(intensity, self.ink);
            draw_calls.push(DrawCall {
                sprite: PIXEL_SPRITE,
                src,
                dest: Rect::new(
                    origin.x + col * src.w,
                    origin.y + row * src.h,
                    origin.w,
                    origin.h,
                ),
                alpha,
                colour,
            });
        }
    }
}
