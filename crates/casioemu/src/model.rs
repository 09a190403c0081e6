//! Model descriptor.
//!
//! A model is described by a JSON document produced by the model authoring
//! tooling:
//!
//! ```json
//! {
//!   "model_name": "fx-991CN X",
//!   "hardware_id": 4,
//!   "real_hardware": false,
//!   "ink_colour": { "r": 30, "g": 52, "b": 90 },
//!   "cursor_offset": 53760,
//!   "input_area_offset": 53888,
//!   "sprites": {
//!     "rsd_pixel": { "src": { "x": 0, "y": 0, "w": 3, "h": 3 }, "dest": { "x": 58, "y": 141 } }
//!   }
//! }
//! ```
//!
//! Sprite destinations carry only a position; their size is the source size.

use crate::error::ConfigError;
use crate::render::{Colour, Rect};
use casioemu_hw::HardwareId;
use casioemu_hw::specs::display::{DisplaySpec, PIXEL_SPRITE, display_spec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Ink colour used when a descriptor does not name one
pub const DEFAULT_INK: Colour = Colour::new(30, 52, 90);

/// Dot pitch of the built-in layout
const BUILTIN_DOT: i32 = 3;

/// Height reserved for the icon row of the built-in layout
const BUILTIN_ICON_ROW: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Position {
    x: i32,
    y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SpriteEntry {
    src: Rect,
    dest: Position,
}

/// Where a sprite lives on the interface sheet and where it goes on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SpriteEntry", into = "SpriteEntry")]
pub struct SpriteInfo {
    pub src: Rect,
    pub dest: Rect,
}

impl From<SpriteEntry> for SpriteInfo {
    fn from(entry: SpriteEntry) -> Self {
        Self {
            src: entry.src,
            dest: Rect::new(entry.dest.x, entry.dest.y, entry.src.w, entry.src.h),
        }
    }
}

impl From<SpriteInfo> for SpriteEntry {
    fn from(info: SpriteInfo) -> Self {
        Self {
            src: info.src,
            dest: Position {
                x: info.dest.x,
                y: info.dest.y,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub model_name: String,
    pub hardware_id: u8,
    /// Drop the emulation-only extras (RAM trailer, debug aliases)
    #[serde(default)]
    pub real_hardware: bool,
    #[serde(default = "default_ink")]
    pub ink_colour: Colour,
    #[serde(default)]
    pub sprites: BTreeMap<String, SpriteInfo>,
    /// Address of the byte holding the cursor position
    #[serde(default)]
    pub cursor_offset: Option<u32>,
    /// Address the cursor position is relative to
    #[serde(default)]
    pub input_area_offset: Option<u32>,
}

fn default_ink() -> Colour {
    DEFAULT_INK
}

impl ModelInfo {
    /// Load a descriptor from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ModelRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let model: ModelInfo = serde_json::from_str(text)?;
        model.hardware()?;
        Ok(model)
    }

    pub fn hardware(&self) -> Result<HardwareId, ConfigError> {
        HardwareId::try_from(self.hardware_id).map_err(ConfigError::UnknownHardware)
    }

    pub fn sprite(&self, name: &str) -> Option<SpriteInfo> {
        self.sprites.get(name).copied()
    }

    /// Plain layout for running without a descriptor: icons in a strip on top,
    /// dots on a 3 px grid below.
    pub fn builtin(hw: HardwareId) -> Self {
        let (columns, icons) = match display_spec(hw) {
            DisplaySpec::Matrix(spec) => (spec.columns() as i32, spec.icons),
            DisplaySpec::CommandPort(spec) => (spec.columns as i32, spec.icons),
        };

        let mut sprites = BTreeMap::new();
        sprites.insert(
            PIXEL_SPRITE.to_string(),
            SpriteInfo {
                src: Rect::new(0, 0, BUILTIN_DOT, BUILTIN_DOT),
                dest: Rect::new(0, BUILTIN_ICON_ROW, BUILTIN_DOT, BUILTIN_DOT),
            },
        );
        let pitch = (columns * BUILTIN_DOT / icons.len().max(1) as i32).max(1);
        for (i, icon) in icons.iter().enumerate() {
            let size = Rect::new(0, 0, (pitch - 2).max(1), BUILTIN_ICON_ROW - 4);
            sprites.insert(
                icon.name.to_string(),
                SpriteInfo {
                    src: size,
                    dest: Rect::new(i as i32 * pitch + 1, 2, size.w, size.h),
                },
            );
        }

        Self {
            model_name: format!("{} (built-in)", hw.name()),
            hardware_id: hw as u8,
            real_hardware: false,
            ink_colour: DEFAULT_INK,
            sprites,
            cursor_offset: None,
            input_area_offset: None,
        }
    }

    /// Size of the area covered by every sprite destination
    pub fn canvas_size(&self, rows: usize, columns: usize) -> (u32, u32) {
        let mut width = 0;
        let mut height = 0;
        for sprite in self.sprites.values() {
            width = width.max(sprite.dest.x + sprite.dest.w);
            height = height.max(sprite.dest.y + sprite.dest.h);
        }
        if let Some(pixel) = self.sprite(PIXEL_SPRITE) {
            width = width.max(pixel.dest.x + columns as i32 * pixel.src.w);
            height = height.max(pixel.dest.y + rows as i32 * pixel.src.h);
        }
        (width.max(1) as u32, height.max(1) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let model = ModelInfo::from_json(
            r#"{
                "model_name": "fx-991CN X",
                "hardware_id": 4,
                "ink_colour": { "r": 1, "g": 2, "b": 3 },
                "cursor_offset": 53760,
                "sprites": {
                    "rsd_pixel": { "src": { "x": 10, "y": 20, "w": 3, "h": 4 }, "dest": { "x": 58, "y": 141 } }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(model.hardware().unwrap(), HardwareId::ClassWiz);
        assert!(!model.real_hardware);
        assert_eq!(model.ink_colour, Colour::new(1, 2, 3));
        assert_eq!(model.cursor_offset, Some(0xD200));
        assert_eq!(model.input_area_offset, None);
        let pixel = model.sprite("rsd_pixel").unwrap();
        assert_eq!(pixel.dest, Rect::new(58, 141, 3, 4));
    }

    #[test]
    fn test_unknown_hardware_is_rejected() {
        let err = ModelInfo::from_json(r#"{ "hardware_id": 2 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHardware(2)));
    }

    #[test]
    fn test_malformed_descriptor() {
        let err = ModelInfo::from_json("{ hardware_id: ").unwrap_err();
        assert!(matches!(err, ConfigError::ModelParse(_)));
    }

    #[test]
    fn test_builtin_has_every_icon() {
        for hw in HardwareId::ALL {
            let model = ModelInfo::builtin(hw);
            assert_eq!(model.hardware().unwrap(), hw);
            assert!(model.sprite(PIXEL_SPRITE).is_some());
            let icons = match display_spec(hw) {
                DisplaySpec::Matrix(spec) => spec.icons,
                DisplaySpec::CommandPort(spec) => spec.icons,
            };
            for icon in icons {
                assert!(model.sprite(icon.name).is_some(), "{} lacks {}", hw, icon.name);
            }
        }
    }
}
