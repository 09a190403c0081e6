//! Configuration errors.
//!
//! Anything in here means the emulated address map or model description is
//! inconsistent; the emulator refuses to start rather than run with it.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "region {label} ({base:#X}+{size:#X}) overlaps active region {existing} at {address:#X}"
    )]
    RegionOverlap {
        label: &'static str,
        base: u32,
        size: u32,
        existing: &'static str,
        address: u32,
    },

    #[error("region {label} ({base:#X}+{size:#X}) is outside the {space:#X}-byte address space")]
    RegionOutOfRange {
        label: &'static str,
        base: u32,
        size: u32,
        space: u32,
    },

    #[error("no model descriptor or hardware id given")]
    NoModel,

    #[error("unknown hardware id {0}")]
    UnknownHardware(u8),

    #[error("model descriptor has no sprite named {0:?}")]
    MissingSprite(String),

    #[error("failed to read model descriptor {path:?}: {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model descriptor: {0}")]
    ModelParse(#[from] serde_json::Error),
}
