pub mod args;
pub mod core;
pub mod display;
pub mod error;
pub mod memory;
pub mod mmio;
pub mod mmu;
pub mod model;
pub mod noise;
pub mod render;
pub mod scheduler;
pub mod sfr;

// Re-export commonly used types
pub use args::Args;
pub use core::{EmulatorConfig, EmulatorCore};
pub use error::ConfigError;
pub use mmio::ScanSource;
pub use mmu::{Mmu, RegionDescriptor};
pub use model::ModelInfo;
pub use render::{Colour, DrawCall, Rect};
