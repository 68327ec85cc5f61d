//! Tile-based viewport and rendering cache for document viewers

pub mod settings;
pub mod tiles;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use settings::Settings;
