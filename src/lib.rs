// stackview: 16-bit greyscale slice stacks from an image archive.
//
// Fetch -> (downscale) -> decode in prefetch workers, cache by slot,
// render through window/level with pan and slice navigation.

pub mod apps;
pub mod config;
pub mod drivers;
pub mod error;
pub mod formats;
pub mod input;
pub mod kernel;
pub mod ui;

pub use error::{Error, Result};
