// Rendering for the stack viewer: window/level LUT, RGBA raster with
// pan clipping, embedded-graphics text overlay. Region-based layout.

pub mod overlay;
pub mod raster;
pub mod window;
mod widget;

pub use overlay::{Overlay, info_line};
pub use raster::Raster;
pub use widget::{Alignment, Region};
pub use window::{DEFAULT_OFFSET, Window};
