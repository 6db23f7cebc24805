// Viewer application layer.
//
// `StackViewer` is the only app: it owns the view state for one series
// and turns adjustments into frames. Every state change reports what
// happened to the frame as a `Redraw`.

pub mod viewer;

pub use viewer::{RenderState, StackViewer, ViewerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// Nothing changed; the last frame is still current.
    None,
    /// The requested slice could not be loaded; the last frame stays up.
    Stale,
    Full,
}

impl Redraw {
    pub fn is_fresh(self) -> bool {
        matches!(self, Redraw::Full)
    }
}
