//! Interactive stack viewer.
//!
//! Holds the view state for one series and renders the current slice
//! through the window/level transform into an RGBA raster. Slices come
//! from the shared cache the prefetch workers fill; a slice that has not
//! arrived yet is loaded synchronously through the same `SliceSource`
//! the workers use and written back into the cache.
//!
//! Render cycle: `Idle -> Rendering -> Idle`, entered on `open`, on
//! every applied `adjust` and on pointer input that produces one.

use std::io::{self, Write};
use std::sync::Arc;

use gray16_png::PixelBuffer;

use super::Redraw;
use crate::config::DisplayConfig;
use crate::error::{Error, Result};
use crate::input::{Adjustment, PointerEvent, PointerMapper};
use crate::kernel::{SliceCache, SliceHandle, SliceSource, display_order};
use crate::ui::{Overlay, Raster, Window, info_line};

const FIRST_SLICE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerState {
    pub current_slice: u32,
    pub window_center: i32,
    pub window_width: i32,
    pub pan_x: i32,
    pub pan_y: i32,
    /// Accumulated but not applied when rendering.
    pub zoom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Rendering,
}

pub struct StackViewer {
    state: ViewerState,
    render: RenderState,
    handles: Vec<SliceHandle>,
    cache: Arc<SliceCache>,
    source: Arc<dyn SliceSource>,
    pointer: PointerMapper,
    // sized from the first slice rendered
    raster: Option<Raster>,
    // rebuilt only when the window changes
    lut: Option<(Window, Vec<u8>)>,
    offset: i32,
    background: [u8; 3],
    overlay: bool,
    title: Option<String>,
}

impl StackViewer {
    pub fn new(
        handles: &[SliceHandle],
        cache: Arc<SliceCache>,
        source: Arc<dyn SliceSource>,
        display: &DisplayConfig,
    ) -> Self {
        Self {
            state: ViewerState {
                current_slice: FIRST_SLICE,
                window_center: display.window_center,
                window_width: display.window_width.max(1),
                pan_x: 0,
                pan_y: 0,
                zoom: 1.0,
            },
            render: RenderState::Idle,
            handles: display_order(handles),
            cache,
            source,
            pointer: PointerMapper::new(),
            raster: None,
            lut: None,
            offset: display.offset,
            background: display.background,
            overlay: display.overlay,
            title: None,
        }
    }

    /// Title line drawn at the top of every frame (patient / study).
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn render_state(&self) -> RenderState {
        self.render
    }

    pub fn raster(&self) -> Option<&Raster> {
        self.raster.as_ref()
    }

    pub fn cache(&self) -> &Arc<SliceCache> {
        &self.cache
    }

    /// Upper bound for navigation: the highest slot loaded so far.
    pub fn last_slice(&self) -> u32 {
        self.cache.highest_loaded().unwrap_or(FIRST_SLICE)
    }

    /// Show the first slice, loading it synchronously if the workers
    /// have not delivered it yet. Without it there is nothing to size
    /// the viewport from, so a failure here is returned.
    pub fn open(&mut self) -> Result<()> {
        self.state.current_slice = FIRST_SLICE;
        self.slice(FIRST_SLICE)?;
        self.render();
        Ok(())
    }

    /// Apply one set of deltas and re-render.
    ///
    /// If the slice delta would leave `[1, last_slice]` the whole call is
    /// ignored, window and pan deltas included.
    pub fn adjust(&mut self, adj: Adjustment) -> Redraw {
        if adj == Adjustment::default() {
            return Redraw::None;
        }
        let target = i64::from(self.state.current_slice) + i64::from(adj.slice);
        if target < i64::from(FIRST_SLICE) || target > i64::from(self.last_slice()) {
            log::debug!(
                "viewer: slice {} outside 1..={}, ignored",
                target,
                self.last_slice()
            );
            return Redraw::None;
        }

        self.state.current_slice = target as u32;
        self.state.window_center = self.state.window_center.saturating_add(adj.center);
        self.state.window_width = self.state.window_width.saturating_add(adj.width).max(1);
        self.state.pan_x = self.state.pan_x.saturating_add(adj.pan_x);
        self.state.pan_y = self.state.pan_y.saturating_add(adj.pan_y);
        if adj.zoom != 0.0 {
            self.state.zoom += adj.zoom;
            log::debug!("viewer: zoom {:.2} accepted, not applied", self.state.zoom);
        }
        self.render()
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Redraw {
        match self.pointer.map_event(event) {
            Some(adj) => self.adjust(adj),
            None => Redraw::None,
        }
    }

    /// Current frame as binary PPM.
    pub fn write_frame<W: Write>(&self, out: W) -> Result<()> {
        let raster = self
            .raster
            .as_ref()
            .ok_or_else(|| Error::Io(io::Error::other("no frame rendered yet")))?;
        raster.write_ppm(out)?;
        Ok(())
    }

    fn render(&mut self) -> Redraw {
        if self.render == RenderState::Rendering {
            log::warn!("viewer: render already in progress, request dropped");
            return Redraw::None;
        }
        self.render = RenderState::Rendering;
        let outcome = self.paint();
        self.render = RenderState::Idle;
        outcome
    }

    fn paint(&mut self) -> Redraw {
        let slot = self.state.current_slice;
        let pixels = match self.slice(slot) {
            Ok(pixels) => pixels,
            Err(e) => {
                log::warn!("viewer: slot {} unavailable, keeping last frame: {}", slot, e);
                return Redraw::Stale;
            }
        };

        let window = Window::new(
            self.state.window_center,
            self.state.window_width,
            self.offset,
        );
        if self.lut.as_ref().is_none_or(|(cached, _)| *cached != window) {
            self.lut = Some((window, window.lut()));
        }
        let lut = self.lut.as_ref().map(|(_, lut)| lut.as_slice()).unwrap_or_default();

        let raster = self
            .raster
            .get_or_insert_with(|| Raster::new(pixels.width(), pixels.height()));
        raster.clear(self.background);
        raster.blit(&pixels, lut, self.state.pan_x, self.state.pan_y);

        if self.overlay {
            let progress = self.cache.progress();
            Overlay {
                title: self.title.clone(),
                info: info_line(slot, window.center(), window.width()),
                status: (progress.loaded < progress.total).then(|| progress.to_string()),
            }
            .draw(raster);
        }
        Redraw::Full
    }

    // cache first, then the synchronous fallback through the shared source
    fn slice(&self, slot: u32) -> Result<Arc<PixelBuffer>> {
        if let Some(pixels) = self.cache.get(slot) {
            return Ok(pixels);
        }
        let handle = self
            .handles
            .binary_search_by_key(&slot, |h| h.slot)
            .map(|i| &self.handles[i])
            .map_err(|_| Error::Fetch {
                url: format!("slot {}", slot),
                reason: "not part of this series".into(),
            })?;

        log::info!("viewer: {} not prefetched yet, loading now", handle);
        match self.source.load(handle) {
            Ok(pixels) => Ok(self.cache.insert(slot, pixels)),
            Err(e) => {
                self.cache.mark_failed(slot, e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerButton, PointerEvent};
    use gray16_png::ImageGeometry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // 4x3 slices filled with 1040 + 20*slot; slot 5 always fails
    struct Flat {
        loads: AtomicUsize,
    }

    impl Flat {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
            })
        }
    }

    fn flat(slot: u32) -> PixelBuffer {
        PixelBuffer::new(ImageGeometry::new(4, 3), vec![1040 + 20 * slot as u16; 12]).unwrap()
    }

    impl SliceSource for Flat {
        fn load(&self, handle: &SliceHandle) -> Result<PixelBuffer> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if handle.slot == 5 {
                return Err(Error::Fetch {
                    url: handle.instance.clone(),
                    reason: "500 Internal Server Error".into(),
                });
            }
            Ok(flat(handle.slot))
        }
    }

    fn handles(n: u32) -> Vec<SliceHandle> {
        (1..=n).rev().map(|s| SliceHandle::new(format!("inst-{s}"), s)).collect()
    }

    fn viewer(n: u32) -> (StackViewer, Arc<Flat>) {
        let source = Flat::new();
        let display = DisplayConfig {
            overlay: false,
            background: [7, 7, 7],
            ..DisplayConfig::default()
        };
        let cache = Arc::new(SliceCache::new(n as usize));
        let v = StackViewer::new(&handles(n), cache, source.clone(), &display);
        (v, source)
    }

    fn grey(v: &StackViewer, x: u32, y: u32) -> u8 {
        v.raster().unwrap().pixel(x, y).unwrap()[0]
    }

    #[test]
    fn open_renders_first_slice_through_fallback() {
        let (mut v, source) = viewer(3);
        v.open().unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert!(v.cache().is_ready(1));
        assert_eq!(v.render_state(), RenderState::Idle);
        // slot 1 -> 1060, the default window's midpoint
        assert_eq!(grey(&v, 0, 0), 128);
        assert_eq!(v.raster().unwrap().width(), 4);
    }

    #[test]
    fn stepping_below_first_slice_is_a_noop() {
        let (mut v, _) = viewer(3);
        v.open().unwrap();
        let before = v.state();
        let adj = Adjustment {
            slice: -1,
            center: 100,
            ..Adjustment::default()
        };
        assert_eq!(v.adjust(adj), Redraw::None);
        assert_eq!(v.state(), before);
    }

    #[test]
    fn navigation_is_bounded_by_highest_loaded_slot() {
        let (mut v, source) = viewer(4);
        v.open().unwrap();
        // only slot 1 loaded
        assert_eq!(v.adjust(Adjustment::slice(1)), Redraw::None);

        v.cache().insert(2, flat(2));
        assert_eq!(v.adjust(Adjustment::slice(1)), Redraw::Full);
        assert_eq!(v.state().current_slice, 2);
        // served from the cache, no extra load
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        // 1080 is past the default window
        assert_eq!(grey(&v, 0, 0), 255);
    }

    #[test]
    fn missing_slot_below_the_bound_loads_synchronously() {
        let (mut v, source) = viewer(4);
        v.open().unwrap();
        v.cache().insert(3, flat(3));
        assert_eq!(v.adjust(Adjustment::slice(1)), Redraw::Full);
        assert_eq!(v.state().current_slice, 2);
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert!(v.cache().is_ready(2));
    }

    #[test]
    fn failed_slot_keeps_the_last_frame() {
        let (mut v, _) = viewer(6);
        v.open().unwrap();
        v.cache().insert(6, flat(6));
        v.adjust(Adjustment::slice(4)); // to 5
        assert_eq!(v.state().current_slice, 5);
        assert_eq!(grey(&v, 0, 0), 128);
        assert!(v.cache().failure(5).is_some());
        assert_eq!(v.adjust(Adjustment::window(1, 0)), Redraw::Stale);
    }

    #[test]
    fn window_and_pan() {
        let (mut v, _) = viewer(1);
        v.open().unwrap();

        // center 20 -> window 1000..1080, 1060 maps to 191.25
        assert_eq!(v.adjust(Adjustment::window(-20, 0)), Redraw::Full);
        assert_eq!(grey(&v, 0, 0), 191);

        v.adjust(Adjustment::pan(2, 1));
        assert_eq!(v.raster().unwrap().pixel(1, 0), Some([7, 7, 7, 255]));
        assert_eq!(grey(&v, 2, 1), 191);

        v.adjust(Adjustment::window(0, -500));
        assert_eq!(v.state().window_width, 1);
    }

    #[test]
    fn zoom_is_accepted_and_ignored() {
        let (mut v, _) = viewer(1);
        v.open().unwrap();
        let before = v.raster().unwrap().rgba().to_vec();
        assert_eq!(v.adjust(Adjustment::zoom(0.5)), Redraw::Full);
        assert_eq!(v.state().zoom, 1.5);
        assert_eq!(v.raster().unwrap().rgba(), &before[..]);
    }

    #[test]
    fn pointer_drag_pans() {
        let (mut v, _) = viewer(1);
        v.open().unwrap();
        v.handle_pointer(PointerEvent::Down {
            button: PointerButton::Primary,
            x: 5,
            y: 5,
        });
        assert_eq!(v.handle_pointer(PointerEvent::Move { x: 6, y: 5 }), Redraw::Full);
        assert_eq!(v.state().pan_x, 1);
        assert_eq!(v.handle_pointer(PointerEvent::Wheel { delta: 1 }), Redraw::None);
    }

    #[test]
    fn frame_as_ppm() {
        let (mut v, _) = viewer(1);
        let mut out = Vec::new();
        assert!(v.write_frame(&mut out).is_err());
        v.open().unwrap();
        v.write_frame(&mut out).unwrap();
        assert!(out.starts_with(b"P6\n4 3\n255\n"));
        assert_eq!(out.len(), 11 + 4 * 3 * 3);
    }

    #[test]
    fn overlay_reports_progress() {
        let source = Flat::new();
        let cache = Arc::new(SliceCache::new(3));
        let mut v = StackViewer::new(&handles(3), cache, source, &DisplayConfig::default())
            .with_title("DOE^JANE");
        v.open().unwrap();
        // first slice is only 4x3; the overlay must clip, not panic
        assert!(v.raster().is_some());
    }
}
