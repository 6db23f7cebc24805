// Shared slice cache: the only state workers and the render path share.
//
// Writes are single-key upserts keyed by slot; there is no cross-key
// coordination and no global lock. If a worker and the render fallback
// both decode a slot, whichever writes last wins (same input, same pixels).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use dashmap::DashMap;
use gray16_png::PixelBuffer;

#[derive(Debug, Clone)]
pub enum SlotState {
    Ready(Arc<PixelBuffer>),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loading: {}/{}", self.loaded, self.total)
    }
}

pub struct SliceCache {
    slots: DashMap<u32, SlotState>,
    // 0 = nothing loaded yet; slots are 1-based
    highest: AtomicU32,
    loaded: AtomicUsize,
    total: usize,
}

impl SliceCache {
    pub fn new(total: usize) -> Self {
        Self {
            slots: DashMap::with_capacity(total),
            highest: AtomicU32::new(0),
            loaded: AtomicUsize::new(0),
            total,
        }
    }

    /// Store decoded pixels for `slot`, replacing whatever was there.
    pub fn insert(&self, slot: u32, pixels: PixelBuffer) -> Arc<PixelBuffer> {
        let pixels = Arc::new(pixels);
        let previous = self.slots.insert(slot, SlotState::Ready(pixels.clone()));
        if !matches!(previous, Some(SlotState::Ready(_))) {
            self.loaded.fetch_add(1, Ordering::Relaxed);
        }
        self.highest.fetch_max(slot, Ordering::AcqRel);
        pixels
    }

    /// Record a failure; never clobbers pixels that already arrived.
    pub fn mark_failed(&self, slot: u32, reason: impl Into<String>) {
        let reason = reason.into();
        self.slots
            .entry(slot)
            .and_modify(|state| {
                if let SlotState::Failed(old) = state {
                    *old = reason.clone();
                }
            })
            .or_insert_with(|| SlotState::Failed(reason.clone()));
    }

    pub fn get(&self, slot: u32) -> Option<Arc<PixelBuffer>> {
        match self.slots.get(&slot)?.value() {
            SlotState::Ready(pixels) => Some(pixels.clone()),
            SlotState::Failed(_) => None,
        }
    }

    pub fn failure(&self, slot: u32) -> Option<String> {
        match self.slots.get(&slot)?.value() {
            SlotState::Failed(reason) => Some(reason.clone()),
            SlotState::Ready(_) => None,
        }
    }

    pub fn is_ready(&self, slot: u32) -> bool {
        self.get(slot).is_some()
    }

    /// Highest slot with pixels, if any.
    pub fn highest_loaded(&self) -> Option<u32> {
        match self.highest.load(Ordering::Acquire) {
            0 => None,
            slot => Some(slot),
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            loaded: self.loaded.load(Ordering::Relaxed),
            total: self.total,
        }
    }
}
