// The single decode path: fetch PNG -> downscale if needed -> decode.
// Prefetch workers and the viewer's synchronous fallback both go through
// SlicePipeline, so a slot decoded twice decodes to the same pixels.

use std::sync::Arc;

use gray16_png::PixelBuffer;

use crate::error::Result;
use crate::formats::downscale::Downscaler;
use crate::kernel::{SliceHandle, SliceSource};

/// Where slice PNGs come from: the archive, or an in-memory map in tests.
pub trait PngFetcher: Send + Sync {
    fn fetch_png(&self, instance: &str) -> Result<Vec<u8>>;
}

pub struct SlicePipeline {
    fetcher: Arc<dyn PngFetcher>,
    downscaler: Option<Downscaler>,
}

impl SlicePipeline {
    pub fn new(fetcher: Arc<dyn PngFetcher>, downscaler: Option<Downscaler>) -> Self {
        Self {
            fetcher,
            downscaler,
        }
    }

    /// Decode PNG bytes that are already in hand.
    pub fn decode_png(&self, png: Vec<u8>) -> Result<PixelBuffer> {
        let png = match &self.downscaler {
            Some(downscaler) => downscaler.fit(png)?.png,
            None => png,
        };
        Ok(gray16_png::decode(&png)?)
    }
}

impl SliceSource for SlicePipeline {
    fn load(&self, handle: &SliceHandle) -> Result<PixelBuffer> {
        let png = self.fetcher.fetch_png(&handle.instance)?;
        let pixels = self.decode_png(png)?;
        log::debug!("slice: {} decoded at {}", handle, pixels.geometry());
        Ok(pixels)
    }
}
