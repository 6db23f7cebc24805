// Image geometry and the flat sample buffer a decode produces.

use alloc::vec::Vec;

use crate::DecodeError;

/// Bytes per greyscale sample; also the Sub/Average/Paeth byte stride.
pub const SAMPLE_BYTES: usize = 2;

/// The only bit depth the archive emits.
pub const BIT_DEPTH: u8 = 16;

/// IHDR colour type for single-channel greyscale.
pub const COLOR_GREYSCALE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    pub width: u32,
    pub height: u32,
}

impl ImageGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    // reconstructed bytes per row, filter byte excluded
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * SAMPLE_BYTES
    }

    // one filter byte plus the row's sample bytes
    pub const fn stride(&self) -> usize {
        1 + self.row_bytes()
    }

    /// Length of the inflated, still-filtered scanline stream.
    pub const fn filtered_len(&self) -> usize {
        self.height as usize * self.stride()
    }

    /// Geometry after an integer down-scale, never below 1x1.
    pub fn scaled_down(&self, divisor: u32) -> Self {
        let divisor = divisor.max(1);
        Self {
            width: (self.width / divisor).max(1),
            height: (self.height / divisor).max(1),
        }
    }
}

impl core::fmt::Display for ImageGeometry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Row-major 16-bit samples, top-to-bottom, left-to-right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    geometry: ImageGeometry,
    samples: Vec<u16>,
}

impl PixelBuffer {
    pub fn new(geometry: ImageGeometry, samples: Vec<u16>) -> Result<Self, DecodeError> {
        if samples.len() != geometry.pixel_count() {
            return Err(DecodeError::MalformedPng(
                "sample count does not match geometry",
            ));
        }
        Ok(Self { geometry, samples })
    }

    pub fn geometry(&self) -> ImageGeometry {
        self.geometry
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn row(&self, y: u32) -> &[u16] {
        let w = self.geometry.width as usize;
        let start = y as usize * w;
        &self.samples[start..start + w]
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.geometry.width || y >= self.geometry.height {
            return None;
        }
        self.samples
            .get(y as usize * self.geometry.width as usize + x as usize)
            .copied()
    }
}
