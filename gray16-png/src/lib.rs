// gray16-png: minimal no_std decoder for 16-bit greyscale PNG slices.
// chunk:   IHDR/IDAT/IEND locator, concatenates IDAT payloads in file order
// inflate: streaming zlib adapter over miniz_oxide with a 32KB window
// filter:  None/Sub/Up/Average/Paeth reconstruction, one previous row kept
// image:   ImageGeometry and the row-major PixelBuffer
// encode:  PNG writer (fixed or cycling filters, split IDAT, CRC-32)
// error:   DecodeError

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod chunk;
pub mod encode;
pub mod error;
pub mod filter;
pub mod image;
pub mod inflate;

use alloc::vec;
use alloc::vec::Vec;

pub use chunk::{ChunkMap, PngChunk};
pub use encode::{Encoder, FilterChoice};
pub use error::DecodeError;
pub use filter::FilterType;
pub use image::{ImageGeometry, PixelBuffer};

/// Largest image decoded in one piece; anything bigger should have been
/// downscaled before it got here.
pub const MAX_PIXELS: usize = 8192 * 8192;

/// Geometry from IHDR alone; IDAT and IEND need not be present.
pub fn read_geometry(data: &[u8]) -> Result<ImageGeometry, DecodeError> {
    chunk::locate_header(data).map(|(_, geometry)| geometry)
}

/// Decode a 16-bit greyscale PNG into row-major samples.
///
/// Rows are inflated and defiltered one at a time; only the previous
/// row's reconstructed bytes are held besides the output buffer.
pub fn decode(data: &[u8]) -> Result<PixelBuffer, DecodeError> {
    let map = chunk::locate(data)?;
    let geometry = map.geometry;
    if geometry.pixel_count() > MAX_PIXELS {
        return Err(DecodeError::ImageTooLarge {
            width: geometry.width,
            height: geometry.height,
        });
    }

    let payload = map.compressed_payload();
    let mut inflater = inflate::Inflater::new(&payload);
    let mut defilter = filter::Defilter::new(geometry);
    let mut scanline = vec![0u8; geometry.stride()];
    let mut samples: Vec<u16> = Vec::with_capacity(geometry.pixel_count());

    for _ in 0..geometry.height {
        inflater.read_exact(&mut scanline)?;
        let row = defilter.reconstruct(scanline[0], &scanline[1..])?;
        filter::pack_samples(row, &mut samples);
    }

    // a stream cut short after the last row, or one whose checksum does
    // not match, is still a broken stream
    let extra = inflater.drain()?;
    if extra > 0 {
        log::warn!("png: {} trailing bytes after {} rows", extra, geometry.height);
    }

    log::debug!(
        "png: decoded {} from {} compressed bytes",
        geometry,
        payload.len()
    );
    PixelBuffer::new(geometry, samples)
}
