// Decoder error kinds. Every failure is local to one image; nothing here
// is fatal to the caller's process.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Missing or inconsistent chunk structure.
    #[error("malformed png: {0}")]
    MalformedPng(&'static str),

    /// The concatenated IDAT stream is corrupt or ends early.
    #[error("png: decompression failed: {0}")]
    Decompression(&'static str),

    #[error("png: unsupported filter type {filter} on row {row}")]
    UnsupportedFilterType { row: u32, filter: u8 },

    /// Only 16-bit, non-interlaced greyscale is decoded.
    #[error(
        "png: unsupported format (bit depth {bit_depth}, colour type {color_type}, interlace {interlace})"
    )]
    UnsupportedFormat {
        bit_depth: u8,
        color_type: u8,
        interlace: u8,
    },

    #[error("png: {width}x{height} exceeds the decode pixel budget")]
    ImageTooLarge { width: u32, height: u32 },
}
