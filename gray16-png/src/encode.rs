// 16-bit greyscale PNG writer.
//
// Emits signature, IHDR, the zlib stream cut into IDAT chunks of at most
// `idat_len` bytes, and IEND, each with its CRC-32. The row filter is
// either fixed or cycles through all five types row by row, which is what
// round-trip fixtures want.

use alloc::vec::Vec;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::chunk::{PNG_SIG, TAG_IDAT, TAG_IEND, TAG_IHDR};
use crate::filter::{FilterType, paeth};
use crate::image::{BIT_DEPTH, COLOR_GREYSCALE, PixelBuffer, SAMPLE_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChoice {
    Fixed(FilterType),
    /// Row i uses FilterType::ALL[i % 5].
    Cycle,
}

impl FilterChoice {
    fn for_row(self, row: usize) -> FilterType {
        match self {
            FilterChoice::Fixed(f) => f,
            FilterChoice::Cycle => FilterType::ALL[row % FilterType::ALL.len()],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    pub filter: FilterChoice,
    /// Maximum IDAT payload length; 0 means a single chunk.
    pub idat_len: usize,
    /// zlib level, 0..=10.
    pub level: u8,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            filter: FilterChoice::Fixed(FilterType::None),
            idat_len: 0,
            level: 6,
        }
    }
}

impl Encoder {
    pub const fn new(filter: FilterChoice) -> Self {
        Self {
            filter,
            idat_len: 0,
            level: 6,
        }
    }

    pub const fn with_idat_len(mut self, idat_len: usize) -> Self {
        self.idat_len = idat_len;
        self
    }

    pub const fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn encode(&self, image: &PixelBuffer) -> Vec<u8> {
        let geometry = image.geometry();
        let filtered = self.filter_rows(image);
        let stream = compress_to_vec_zlib(&filtered, self.level);

        let mut out = Vec::with_capacity(stream.len() + 64);
        out.extend_from_slice(&PNG_SIG);

        let mut ihdr = [0u8; 13];
        ihdr[0..4].copy_from_slice(&geometry.width.to_be_bytes());
        ihdr[4..8].copy_from_slice(&geometry.height.to_be_bytes());
        ihdr[8] = BIT_DEPTH;
        ihdr[9] = COLOR_GREYSCALE;
        // compression, filter method, interlace all 0
        write_chunk(&mut out, &TAG_IHDR, &ihdr);

        if self.idat_len == 0 {
            write_chunk(&mut out, &TAG_IDAT, &stream);
        } else {
            for piece in stream.chunks(self.idat_len) {
                write_chunk(&mut out, &TAG_IDAT, piece);
            }
        }

        write_chunk(&mut out, &TAG_IEND, &[]);
        out
    }

    // filter byte + filtered row bytes, for every row
    fn filter_rows(&self, image: &PixelBuffer) -> Vec<u8> {
        let geometry = image.geometry();
        let row_bytes = geometry.row_bytes();
        let mut out = Vec::with_capacity(geometry.filtered_len());
        let mut previous = alloc::vec![0u8; row_bytes];
        let mut current = alloc::vec![0u8; row_bytes];

        for y in 0..geometry.height {
            for (pair, sample) in current
                .chunks_exact_mut(SAMPLE_BYTES)
                .zip(image.row(y))
            {
                pair.copy_from_slice(&sample.to_be_bytes());
            }
            let filter = self.filter.for_row(y as usize);
            out.push(filter as u8);
            for j in 0..row_bytes {
                let x = current[j];
                let a = if j >= SAMPLE_BYTES {
                    current[j - SAMPLE_BYTES]
                } else {
                    0
                };
                let b = previous[j];
                let c = if j >= SAMPLE_BYTES {
                    previous[j - SAMPLE_BYTES]
                } else {
                    0
                };
                let predicted = match filter {
                    FilterType::None => 0,
                    FilterType::Sub => a,
                    FilterType::Up => b,
                    FilterType::Average => ((a as u16 + b as u16) / 2) as u8,
                    FilterType::Paeth => paeth(a, b, c),
                };
                out.push(x.wrapping_sub(predicted));
            }
            core::mem::swap(&mut previous, &mut current);
        }
        out
    }
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);
    let crc = crc32_update(crc32_update(0xFFFF_FFFF, tag), payload) ^ 0xFFFF_FFFF;
    out.extend_from_slice(&crc.to_be_bytes());
}

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

fn crc32_update(mut crc: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        crc = CRC_TABLE[((crc ^ b as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

/// CRC-32 as used by PNG chunk trailers.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32_update(0xFFFF_FFFF, bytes) ^ 0xFFFF_FFFF
}
