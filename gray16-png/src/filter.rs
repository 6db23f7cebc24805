// Scanline defilter engine.
//
// Every row is reconstructed in place from its filtered bytes and the
// previous row's reconstructed bytes; nothing older than one row is kept.
// Reference bytes for byte j of row i:
//   A = row i,   byte j-2   (same sample column, one sample left)
//   B = row i-1, byte j
//   C = row i-1, byte j-2
// A and C are 0 for the first sample column, B and C are 0 on row 0.
// All arithmetic is mod 256.

use alloc::vec;
use alloc::vec::Vec;

use crate::DecodeError;
use crate::image::{ImageGeometry, SAMPLE_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl FilterType {
    pub const ALL: [FilterType; 5] = [
        FilterType::None,
        FilterType::Sub,
        FilterType::Up,
        FilterType::Average,
        FilterType::Paeth,
    ];
}

impl TryFrom<u8> for FilterType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(FilterType::None),
            1 => Ok(FilterType::Sub),
            2 => Ok(FilterType::Up),
            3 => Ok(FilterType::Average),
            4 => Ok(FilterType::Paeth),
            other => Err(other),
        }
    }
}

/// Paeth predictor; ties go to A, then B, then C.
#[inline]
pub fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let a = a as i16;
    let b = b as i16;
    let c = c as i16;
    let p = a + b - c;
    let pa = (p - a).unsigned_abs();
    let pb = (p - b).unsigned_abs();
    let pc = (p - c).unsigned_abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

/// Reconstruct one row in place. `previous_row` is the reconstructed row
/// above (all zeros for row 0) and must be as long as `row`.
pub fn reconstruct_row(filter: FilterType, row: &mut [u8], previous_row: &[u8]) {
    debug_assert_eq!(row.len(), previous_row.len());
    let len = row.len();
    match filter {
        FilterType::None => {}
        FilterType::Sub => {
            for j in SAMPLE_BYTES..len {
                row[j] = row[j].wrapping_add(row[j - SAMPLE_BYTES]);
            }
        }
        FilterType::Up => {
            for j in 0..len {
                row[j] = row[j].wrapping_add(previous_row[j]);
            }
        }
        FilterType::Average => {
            for j in 0..len {
                let a = if j >= SAMPLE_BYTES {
                    row[j - SAMPLE_BYTES] as u16
                } else {
                    0
                };
                let b = previous_row[j] as u16;
                row[j] = row[j].wrapping_add(((a + b) / 2) as u8);
            }
        }
        FilterType::Paeth => {
            for j in 0..len {
                let (a, c) = if j >= SAMPLE_BYTES {
                    (row[j - SAMPLE_BYTES], previous_row[j - SAMPLE_BYTES])
                } else {
                    (0, 0)
                };
                row[j] = row[j].wrapping_add(paeth(a, previous_row[j], c));
            }
        }
    }
}

/// Pair reconstructed bytes (high, low) into big-endian samples.
pub fn pack_samples(row: &[u8], out: &mut Vec<u16>) {
    out.extend(
        row.chunks_exact(SAMPLE_BYTES)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
    );
}

/// Per-decode scanline state: the row being rebuilt and the one above it.
pub struct Defilter {
    previous: Vec<u8>,
    current: Vec<u8>,
    row: u32,
}

impl Defilter {
    pub fn new(geometry: ImageGeometry) -> Self {
        let row_bytes = geometry.row_bytes();
        Self {
            previous: vec![0u8; row_bytes],
            current: vec![0u8; row_bytes],
            row: 0,
        }
    }

    /// Index of the next row to be reconstructed.
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Reconstruct the next row from its filter byte and filtered bytes.
    /// The returned slice stays valid until the next call.
    pub fn reconstruct(&mut self, filter_byte: u8, filtered: &[u8]) -> Result<&[u8], DecodeError> {
        let filter = FilterType::try_from(filter_byte).map_err(|filter| {
            DecodeError::UnsupportedFilterType {
                row: self.row,
                filter,
            }
        })?;
        if filtered.len() != self.current.len() {
            return Err(DecodeError::MalformedPng("scanline length mismatch"));
        }

        self.current.copy_from_slice(filtered);
        reconstruct_row(filter, &mut self.current, &self.previous);

        // the row just built becomes the reference for the next one
        core::mem::swap(&mut self.previous, &mut self.current);
        self.row += 1;
        Ok(&self.previous)
    }
}
