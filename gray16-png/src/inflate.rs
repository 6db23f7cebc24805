// Inflate adapter over miniz_oxide's streaming core.
//
// The whole compressed payload is in memory, so input is handed over in one
// piece; output goes through a 32KB wrapping window (the DEFLATE dictionary
// size) and is pulled out row by row with read_exact. The full filtered
// stream is never materialised unless `inflate` is asked for it.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use miniz_oxide::inflate::TINFLStatus;
use miniz_oxide::inflate::core::{DecompressorOxide, decompress, inflate_flags};

use crate::DecodeError;

const WINDOW: usize = 32 * 1024;

// consecutive pumps that neither consume nor produce before giving up
const MAX_IDLE_PUMPS: u32 = 4;

pub struct Inflater<'a> {
    input: &'a [u8],
    in_pos: usize,
    decomp: Box<DecompressorOxide>,
    window: Vec<u8>,
    // cumulative positions; masked into the window on use
    write_pos: usize,
    read_pos: usize,
    avail: usize,
    done: bool,
    idle: u32,
}

impl<'a> Inflater<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            in_pos: 0,
            decomp: Box::default(),
            window: vec![0u8; WINDOW],
            write_pos: 0,
            read_pos: 0,
            avail: 0,
            done: false,
            idle: 0,
        }
    }

    /// Total bytes produced so far, read or not.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn pump(&mut self) -> Result<(), DecodeError> {
        if self.done {
            return Ok(());
        }

        let flags = inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER
            | inflate_flags::TINFL_FLAG_COMPUTE_ADLER32;
        let out_pos = self.write_pos & (WINDOW - 1);
        let (status, consumed, produced) = decompress(
            &mut *self.decomp,
            &self.input[self.in_pos..],
            &mut self.window,
            out_pos,
            flags,
        );

        self.in_pos += consumed;
        self.write_pos += produced;
        self.avail += produced;

        match status {
            TINFLStatus::Done => {
                self.done = true;
                return Ok(());
            }
            TINFLStatus::HasMoreOutput => {}
            TINFLStatus::NeedsMoreInput | TINFLStatus::FailedCannotMakeProgress => {
                if produced == 0 {
                    return Err(DecodeError::Decompression("stream truncated"));
                }
            }
            TINFLStatus::Adler32Mismatch => {
                return Err(DecodeError::Decompression("adler32 mismatch"));
            }
            _ => return Err(DecodeError::Decompression("corrupt deflate stream")),
        }

        if consumed == 0 && produced == 0 {
            self.idle += 1;
            if self.idle >= MAX_IDLE_PUMPS {
                return Err(DecodeError::Decompression("decompressor stalled"));
            }
        } else {
            self.idle = 0;
        }
        Ok(())
    }

    /// Fill `buf` completely; a stream that ends first is truncated.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        let mut total = 0usize;
        while total < buf.len() {
            if self.avail == 0 {
                if self.done {
                    return Err(DecodeError::Decompression("stream ended early"));
                }
                self.pump()?;
                continue;
            }
            let rp = self.read_pos & (WINDOW - 1);
            let contiguous = (WINDOW - rp).min(self.avail);
            let n = contiguous.min(buf.len() - total);
            buf[total..total + n].copy_from_slice(&self.window[rp..rp + n]);
            self.read_pos += n;
            self.avail -= n;
            total += n;
        }
        Ok(())
    }

    /// Run the stream to its end and count bytes nobody asked for.
    pub fn drain(&mut self) -> Result<usize, DecodeError> {
        let mut extra = self.avail;
        self.read_pos += self.avail;
        self.avail = 0;
        while !self.done {
            self.pump()?;
            extra += self.avail;
            self.read_pos += self.avail;
            self.avail = 0;
        }
        Ok(extra)
    }
}

/// Inflate a whole zlib stream and require exactly `expected_len` bytes
/// of output before the first byte of anything extra.
pub fn inflate(payload: &[u8], expected_len: usize) -> Result<Vec<u8>, DecodeError> {
    let mut inflater = Inflater::new(payload);
    let mut out = vec![0u8; expected_len];
    inflater.read_exact(&mut out)?;
    let extra = inflater.drain()?;
    if extra > 0 {
        log::warn!("png: {} bytes past the expected {}", extra, expected_len);
    }
    Ok(out)
}
