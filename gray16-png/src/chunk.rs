// Chunk locator: finds IHDR / IDAT / IEND by their 4-byte tag signatures
// and gathers the IDAT payloads, in file order, into one zlib stream.
// The length field sits in the 4 bytes before a tag; the payload follows
// it, then a 4-byte CRC (not verified). Only IHDR < IDAT < IEND ordering
// is assumed; ancillary chunks in between are skipped by the scan.

use alloc::vec::Vec;

use crate::DecodeError;
use crate::image::{BIT_DEPTH, COLOR_GREYSCALE, ImageGeometry};

pub const PNG_SIG: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

pub const TAG_IHDR: [u8; 4] = *b"IHDR";
pub const TAG_IDAT: [u8; 4] = *b"IDAT";
pub const TAG_IEND: [u8; 4] = *b"IEND";

const IHDR_LEN: usize = 13;
const CRC_LEN: usize = 4;

/// One located chunk; `payload` borrows from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngChunk<'a> {
    pub tag: [u8; 4],
    pub length: u32,
    pub payload: &'a [u8],
}

/// Everything the decoder needs from the chunk layer.
#[derive(Debug)]
pub struct ChunkMap<'a> {
    pub header: PngChunk<'a>,
    pub geometry: ImageGeometry,
    pub data: Vec<PngChunk<'a>>,
}

impl ChunkMap<'_> {
    pub fn compressed_len(&self) -> usize {
        self.data.iter().map(|c| c.payload.len()).sum()
    }

    // IDAT payloads concatenated in file order; one DEFLATE stream may
    // span any number of chunks
    pub fn compressed_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.compressed_len());
        for chunk in &self.data {
            out.extend_from_slice(chunk.payload);
        }
        out
    }
}

// big-endian u32 (PNG uses network byte order)
#[inline]
fn be_u32(d: &[u8], o: usize) -> u32 {
    u32::from_be_bytes([d[o], d[o + 1], d[o + 2], d[o + 3]])
}

// first occurrence of `tag` at or after `from`
fn find_tag(data: &[u8], tag: &[u8; 4], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(tag.len())
        .position(|w| w == tag)
        .map(|p| p + from)
}

// read the chunk whose tag starts at `tag_pos`
fn chunk_at<'a>(data: &'a [u8], tag_pos: usize) -> Result<PngChunk<'a>, DecodeError> {
    if tag_pos < 4 {
        return Err(DecodeError::MalformedPng("chunk tag without length field"));
    }
    let length = be_u32(data, tag_pos - 4);
    let start = tag_pos + 4;
    let end = start
        .checked_add(length as usize)
        .filter(|&end| end <= data.len())
        .ok_or(DecodeError::MalformedPng("chunk length runs past end of buffer"))?;
    Ok(PngChunk {
        tag: [
            data[tag_pos],
            data[tag_pos + 1],
            data[tag_pos + 2],
            data[tag_pos + 3],
        ],
        length,
        payload: &data[start..end],
    })
}

/// Parse IHDR only. Does not require IDAT or IEND to be present.
pub fn locate_header(data: &[u8]) -> Result<(PngChunk<'_>, ImageGeometry), DecodeError> {
    find_header(data).map(|(_, header, geometry)| (header, geometry))
}

// IHDR chunk, its tag offset, and the validated geometry
fn find_header(data: &[u8]) -> Result<(usize, PngChunk<'_>, ImageGeometry), DecodeError> {
    if !data.starts_with(&PNG_SIG) {
        log::debug!("png: buffer does not start with the PNG signature");
    }

    let pos = find_tag(data, &TAG_IHDR, 0).ok_or(DecodeError::MalformedPng("missing IHDR"))?;
    // the IHDR fields are read straight after the tag, whatever the
    // declared length says
    let fields = data
        .get(pos + 4..pos + 4 + IHDR_LEN)
        .ok_or(DecodeError::MalformedPng("truncated IHDR"))?;

    let header = PngChunk {
        tag: TAG_IHDR,
        length: if pos >= 4 {
            be_u32(data, pos - 4)
        } else {
            IHDR_LEN as u32
        },
        payload: fields,
    };

    let geometry = ImageGeometry::new(be_u32(fields, 0), be_u32(fields, 4));
    if geometry.width == 0 || geometry.height == 0 {
        return Err(DecodeError::MalformedPng("zero dimensions"));
    }

    let (bit_depth, color_type, interlace) = (fields[8], fields[9], fields[12]);
    if bit_depth != BIT_DEPTH || color_type != COLOR_GREYSCALE || interlace != 0 {
        return Err(DecodeError::UnsupportedFormat {
            bit_depth,
            color_type,
            interlace,
        });
    }

    Ok((pos, header, geometry))
}

/// Locate IHDR, every IDAT before IEND, and IEND.
pub fn locate(data: &[u8]) -> Result<ChunkMap<'_>, DecodeError> {
    let (ihdr_pos, header, geometry) = find_header(data)?;
    let mut cursor = ihdr_pos + 4 + IHDR_LEN;
    let mut chunks = Vec::new();

    // scan resumes after each IDAT payload so compressed bytes that happen
    // to spell a tag are never mistaken for one
    loop {
        let iend = find_tag(data, &TAG_IEND, cursor);
        let idat = find_tag(data, &TAG_IDAT, cursor);
        match (idat, iend) {
            (Some(idat_pos), Some(iend_pos)) if idat_pos < iend_pos => {
                let chunk = chunk_at(data, idat_pos)?;
                cursor = idat_pos + 4 + chunk.payload.len() + CRC_LEN;
                chunks.push(chunk);
            }
            (Some(idat_pos), None) => {
                // keep going so a bad length is reported before a missing IEND
                let chunk = chunk_at(data, idat_pos)?;
                cursor = idat_pos + 4 + chunk.payload.len() + CRC_LEN;
                chunks.push(chunk);
            }
            (_, Some(_)) => break,
            (None, None) => return Err(DecodeError::MalformedPng("missing IEND")),
        }
    }

    if chunks.iter().all(|c| c.payload.is_empty()) {
        return Err(DecodeError::MalformedPng("no IDAT data"));
    }

    log::debug!(
        "png: {} with {} IDAT chunk(s), {} compressed bytes",
        geometry,
        chunks.len(),
        chunks.iter().map(|c| c.payload.len()).sum::<usize>()
    );

    Ok(ChunkMap {
        header,
        geometry,
        data: chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(tag);
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0, 0, 0, 0]);
    }

    fn ihdr(width: u32, height: u32) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&width.to_be_bytes());
        p.extend_from_slice(&height.to_be_bytes());
        p.extend_from_slice(&[16, 0, 0, 0, 0]);
        p
    }

    fn png(parts: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut out = PNG_SIG.to_vec();
        for (tag, payload) in parts {
            push_chunk(&mut out, tag, payload);
        }
        out
    }

    #[test]
    fn concatenates_idat_in_file_order() {
        let h = ihdr(2, 1);
        let data = png(&[
            (&TAG_IHDR, &h[..]),
            (&TAG_IDAT, &b"abc"[..]),
            (b"tEXt", &b"note"[..]),
            (&TAG_IDAT, &b"de"[..]),
            (&TAG_IEND, &b""[..]),
        ]);
        let map = locate(&data).unwrap();
        assert_eq!(map.geometry, ImageGeometry::new(2, 1));
        assert_eq!(map.data.len(), 2);
        assert_eq!(map.data[1].length, 2);
        assert_eq!(map.compressed_payload(), b"abcde".to_vec());
    }

    #[test]
    fn tag_bytes_inside_idat_payload_are_not_chunks() {
        let h = ihdr(1, 1);
        let data = png(&[
            (&TAG_IHDR, &h[..]),
            (&TAG_IDAT, &b"xxIENDxxIDAT"[..]),
            (&TAG_IEND, &b""[..]),
        ]);
        let map = locate(&data).unwrap();
        assert_eq!(map.data.len(), 1);
        assert_eq!(map.compressed_payload(), b"xxIENDxxIDAT".to_vec());
    }

    #[test]
    fn missing_ihdr_or_iend_is_malformed() {
        let data = png(&[(&TAG_IDAT, &b"abc"[..]), (&TAG_IEND, &b""[..])]);
        assert_eq!(
            locate(&data).unwrap_err(),
            DecodeError::MalformedPng("missing IHDR")
        );

        let h = ihdr(1, 1);
        let data = png(&[(&TAG_IHDR, &h[..]), (&TAG_IDAT, &b"abc"[..])]);
        assert_eq!(
            locate(&data).unwrap_err(),
            DecodeError::MalformedPng("missing IEND")
        );
    }

    #[test]
    fn idat_length_past_end_is_malformed() {
        let h = ihdr(1, 1);
        let mut data = png(&[(&TAG_IHDR, &h[..])]);
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&TAG_IDAT);
        data.extend_from_slice(b"short");
        assert_eq!(
            locate(&data).unwrap_err(),
            DecodeError::MalformedPng("chunk length runs past end of buffer")
        );
    }

    #[test]
    fn header_read_ignores_missing_data() {
        let h = ihdr(4000, 3000);
        let data = png(&[(&TAG_IHDR, &h[..])]);
        let (chunk, geometry) = locate_header(&data).unwrap();
        assert_eq!(chunk.length, 13);
        assert_eq!(geometry, ImageGeometry::new(4000, 3000));
    }

    #[test]
    fn rejects_other_formats() {
        let mut h = ihdr(1, 1);
        h[8] = 8;
        let data = png(&[(&TAG_IHDR, &h[..]), (&TAG_IEND, &b""[..])]);
        assert_eq!(
            locate_header(&data).unwrap_err(),
            DecodeError::UnsupportedFormat {
                bit_depth: 8,
                color_type: 0,
                interlace: 0
            }
        );

        let h = ihdr(0, 4);
        let data = png(&[(&TAG_IHDR, &h[..]), (&TAG_IEND, &b""[..])]);
        assert_eq!(
            locate_header(&data).unwrap_err(),
            DecodeError::MalformedPng("zero dimensions")
        );
    }

    #[test]
    fn empty_idat_set_is_malformed() {
        let h = ihdr(1, 1);
        let data = png(&[(&TAG_IHDR, &h[..]), (&TAG_IEND, &b""[..])]);
        assert_eq!(
            locate(&data).unwrap_err(),
            DecodeError::MalformedPng("no IDAT data")
        );
    }
}
