// Transport encodings for a decoded slice.
//
// Binary frame (default):
//   "S16Z" | version u8 | width u32 BE | height u32 BE | zlib(samples as u16 BE)
// Legacy text frame, for consumers without binary buffers:
//   base64(zlib_level7("s0,s1,s2,..."))
// The text frame carries no geometry; the receiver must know it.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gray16_png::{ImageGeometry, MAX_PIXELS, PixelBuffer};
use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;

use crate::error::{Error, Result};

pub const MAGIC: [u8; 4] = *b"S16Z";
pub const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 4 + 4;

const BINARY_LEVEL: u8 = 6;
const TEXT_LEVEL: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransportFormat {
    #[default]
    Binary,
    Text,
}

pub fn encode_binary(pixels: &PixelBuffer) -> Vec<u8> {
    let mut raw = Vec::with_capacity(pixels.samples().len() * 2);
    for sample in pixels.samples() {
        raw.extend_from_slice(&sample.to_be_bytes());
    }
    let body = compress_to_vec_zlib(&raw, BINARY_LEVEL);

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&pixels.width().to_be_bytes());
    out.extend_from_slice(&pixels.height().to_be_bytes());
    out.extend_from_slice(&body);
    out
}

// pixel count for a geometry a frame claims, refused above the decoder's budget
fn checked_pixels(geometry: ImageGeometry) -> Result<usize> {
    let pixels = u64::from(geometry.width) * u64::from(geometry.height);
    if pixels > MAX_PIXELS as u64 {
        return Err(Error::Transport(format!(
            "{geometry} exceeds {MAX_PIXELS} pixels"
        )));
    }
    Ok(pixels as usize)
}

pub fn decode_binary(frame: &[u8]) -> Result<PixelBuffer> {
    if frame.len() < HEADER_LEN || frame[..4] != MAGIC {
        return Err(Error::Transport("not an S16Z frame".into()));
    }
    if frame[4] != VERSION {
        return Err(Error::Transport(format!(
            "unsupported frame version {}",
            frame[4]
        )));
    }
    let width = u32::from_be_bytes([frame[5], frame[6], frame[7], frame[8]]);
    let height = u32::from_be_bytes([frame[9], frame[10], frame[11], frame[12]]);
    let geometry = ImageGeometry::new(width, height);
    let expected = checked_pixels(geometry)?
        .checked_mul(2)
        .ok_or_else(|| Error::Transport(format!("{geometry} does not fit in memory")))?;

    let raw = decompress_to_vec_zlib_with_limit(&frame[HEADER_LEN..], expected)
        .map_err(|e| Error::Transport(format!("frame body: {:?}", e.status)))?;
    if raw.len() != expected {
        return Err(Error::Transport(format!(
            "frame body is {} bytes, {} needs {}",
            raw.len(),
            geometry,
            expected
        )));
    }
    let samples = raw
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(PixelBuffer::new(geometry, samples)?)
}

pub fn encode_text(pixels: &PixelBuffer) -> String {
    let csv = pixels
        .samples()
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",");
    STANDARD.encode(compress_to_vec_zlib(csv.as_bytes(), TEXT_LEVEL))
}

pub fn decode_text(text: &str, geometry: ImageGeometry) -> Result<PixelBuffer> {
    let compressed = STANDARD
        .decode(text.trim())
        .map_err(|e| Error::Transport(format!("base64: {e}")))?;
    let pixels = checked_pixels(geometry)?;
    // widest possible sample list: "65535," per pixel
    let limit = pixels.saturating_mul(6).max(1);
    let csv = decompress_to_vec_zlib_with_limit(&compressed, limit)
        .map_err(|e| Error::Transport(format!("zlib: {:?}", e.status)))?;
    let csv = String::from_utf8(csv).map_err(|_| Error::Transport("sample list is not UTF-8".into()))?;

    let mut samples = Vec::with_capacity(pixels);
    for (i, field) in csv.split(',').enumerate() {
        let value: u32 = field
            .trim()
            .parse()
            .map_err(|_| Error::Transport(format!("sample {i} is not a number: {field:?}")))?;
        let sample = u16::try_from(value)
            .map_err(|_| Error::Transport(format!("sample {i} out of range: {value}")))?;
        samples.push(sample);
    }
    if samples.len() != pixels {
        return Err(Error::Transport(format!(
            "{} samples for {}",
            samples.len(),
            geometry
        )));
    }
    Ok(PixelBuffer::new(geometry, samples)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice() -> PixelBuffer {
        PixelBuffer::new(
            ImageGeometry::new(3, 2),
            vec![0, 1, 1024, 4095, 40000, 65535],
        )
        .unwrap()
    }

    #[test]
    fn binary_frame_layout() {
        let frame = encode_binary(&slice());
        assert_eq!(&frame[..5], b"S16Z\x01");
        assert_eq!(&frame[5..13], &[0, 0, 0, 3, 0, 0, 0, 2]);
        assert_eq!(decode_binary(&frame).unwrap(), slice());
    }

    #[test]
    fn binary_frame_rejects_damage() {
        let mut frame = encode_binary(&slice());
        frame[4] = 9;
        assert!(matches!(decode_binary(&frame), Err(Error::Transport(_))));

        let mut frame = encode_binary(&slice());
        // claim a bigger image than the body holds
        frame[8] = 4;
        assert!(matches!(decode_binary(&frame), Err(Error::Transport(_))));

        assert!(decode_binary(b"PNG").is_err());
    }

    #[test]
    fn oversized_geometry_is_refused_before_decompressing() {
        let mut frame = b"S16Z\x01".to_vec();
        frame.extend_from_slice(&u32::MAX.to_be_bytes());
        frame.extend_from_slice(&u32::MAX.to_be_bytes());
        frame.extend_from_slice(&compress_to_vec_zlib(&[0, 0], 6));
        assert!(matches!(decode_binary(&frame), Err(Error::Transport(_))));

        // one past the budget is refused too
        let mut frame = b"S16Z\x01".to_vec();
        frame.extend_from_slice(&8193u32.to_be_bytes());
        frame.extend_from_slice(&8192u32.to_be_bytes());
        assert!(matches!(decode_binary(&frame), Err(Error::Transport(_))));

        let text = encode_text(&slice());
        assert!(matches!(
            decode_text(&text, ImageGeometry::new(u32::MAX, u32::MAX)),
            Err(Error::Transport(_))
        ));
    }

    #[test]
    fn text_frame_is_base64_zlib_csv() {
        let text = encode_text(&slice());
        let raw = STANDARD.decode(&text).unwrap();
        let csv = miniz_oxide::inflate::decompress_to_vec_zlib(&raw).unwrap();
        assert_eq!(csv, b"0,1,1024,4095,40000,65535");
        assert_eq!(decode_text(&text, ImageGeometry::new(3, 2)).unwrap(), slice());
    }

    #[test]
    fn text_frame_validation() {
        let pack = |csv: &str| STANDARD.encode(compress_to_vec_zlib(csv.as_bytes(), 7));
        let g = ImageGeometry::new(2, 1);
        assert!(decode_text(&pack("1,2"), g).is_ok());
        assert!(matches!(decode_text(&pack("1,2,3"), g), Err(Error::Transport(_))));
        assert!(matches!(decode_text(&pack("1,x"), g), Err(Error::Transport(_))));
        assert!(matches!(decode_text(&pack("1,65536"), g), Err(Error::Transport(_))));
        assert!(matches!(decode_text("%%%", g), Err(Error::Transport(_))));
    }
}
