// RGBA output raster.
//
// Greyscale slices are written with the same value in R, G and B and
// full opacity. Pan translates the paint origin; whatever the slice does
// not cover keeps the background. The raster is an embedded-graphics
// DrawTarget so overlay text draws straight into it.

use std::io::{self, Write};

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use gray16_png::PixelBuffer;

use super::widget::Region;

pub struct Raster {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0u8; width as usize * height as usize * 4],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn region(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// RGBA bytes, row-major.
    pub fn rgba(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    pub fn clear(&mut self, rgb: [u8; 3]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px[..3].copy_from_slice(&rgb);
            px[3] = 255;
        }
    }

    #[inline]
    fn put(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[i..i + 3].copy_from_slice(&rgb);
        self.pixels[i + 3] = 255;
    }

    /// Paint `slice` through `lut` with its top-left at (pan_x, pan_y).
    /// Clips to the raster; returns the region actually painted.
    pub fn blit(&mut self, slice: &PixelBuffer, lut: &[u8], pan_x: i32, pan_y: i32) -> Region {
        let painted = Region::clip_signed(pan_x, pan_y, slice.width(), slice.height(), self.region());
        for y in painted.y..painted.y + painted.h {
            let row = slice.row((i64::from(y) - i64::from(pan_y)) as u32);
            let sx0 = (i64::from(painted.x) - i64::from(pan_x)) as usize;
            let src = &row[sx0..sx0 + painted.w as usize];
            for (dx, &sample) in src.iter().enumerate() {
                let v = lut[sample as usize];
                self.put(painted.x + dx as u32, y, [v, v, v]);
            }
        }
        painted
    }

    /// Binary PPM (P6); alpha is dropped.
    pub fn write_ppm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in self.pixels.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
        out.write_all(&rgb)?;
        out.flush()
    }
}

impl OriginDimensions for Raster {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Raster {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.put(x, y, [color.r(), color.g(), color.b()]);
            }
        }
        Ok(())
    }
}
