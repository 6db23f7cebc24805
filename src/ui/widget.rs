// Region geometry and alignment helpers
// Coordinates are raster pixels, origin top-left. Signed inputs (panned
// slices can start left of or above the raster) are clipped on entry.

use embedded_graphics::{prelude::*, primitives::Rectangle};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// The part of the rectangle at (x, y) of size w*h that lies inside
    /// `bounds`; zero-sized when they do not overlap.
    pub fn clip_signed(x: i32, y: i32, w: u32, h: u32, bounds: Region) -> Self {
        let x0 = i64::from(x).max(i64::from(bounds.x));
        let y0 = i64::from(y).max(i64::from(bounds.y));
        let x1 = (i64::from(x) + i64::from(w)).min(i64::from(bounds.x) + i64::from(bounds.w));
        let y1 = (i64::from(y) + i64::from(h)).min(i64::from(bounds.y) + i64::from(bounds.h));
        if x1 <= x0 || y1 <= y0 {
            return Self::default();
        }
        Self {
            x: x0 as u32,
            y: y0 as u32,
            w: (x1 - x0) as u32,
            h: (y1 - y0) as u32,
        }
    }

    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn to_rect(self) -> Rectangle {
        Rectangle::new(
            Point::new(self.x as i32, self.y as i32),
            Size::new(self.w, self.h),
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Alignment {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
}

impl Alignment {
    pub fn position(self, region: Region, content_size: Size) -> Point {
        let cw = content_size.width as i32;
        let ch = content_size.height as i32;
        let rx = region.x as i32;
        let ry = region.y as i32;
        let rw = region.w as i32;
        let rh = region.h as i32;

        match self {
            Alignment::TopLeft => Point::new(rx, ry),
            Alignment::TopRight => Point::new(rx + rw - cw, ry),
            Alignment::BottomLeft => Point::new(rx, ry + rh - ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_signed_handles_negative_origin() {
        let bounds = Region::new(0, 0, 100, 50);
        assert_eq!(
            Region::clip_signed(-10, -5, 30, 20, bounds),
            Region::new(0, 0, 20, 15)
        );
        assert_eq!(
            Region::clip_signed(90, 40, 30, 20, bounds),
            Region::new(90, 40, 10, 10)
        );
        assert!(Region::clip_signed(-40, 0, 30, 20, bounds).is_empty());
        assert!(Region::clip_signed(100, 0, 30, 20, bounds).is_empty());
    }

    #[test]
    fn bottom_left_alignment() {
        let p = Alignment::BottomLeft.position(Region::new(0, 0, 200, 100), Size::new(50, 13));
        assert_eq!(p, Point::new(0, 87));
    }
}
