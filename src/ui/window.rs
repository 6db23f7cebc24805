// Window/level: stored 16-bit sample -> 8-bit display intensity.
//
//   low  = (center + offset) - width/2
//   high = (center + offset) + width/2
//   v <  low   -> 0
//   v >  high  -> 255
//   otherwise  -> round((v - low) * 255 / (high - low)), halves round up
//
// `offset` is a display-only calibration bias (1020 by default) lining
// the archive's stored range up with conventional CT windows.

pub const DEFAULT_OFFSET: i32 = 1020;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    center: i32,
    width: i32,
    offset: i32,
}

impl Window {
    /// Width below 1 is clamped to 1.
    pub fn new(center: i32, width: i32, offset: i32) -> Self {
        Self {
            center,
            width: width.max(1),
            offset,
        }
    }

    pub fn center(&self) -> i32 {
        self.center
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn bounds(&self) -> (f64, f64) {
        let mid = f64::from(self.center) + f64::from(self.offset);
        let half = f64::from(self.width) / 2.0;
        (mid - half, mid + half)
    }

    #[inline]
    pub fn map(&self, v: u16) -> u8 {
        let (low, high) = self.bounds();
        let v = f64::from(v);
        if v < low {
            0
        } else if v > high {
            255
        } else {
            // multiply before dividing so the midpoint lands on exactly .5
            ((v - low) * 255.0 / (high - low)).round() as u8
        }
    }

    /// Every sample's display value, for one pass over a slice.
    pub fn lut(&self) -> Vec<u8> {
        (0..=u16::MAX).map(|v| self.map(v)).collect()
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new(40, 80, DEFAULT_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_spans_1020_to_1100() {
        let w = Window::default();
        assert_eq!(w.bounds(), (1020.0, 1100.0));
        assert_eq!(w.map(980), 0);
        assert_eq!(w.map(1019), 0);
        assert_eq!(w.map(1020), 0);
        // midpoint 127.5 rounds up
        assert_eq!(w.map(1060), 128);
        assert_eq!(w.map(1100), 255);
        assert_eq!(w.map(1101), 255);
    }

    #[test]
    fn centred_on_the_offset() {
        // 1060->255, 980->0 needs the window at 980..1060, which the
        // formula gives for center 0, not for the default center 40
        let w = Window::new(0, 80, DEFAULT_OFFSET);
        assert_eq!(w.map(1060), 255);
        assert_eq!(w.map(980), 0);
        assert_eq!(w.map(1020), 128);
    }

    #[test]
    fn width_is_clamped() {
        let w = Window::new(0, -30, 1020);
        assert_eq!(w.width(), 1);
        assert_eq!(w.map(1019), 0);
        assert_eq!(w.map(1021), 255);
    }

    #[test]
    fn lut_matches_map() {
        let w = Window::new(300, 1500, DEFAULT_OFFSET);
        let lut = w.lut();
        assert_eq!(lut.len(), 65536);
        for v in [0u16, 570, 1000, 1320, 2070, 2071, 65535] {
            assert_eq!(lut[v as usize], w.map(v));
        }
        assert!(lut.windows(2).all(|p| p[0] <= p[1]));
    }
}
