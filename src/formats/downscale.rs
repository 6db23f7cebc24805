// Downscale adapter.
//
// Large slices are shrunk by an external tool before decoding instead of
// resampling in-process. Stages run in order on the current geometry:
//   either side > quarter_above  ->  25%
//   either side > half_above     ->  50%   (checked after the 25% stage)
// so 4000x4000 becomes 1000x1000 and 1800x900 becomes 900x450.
// The tool's real output geometry is read back after every stage and
// wins over the arithmetic.

use std::sync::Arc;

use gray16_png::{ImageGeometry, read_geometry};

use crate::config::DownscaleConfig;
use crate::drivers::rescale::{ImageMagick, Rescaler};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Quarter,
    Half,
}

impl Stage {
    pub const fn percent(self) -> u32 {
        match self {
            Stage::Quarter => 25,
            Stage::Half => 50,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            Stage::Quarter => 4,
            Stage::Half => 2,
        }
    }
}

#[inline]
fn exceeds(geometry: ImageGeometry, limit: u32) -> bool {
    geometry.width > limit || geometry.height > limit
}

/// A PNG ready for decoding, with the geometry its IHDR declares.
#[derive(Debug)]
pub struct Fitted {
    pub png: Vec<u8>,
    pub geometry: ImageGeometry,
    pub stages: Vec<Stage>,
}

pub struct Downscaler {
    rescaler: Arc<dyn Rescaler>,
    quarter_above: u32,
    half_above: u32,
}

impl Downscaler {
    pub fn new(rescaler: Arc<dyn Rescaler>, quarter_above: u32, half_above: u32) -> Self {
        Self {
            rescaler,
            quarter_above,
            half_above,
        }
    }

    /// ImageMagick driver per config, or None when downscaling is off.
    pub fn from_config(config: &DownscaleConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let tool = ImageMagick::new(config.program.clone(), config.scratch_dir.clone());
        Some(Self::new(
            Arc::new(tool),
            config.quarter_above,
            config.half_above,
        ))
    }

    pub fn fit(&self, png: Vec<u8>) -> Result<Fitted> {
        let mut geometry = read_geometry(&png)?;
        let mut png = png;
        let mut stages = Vec::new();

        if exceeds(geometry, self.quarter_above) {
            (png, geometry) = self.run(&png, geometry, Stage::Quarter)?;
            stages.push(Stage::Quarter);
        }
        if exceeds(geometry, self.half_above) {
            (png, geometry) = self.run(&png, geometry, Stage::Half)?;
            stages.push(Stage::Half);
        }

        Ok(Fitted {
            png,
            geometry,
            stages,
        })
    }

    fn run(
        &self,
        png: &[u8],
        before: ImageGeometry,
        stage: Stage,
    ) -> Result<(Vec<u8>, ImageGeometry)> {
        let expected = before.scaled_down(stage.divisor());
        let scaled = self.rescaler.rescale(png, stage.percent())?;
        // the output must survive the same chunk walk the decoder does
        let actual = gray16_png::chunk::locate(&scaled)
            .map(|map| map.geometry)
            .map_err(|e| Error::ExternalTool(format!("rescaled output unreadable: {e}")))?;
        if actual != expected {
            log::warn!(
                "downscale: {}% of {} gave {}, expected {}",
                stage.percent(),
                before,
                actual,
                expected
            );
        } else {
            log::info!("downscale: {} -> {}", before, actual);
        }
        Ok((scaled, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // IHDR-only PNG; enough for reading the geometry
    fn header_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = gray16_png::chunk::PNG_SIG.to_vec();
        out.extend_from_slice(&13u32.to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&[16, 0, 0, 0, 0]);
        out.extend_from_slice(&[0; 4]);
        out
    }

    // header plus a token IDAT and IEND: passes the chunk walk, not a decode
    fn stub_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = header_png(width, height);
        for (tag, payload) in [(b"IDAT", &[0x78u8, 0x9c][..]), (b"IEND", &[][..])] {
            out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            out.extend_from_slice(tag);
            out.extend_from_slice(payload);
            out.extend_from_slice(&[0; 4]);
        }
        out
    }

    // scales by arithmetic, optionally off by `skew` pixels, and logs calls
    struct HeaderRescaler {
        skew: u32,
        calls: Mutex<Vec<u32>>,
    }

    impl HeaderRescaler {
        fn new(skew: u32) -> Arc<Self> {
            Arc::new(Self {
                skew,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl Rescaler for HeaderRescaler {
        fn rescale(&self, png: &[u8], percent: u32) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(percent);
            let g = read_geometry(png)?;
            Ok(stub_png(
                g.width * percent / 100 + self.skew,
                g.height * percent / 100,
            ))
        }
    }

    struct Garbage;

    impl Rescaler for Garbage {
        fn rescale(&self, _png: &[u8], _percent: u32) -> Result<Vec<u8>> {
            Ok(b"not a png".to_vec())
        }
    }

    #[test]
    fn four_thousand_square_becomes_one_thousand() {
        let tool = HeaderRescaler::new(0);
        let downscaler = Downscaler::new(tool.clone(), 2000, 1000);
        let fitted = downscaler.fit(header_png(4000, 4000)).unwrap();
        assert_eq!(fitted.geometry, ImageGeometry::new(1000, 1000));
        assert_eq!(fitted.stages, vec![Stage::Quarter]);
        assert_eq!(*tool.calls.lock().unwrap(), vec![25]);
    }

    #[test]
    fn both_stages_run_in_sequence() {
        let tool = HeaderRescaler::new(0);
        let downscaler = Downscaler::new(tool.clone(), 2000, 1000);
        let fitted = downscaler.fit(header_png(6000, 2400)).unwrap();
        assert_eq!(fitted.geometry, ImageGeometry::new(750, 300));
        assert_eq!(*tool.calls.lock().unwrap(), vec![25, 50]);
        assert_eq!(fitted.stages, vec![Stage::Quarter, Stage::Half]);
    }

    #[test]
    fn half_only_and_untouched() {
        let tool = HeaderRescaler::new(0);
        let downscaler = Downscaler::new(tool.clone(), 2000, 1000);
        let fitted = downscaler.fit(header_png(1800, 900)).unwrap();
        assert_eq!(fitted.geometry, ImageGeometry::new(900, 450));

        let small = header_png(512, 512);
        let fitted = downscaler.fit(small.clone()).unwrap();
        assert_eq!(fitted.png, small);
        assert!(fitted.stages.is_empty());
        assert_eq!(*tool.calls.lock().unwrap(), vec![50]);
    }

    #[test]
    fn actual_geometry_wins() {
        // 4000 -> 1003 wide is still > 1000, so a half stage follows
        let downscaler = Downscaler::new(HeaderRescaler::new(3), 2000, 1000);
        let fitted = downscaler.fit(header_png(4000, 4000)).unwrap();
        assert_eq!(fitted.stages, vec![Stage::Quarter, Stage::Half]);
        assert_eq!(fitted.geometry, ImageGeometry::new(504, 500));
    }

    #[test]
    fn unreadable_output_is_external_tool_error() {
        let downscaler = Downscaler::new(Arc::new(Garbage), 2000, 1000);
        assert!(matches!(
            downscaler.fit(header_png(3000, 10)),
            Err(Error::ExternalTool(_))
        ));
    }

    // a tool that writes a valid IHDR and nothing else
    struct HeaderOnly;

    impl Rescaler for HeaderOnly {
        fn rescale(&self, png: &[u8], percent: u32) -> Result<Vec<u8>> {
            let g = read_geometry(png)?;
            Ok(header_png(g.width * percent / 100, g.height * percent / 100))
        }
    }

    #[test]
    fn output_without_image_data_is_external_tool_error() {
        let downscaler = Downscaler::new(Arc::new(HeaderOnly), 2000, 1000);
        match downscaler.fit(header_png(3000, 4)) {
            Err(Error::ExternalTool(reason)) => assert!(reason.contains("unreadable")),
            other => panic!("expected ExternalTool, got {other:?}"),
        }
    }

    #[test]
    fn disabled_config_means_no_downscaler() {
        let config = DownscaleConfig {
            enabled: false,
            ..DownscaleConfig::default()
        };
        assert!(Downscaler::from_config(&config).is_none());
        assert!(Downscaler::from_config(&DownscaleConfig::default()).is_some());
    }
}
