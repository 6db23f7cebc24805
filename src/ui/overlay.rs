// Text overlay drawn over the rendered slice.
// Bottom line: "Instance: s Center: c Width: w"; optional title line
// (patient / study) at the top; optional progress at the top right.

use core::fmt::Write as _;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X13;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::PrimitiveStyle;
use embedded_graphics::text::{Baseline, Text};

use super::raster::Raster;
use super::widget::{Alignment, Region};

pub const LINE_HEIGHT: u32 = 15;
const PAD: i32 = 2;
const CHAR_W: u32 = 6;

const TEXT: Rgb888 = Rgb888::new(0xff, 0xff, 0xff);
const BACKDROP: Rgb888 = Rgb888::new(0x11, 0x11, 0x11);

pub fn info_line(slice: u32, center: i32, width: i32) -> String {
    let mut s = String::with_capacity(40);
    let _ = write!(s, "Instance: {} Center: {} Width: {}", slice, center, width);
    s
}

#[derive(Debug, Default, Clone)]
pub struct Overlay {
    pub title: Option<String>,
    pub info: String,
    pub status: Option<String>,
}

impl Overlay {
    pub fn draw(&self, raster: &mut Raster) {
        let area = raster.region();
        if let Some(title) = &self.title {
            label(raster, title, area, Alignment::TopLeft);
        }
        if let Some(status) = &self.status {
            label(raster, status, area, Alignment::TopRight);
        }
        label(raster, &self.info, area, Alignment::BottomLeft);
    }
}

// one line of text on a dark strip, clipped by the raster
fn label(raster: &mut Raster, text: &str, area: Region, align: Alignment) {
    if text.is_empty() {
        return;
    }
    let size = Size::new(text.chars().count() as u32 * CHAR_W + 2 * PAD as u32, LINE_HEIGHT);
    let origin = align.position(area, size);
    let strip = Region::clip_signed(origin.x, origin.y, size.width, size.height, area);
    if strip.is_empty() {
        return;
    }

    let style = MonoTextStyle::new(&FONT_6X13, TEXT);
    // Raster's DrawTarget error is Infallible
    let _ = strip
        .to_rect()
        .into_styled(PrimitiveStyle::with_fill(BACKDROP))
        .draw(raster);
    let _ = Text::with_baseline(text, origin + Point::new(PAD, 1), style, Baseline::Top).draw(raster);
}
