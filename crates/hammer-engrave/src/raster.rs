//! Preview rasterizer
//!
//! Strokes every line with a round brush of the engraver's stroke width onto
//! a white grayscale image. Overlapping strokes take the darkest coverage, so
//! the output does not depend on drawing order.

use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};

use crate::command::{Command, Point, Rect};
use crate::error::Result;
use crate::measure::{replay, Sink};

const PAPER: u8 = 0xff;

pub struct Rasterizer {
    img: GrayImage,
    origin: Point,
    scale: f32,
    radius: f32,
    pen: (f32, f32),
}

impl Rasterizer {
    /// An image covering `bounds` (machine units) at `scale` pixels per unit.
    pub fn new(bounds: Rect, scale: f32, stroke_width: i32) -> Self {
        let w = (bounds.width().max(0) as f32 * scale).ceil() as u32;
        let h = (bounds.height().max(0) as f32 * scale).ceil() as u32;
        Self {
            img: GrayImage::from_pixel(w, h, Luma([PAPER])),
            origin: bounds.min,
            scale,
            radius: stroke_width as f32 * scale / 2.0,
            pen: (0.0, 0.0),
        }
    }

    pub fn image(&self) -> &GrayImage {
        &self.img
    }

    pub fn into_image(self) -> GrayImage {
        self.img
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.img.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    fn project(&self, p: Point) -> (f32, f32) {
        (
            (p.x - self.origin.x) as f32 * self.scale,
            (p.y - self.origin.y) as f32 * self.scale,
        )
    }

    fn stroke(&mut self, a: (f32, f32), b: (f32, f32)) {
        let r = self.radius;
        let (w, h) = self.img.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let x0 = (a.0.min(b.0) - r - 1.0).floor().max(0.0) as u32;
        let y0 = (a.1.min(b.1) - r - 1.0).floor().max(0.0) as u32;
        let x1 = ((a.0.max(b.0) + r + 1.0).ceil().max(0.0) as u32).min(w);
        let y1 = ((a.1.max(b.1) + r + 1.0).ceil().max(0.0) as u32).min(h);
        for y in y0..y1 {
            for x in x0..x1 {
                let d = segment_distance((x as f32 + 0.5, y as f32 + 0.5), a, b);
                let coverage = (r + 0.5 - d).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let ink = (f32::from(PAPER) * (1.0 - coverage)).round() as u8;
                let px = self.img.get_pixel_mut(x, y);
                px.0[0] = px.0[0].min(ink);
            }
        }
    }
}

impl Sink for Rasterizer {
    fn move_to(&mut self, p: Point) {
        self.pen = self.project(p);
    }

    fn line_to(&mut self, p: Point) {
        let to = self.project(p);
        self.stroke(self.pen, to);
        self.pen = to;
    }
}

/// Rasterize `cmd` over `bounds`.
pub fn render(cmd: &Command, bounds: Rect, scale: f32, stroke_width: i32) -> GrayImage {
    let mut r = Rasterizer::new(bounds, scale, stroke_width);
    replay(cmd.steps(), &mut r);
    r.into_image()
}

fn segment_distance(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
