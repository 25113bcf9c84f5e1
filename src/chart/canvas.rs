use std::io::Cursor;

use image::{ImageError, ImageFormat, Rgb, RgbImage};

use super::font::{GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH, glyph};

/// Raster surface with the handful of primitives the charts need. All drawing
/// is clipped to the image bounds.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb<u8>) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, background),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i32).min(self.width() as i32);
        let y1 = (y + height as i32).min(self.height() as i32);
        for py in y0..y1 {
            for px in x0..x1 {
                self.image.put_pixel(px as u32, py as u32, color);
            }
        }
    }

    pub fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
        let right = x + width as i32 - 1;
        let bottom = y + height as i32 - 1;
        self.hline(x, right, y, color);
        self.hline(x, right, bottom, color);
        self.vline(x, y, bottom, color);
        self.vline(right, y, bottom, color);
    }

    /// Horizontal line from `x0` to `x1` inclusive.
    pub fn hline(&mut self, x0: i32, x1: i32, y: i32, color: Rgb<u8>) {
        let (from, to) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        for x in from..=to {
            self.put(x, y, color);
        }
    }

    /// Vertical line from `y0` to `y1` inclusive.
    pub fn vline(&mut self, x: i32, y0: i32, y1: i32, color: Rgb<u8>) {
        let (from, to) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for y in from..=to {
            self.put(x, y, color);
        }
    }

    /// Fills a circular sector. Angles are in degrees, counterclockwise from
    /// the positive x axis, matching the usual plotting convention.
    pub fn fill_wedge(
        &mut self,
        center: (i32, i32),
        radius: u32,
        start_deg: f64,
        sweep_deg: f64,
        color: Rgb<u8>,
    ) {
        if sweep_deg <= 0.0 {
            return;
        }
        let (cx, cy) = center;
        let r = radius as i32;
        let r_sq = f64::from(radius) * f64::from(radius);
        for py in (cy - r)..=(cy + r) {
            for px in (cx - r)..=(cx + r) {
                let dx = f64::from(px - cx);
                let dy = f64::from(cy - py);
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                if sweep_deg >= 360.0 {
                    self.put(px, py, color);
                    continue;
                }
                let angle = dy.atan2(dx).to_degrees();
                if (angle - start_deg).rem_euclid(360.0) < sweep_deg {
                    self.put(px, py, color);
                }
            }
        }
    }

    pub fn text(&mut self, x: i32, y: i32, text: &str, scale: u32, color: Rgb<u8>) {
        let step = (GLYPH_ADVANCE * scale) as i32;
        for (index, ch) in text.chars().enumerate() {
            let origin_x = x + index as i32 * step;
            for (row, bits) in glyph(ch).iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    self.fill_rect(
                        origin_x + (col * scale) as i32,
                        y + (row as u32 * scale) as i32,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
    }

    pub fn text_centered(&mut self, center_x: i32, y: i32, text: &str, scale: u32, color: Rgb<u8>) {
        let width = Self::text_width(text, scale) as i32;
        self.text(center_x - width / 2, y, text, scale, color);
    }

    pub fn text_right(&mut self, right: i32, y: i32, text: &str, scale: u32, color: Rgb<u8>) {
        let width = Self::text_width(text, scale) as i32;
        self.text(right - width, y, text, scale, color);
    }

    /// Width in pixels, without trailing spacing after the last glyph.
    pub fn text_width(text: &str, scale: u32) -> u32 {
        let glyphs = text.chars().count() as u32;
        if glyphs == 0 {
            return 0;
        }
        (glyphs - 1) * GLYPH_ADVANCE * scale + GLYPH_WIDTH * scale
    }

    pub fn text_height(scale: u32) -> u32 {
        GLYPH_HEIGHT * scale
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn put(&mut self, x: i32, y: i32, color: Rgb<u8>) {
        if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, color);
    }
}
