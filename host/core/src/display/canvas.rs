//! Pixel storage for one display layer
//!
//! Only the compositor owns canvases. Opaque canvases (the base layer) clear
//! to black; transparent canvases clear to nothing so that lower layers show
//! through when composited.

use tiny_skia::{
    BlendMode, Color, Paint, Pixmap, PixmapPaint, PremultipliedColorU8, Rect, Transform,
};

use super::bitmap::Bitmap;
use super::font::FontFace;
use super::{DisplayError, Frame, Region};

pub(crate) struct Canvas {
    pixmap: Pixmap,
    opaque: bool,
    lit: PremultipliedColorU8,
    unlit: PremultipliedColorU8,
}

impl Canvas {
    pub(crate) fn new(width: u32, height: u32, opaque: bool) -> Result<Self, DisplayError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(DisplayError::InvalidSize { width, height })?;
        let unlit = if opaque {
            Color::BLACK.premultiply().to_color_u8()
        } else {
            PremultipliedColorU8::TRANSPARENT
        };
        let mut canvas = Self {
            pixmap,
            opaque,
            lit: Color::WHITE.premultiply().to_color_u8(),
            unlit,
        };
        canvas.clear();
        Ok(canvas)
    }

    pub(crate) fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub(crate) fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub(crate) fn clear(&mut self) {
        if self.opaque {
            self.pixmap.fill(Color::BLACK);
        } else {
            self.pixmap.fill(Color::TRANSPARENT);
        }
    }

    /// Fill a region with lit or unlit pixels (clipped to the canvas)
    pub(crate) fn fill_region(&mut self, region: Region, lit: bool) {
        let Some(rect) = Rect::from_xywh(
            region.x as f32,
            region.y as f32,
            region.width as f32,
            region.height as f32,
        ) else {
            return;
        };

        let mut paint = Paint::default();
        paint.anti_alias = false;
        paint.blend_mode = BlendMode::Source;
        paint.set_color(match (lit, self.opaque) {
            (true, _) => Color::WHITE,
            (false, true) => Color::BLACK,
            (false, false) => Color::TRANSPARENT,
        });
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    pub(crate) fn set_pixel(&mut self, x: i32, y: i32, lit: bool) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let idx = y as usize * self.width() as usize + x as usize;
        self.pixmap.pixels_mut()[idx] = if lit { self.lit } else { self.unlit };
    }

    pub(crate) fn is_lit(&self, x: u32, y: u32) -> bool {
        if x >= self.width() || y >= self.height() {
            return false;
        }
        let px = self.pixmap.pixels()[(y * self.width() + x) as usize];
        px.alpha() >= 128 && px.red() >= 128
    }

    /// Draw a single line of text with its top-left corner at (x, y).
    ///
    /// Returns the pixel advance of the drawn text.
    pub(crate) fn draw_text(
        &mut self,
        font: &dyn FontFace,
        text: &str,
        x: i32,
        y: i32,
        lit: bool,
    ) -> f32 {
        let mut pen = x as f32;
        for ch in text.chars() {
            font.rasterize(ch, pen, y as f32, &mut |px, py| self.set_pixel(px, py, lit));
            pen += font.advance(ch);
        }
        pen - x as f32
    }

    /// Paste a bitmap using itself as the mask: only set pixels are written
    pub(crate) fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32) {
        for (bx, by) in bitmap.lit_pixels() {
            self.set_pixel(x + bx as i32, y + by as i32, true);
        }
    }

    /// Source-over this canvas onto `target`
    pub(crate) fn paint_onto(&self, target: &mut Pixmap) {
        target.draw_pixmap(
            0,
            0,
            self.pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

/// Flattened output of all layers
pub(crate) struct CompositeBuffer {
    pixmap: Pixmap,
}

impl CompositeBuffer {
    pub(crate) fn new(width: u32, height: u32) -> Result<Self, DisplayError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(DisplayError::InvalidSize { width, height })?;
        Ok(Self { pixmap })
    }

    /// Paste base, then each transparent layer over it, and return the frame
    pub(crate) fn flatten(&mut self, layers: [&Canvas; 3]) -> Frame {
        self.pixmap.fill(Color::BLACK);
        for layer in layers {
            layer.paint_onto(&mut self.pixmap);
        }

        let pixels = self
            .pixmap
            .pixels()
            .iter()
            .map(|px| px.red() >= 128)
            .collect();
        Frame::from_pixels(self.pixmap.width(), self.pixmap.height(), pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedWidthFont;

    #[test]
    fn test_transparent_layer_shows_base_through() {
        let mut base = Canvas::new(8, 4, true).unwrap();
        let mut secondary = Canvas::new(8, 4, false).unwrap();
        let overlay = Canvas::new(8, 4, false).unwrap();

        base.fill_region(Region::new(0, 0, 4, 4), true);
        secondary.set_pixel(6, 1, true);

        let mut composite = CompositeBuffer::new(8, 4).unwrap();
        let frame = composite.flatten([&base, &secondary, &overlay]);

        assert!(frame.get(0, 0));
        assert!(frame.get(3, 3));
        assert!(frame.get(6, 1));
        assert!(!frame.get(5, 1));
        assert_eq!(frame.lit_count(), 17);
    }

    #[test]
    fn test_clearing_transparent_region_does_not_blank_base() {
        let mut base = Canvas::new(4, 4, true).unwrap();
        let mut overlay = Canvas::new(4, 4, false).unwrap();
        let secondary = Canvas::new(4, 4, false).unwrap();
        base.fill_region(Region::new(0, 0, 4, 4), true);
        overlay.fill_region(Region::new(0, 0, 2, 2), false);

        let mut composite = CompositeBuffer::new(4, 4).unwrap();
        let frame = composite.flatten([&base, &secondary, &overlay]);
        assert_eq!(frame.lit_count(), 16);
    }

    #[test]
    fn test_draw_text_returns_advance() {
        let font = FixedWidthFont::new(3, 5);
        let mut canvas = Canvas::new(32, 8, true).unwrap();
        let advance = canvas.draw_text(&font, "ab c", 1, 1, true);

        assert!((advance - 12.0).abs() < f32::EPSILON);
        assert!(canvas.is_lit(1, 1));
        assert!(canvas.is_lit(2, 5));
        // space glyph leaves its cell empty
        assert!(!canvas.is_lit(7, 2));
    }

    #[test]
    fn test_zero_sized_region_is_ignored() {
        let mut canvas = Canvas::new(4, 4, true).unwrap();
        canvas.fill_region(Region::new(1, 1, 0, 3), true);
        assert!(!canvas.is_lit(1, 1));
    }
}
