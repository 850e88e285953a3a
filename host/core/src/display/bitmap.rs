//! Monochrome bitmaps (icons)

use std::path::Path;

use tiny_skia::Pixmap;

use super::DisplayError;

/// A 1-bit image. Set pixels are drawn lit, unset pixels are transparent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Bitmap {
    /// Create a blank bitmap
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width * height) as usize],
        }
    }

    /// Build a bitmap from ASCII art rows; `#` is lit, anything else is unset.
    ///
    /// Rows shorter than the widest row are padded with unset pixels.
    #[must_use]
    pub fn from_ascii(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let mut bitmap = Self::new(width, rows.len() as u32);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                bitmap.set(x as u32, y as u32, ch == '#');
            }
        }
        bitmap
    }

    /// Load a PNG and threshold it to monochrome.
    ///
    /// A pixel is lit when it is mostly opaque and its luminance is at least half.
    ///
    /// # Errors
    ///
    /// Returns `DisplayError::Image` if the file cannot be decoded.
    pub fn load_png(path: &Path) -> Result<Self, DisplayError> {
        let pixmap = Pixmap::load_png(path).map_err(|e| DisplayError::Image {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut bitmap = Self::new(pixmap.width(), pixmap.height());
        for (idx, px) in pixmap.pixels().iter().enumerate() {
            let color = px.demultiply();
            let luma = (u32::from(color.red()) * 299
                + u32::from(color.green()) * 587
                + u32::from(color.blue()) * 114)
                / 1000;
            bitmap.bits[idx] = color.alpha() >= 128 && luma >= 128;
        }
        Ok(bitmap)
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel at (x, y) is set; out of range is unset
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    /// Set or clear a pixel; out of range writes are ignored
    pub fn set(&mut self, x: u32, y: u32, lit: bool) {
        if x < self.width && y < self.height {
            self.bits[(y * self.width + x) as usize] = lit;
        }
    }

    /// Iterate over the coordinates of all set pixels
    pub fn lit_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, lit)| **lit)
            .map(move |(idx, _)| (idx as u32 % self.width, idx as u32 / self.width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ascii_pads_short_rows() {
        let bmp = Bitmap::from_ascii(&["#.#", "#"]);
        assert_eq!((bmp.width(), bmp.height()), (3, 2));
        assert!(bmp.get(0, 0));
        assert!(!bmp.get(1, 0));
        assert!(bmp.get(2, 0));
        assert!(bmp.get(0, 1));
        assert!(!bmp.get(2, 1));
        assert_eq!(bmp.lit_pixels().count(), 3);
    }

    #[test]
    fn test_png_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.png");

        let mut pixmap = Pixmap::new(2, 1).unwrap();
        pixmap.fill(tiny_skia::Color::BLACK);
        pixmap.pixels_mut()[1] = tiny_skia::Color::WHITE.premultiply().to_color_u8();
        pixmap.save_png(&path).unwrap();

        let bmp = Bitmap::load_png(&path).unwrap();
        assert!(!bmp.get(0, 0));
        assert!(bmp.get(1, 0));
    }

    #[test]
    fn test_missing_png_is_image_error() {
        let err = Bitmap::load_png(Path::new("/nonexistent/icon.png")).unwrap_err();
        assert!(matches!(err, DisplayError::Image { .. }));
    }
}
