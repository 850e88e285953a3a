//! Font handles and text measurement
//!
//! Apps never hold font objects directly in draw commands; they refer to one
//! of the five [`FontId`] slots and the compositor resolves it against the
//! shared [`FontSet`]. The same set backs the measurement function apps use
//! to lay out text before enqueuing it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use thiserror::Error;

/// Errors that can occur when loading fonts
#[derive(Debug, Error)]
pub enum FontError {
    /// Font file could not be read
    #[error("Failed to read font file at {path}: {source}")]
    Read {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Font file is not a usable TrueType/OpenType font
    #[error("Invalid font data in {path}")]
    Invalid {
        /// The offending file
        path: PathBuf,
    },
}

/// A rasterizable typeface at a fixed pixel size
pub trait FontFace: Send + Sync {
    /// Horizontal advance of a single character in pixels
    fn advance(&self, ch: char) -> f32;

    /// Distance from the top of a line to the baseline
    fn ascent(&self) -> f32;

    /// Height of one line of text in pixels
    fn line_height(&self) -> u32;

    /// Rasterize `ch` with its advance box starting at (`x`, `top`).
    ///
    /// `plot` is called once per lit pixel.
    fn rasterize(&self, ch: char, x: f32, top: f32, plot: &mut dyn FnMut(i32, i32));

    /// Width of `text` in pixels (sum of advances)
    fn measure(&self, text: &str) -> f32 {
        text.chars().map(|c| self.advance(c)).sum()
    }
}

/// TrueType/OpenType font rendered monochrome through `ab_glyph`
pub struct TrueTypeFont {
    font: FontArc,
    scale: PxScale,
}

impl TrueTypeFont {
    /// Load a font file at the given pixel size
    ///
    /// # Errors
    ///
    /// Returns `FontError::Read` if the file cannot be read and
    /// `FontError::Invalid` if it does not parse as a font.
    pub fn from_file(path: &Path, px: f32) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontArc::try_from_vec(data).map_err(|_| FontError::Invalid {
            path: path.to_path_buf(),
        })?;
        Ok(Self {
            font,
            scale: PxScale::from(px),
        })
    }
}

impl FontFace for TrueTypeFont {
    fn advance(&self, ch: char) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        scaled.h_advance(scaled.glyph_id(ch))
    }

    fn ascent(&self) -> f32 {
        self.font.as_scaled(self.scale).ascent()
    }

    fn line_height(&self) -> u32 {
        // height() is ascent - descent; descent is negative
        self.font.as_scaled(self.scale).height().ceil().max(1.0) as u32
    }

    fn rasterize(&self, ch: char, x: f32, top: f32, plot: &mut dyn FnMut(i32, i32)) {
        let scaled = self.font.as_scaled(self.scale);
        let glyph = scaled
            .glyph_id(ch)
            .with_scale_and_position(self.scale, point(x, top + scaled.ascent()));

        if let Some(outlined) = self.font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            let (ox, oy) = (bounds.min.x as i32, bounds.min.y as i32);
            outlined.draw(|gx, gy, coverage| {
                if coverage >= 0.5 {
                    plot(ox + gx as i32, oy + gy as i32);
                }
            });
        }
    }
}

/// Named font slot used by display commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontId {
    /// Compact font used for titles and status screens
    Small,
    /// Default body font
    Regular,
    /// Bold body font
    Bold,
    /// Large display font
    Large,
    /// Large bold display font
    LargeBold,
}

/// The five font handles shared by the compositor and every app
#[derive(Clone)]
pub struct FontSet {
    small: Arc<dyn FontFace>,
    regular: Arc<dyn FontFace>,
    bold: Arc<dyn FontFace>,
    large: Arc<dyn FontFace>,
    large_bold: Arc<dyn FontFace>,
}

impl FontSet {
    /// Build a set from individual faces
    #[must_use]
    pub fn new(
        small: Arc<dyn FontFace>,
        regular: Arc<dyn FontFace>,
        bold: Arc<dyn FontFace>,
        large: Arc<dyn FontFace>,
        large_bold: Arc<dyn FontFace>,
    ) -> Self {
        Self {
            small,
            regular,
            bold,
            large,
            large_bold,
        }
    }

    /// Use the same face for every slot
    #[must_use]
    pub fn uniform(face: Arc<dyn FontFace>) -> Self {
        Self::new(
            Arc::clone(&face),
            Arc::clone(&face),
            Arc::clone(&face),
            Arc::clone(&face),
            face,
        )
    }

    /// Load the appliance font files.
    ///
    /// Body fonts are 12 px, large fonts 24 px, the small font 8 px.
    ///
    /// # Errors
    ///
    /// Returns the first font that fails to load.
    pub fn load(regular: &Path, bold: &Path, small: &Path) -> Result<Self, FontError> {
        Ok(Self::new(
            Arc::new(TrueTypeFont::from_file(small, 8.0)?),
            Arc::new(TrueTypeFont::from_file(regular, 12.0)?),
            Arc::new(TrueTypeFont::from_file(bold, 12.0)?),
            Arc::new(TrueTypeFont::from_file(regular, 24.0)?),
            Arc::new(TrueTypeFont::from_file(bold, 24.0)?),
        ))
    }

    /// Resolve a font slot
    #[must_use]
    pub fn get(&self, id: FontId) -> &dyn FontFace {
        match id {
            FontId::Small => self.small.as_ref(),
            FontId::Regular => self.regular.as_ref(),
            FontId::Bold => self.bold.as_ref(),
            FontId::Large => self.large.as_ref(),
            FontId::LargeBold => self.large_bold.as_ref(),
        }
    }

    /// Measure `text` in the given font, rounded up to whole pixels
    #[must_use]
    pub fn measure(&self, id: FontId, text: &str) -> u32 {
        self.get(id).measure(text).ceil() as u32
    }

    /// Line height of the given font
    #[must_use]
    pub fn line_height(&self, id: FontId) -> u32 {
        self.get(id).line_height()
    }
}

impl fmt::Debug for FontSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontSet")
            .field("small_line_height", &self.small.line_height())
            .field("regular_line_height", &self.regular.line_height())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedWidthFont;

    #[test]
    fn test_missing_font_file_is_read_error() {
        let err = TrueTypeFont::from_file(Path::new("/nonexistent/font.ttf"), 12.0)
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, FontError::Read { .. }));
    }

    #[test]
    fn test_garbage_font_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();

        let err = TrueTypeFont::from_file(&path, 12.0).err().unwrap();
        assert!(matches!(err, FontError::Invalid { .. }));
    }

    #[test]
    fn test_font_set_measure_rounds_up() {
        let fonts = FontSet::uniform(Arc::new(FixedWidthFont::new(3, 5)));
        assert_eq!(fonts.measure(FontId::Small, "abcd"), 12);
        assert_eq!(fonts.measure(FontId::Large, ""), 0);
        assert_eq!(fonts.line_height(FontId::Bold), 5);
    }
}
