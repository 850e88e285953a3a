//! Display command vocabulary
//!
//! Every change to what is on screen travels through one of these values.
//! Producers (app workers, the speech engine, the input loop) enqueue them on
//! a [`DisplayHandle`](super::DisplayHandle); the compositor applies them in
//! enqueue order.

use std::sync::Arc;

use super::bitmap::Bitmap;
use super::font::FontId;

/// One of the three compositor layers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Static screen content; opaque
    Base,
    /// Transient content such as the blinking cursor; transparent where unset
    Secondary,
    /// Short-lived status icons and bars; transparent where unset
    Overlay,
}

/// Rectangular area in screen pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Region {
    /// Create a new region
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A draw or state command for the compositor
#[derive(Clone, Debug)]
pub enum DisplayCommand {
    /// Clear a whole layer. Clearing `Base` or `Secondary` renders immediately.
    ClearLayer(Layer),
    /// Clear a rectangle on a layer
    ClearRegion {
        /// Target layer
        layer: Layer,
        /// Area to clear
        region: Region,
    },
    /// Draw one line of text with its top-left corner at (x, y)
    DrawText {
        /// Target layer
        layer: Layer,
        /// Font slot
        font: FontId,
        /// Text to draw
        text: String,
        /// Left edge
        x: i32,
        /// Top edge
        y: i32,
    },
    /// Paste a bitmap (its set pixels only)
    DrawImage {
        /// Target layer
        layer: Layer,
        /// Image to paste
        bitmap: Arc<Bitmap>,
        /// Left edge
        x: i32,
        /// Top edge
        y: i32,
    },
    /// Replace the screen with a centred title and a wrapped body.
    ///
    /// The body is drawn literally, brackets included.
    SetScreen {
        /// Title line
        title: String,
        /// Body text
        body: String,
    },
    /// Like [`DisplayCommand::SetScreen`], but `[bracketed]` spans in the
    /// body are drawn as inverted blocks without their brackets.
    SetHighlightScreen {
        /// Title line
        title: String,
        /// Body text with highlight markers
        body: String,
    },
    /// Global cursor switch
    SetCursorEnabled(bool),
    /// Cursor switch for the foreground app
    SetAppCursorEnabled(bool),
    /// Move the cursor
    SetCursorPosition {
        /// Left edge of the cursor cell
        x: i32,
        /// Top edge of the cursor cell
        y: i32,
    },
    /// Blank the current and previous cursor rectangles
    ClearCursorArea,
    /// Stop the compositor after rendering a final frame
    Shutdown,
}

impl DisplayCommand {
    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClearLayer(_) => "clear_layer",
            Self::ClearRegion { .. } => "clear_region",
            Self::DrawText { .. } => "draw_text",
            Self::DrawImage { .. } => "draw_image",
            Self::SetScreen { .. } => "set_screen",
            Self::SetHighlightScreen { .. } => "set_highlight_screen",
            Self::SetCursorEnabled(_) => "set_cursor_enabled",
            Self::SetAppCursorEnabled(_) => "set_app_cursor_enabled",
            Self::SetCursorPosition { .. } => "set_cursor_position",
            Self::ClearCursorArea => "clear_cursor_area",
            Self::Shutdown => "shutdown",
        }
    }
}
