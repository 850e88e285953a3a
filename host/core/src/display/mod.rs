//! Display Compositor
//!
//! Serializes draw requests from every app worker, the speech engine and the
//! input loop into one framebuffer.
//!
//! # Architecture
//!
//! ```text
//!   app workers ─┐
//!   speech ──────┼── DisplayHandle ──► mpsc queue ──► Compositor (display thread)
//!   input ───────┘        │                            │ base / secondary / overlay
//!                         │                            ▼
//!                         └── set_contrast ──► SharedDevice ◄── show(Frame)
//! ```
//!
//! Producers only ever hold a [`DisplayHandle`]. The layer buffers are owned
//! by the [`Compositor`] and mutated on its thread alone; the device itself is
//! behind a lock because contrast changes reach it directly.

mod bitmap;
mod canvas;
mod command;
mod compositor;
mod device;
mod font;
mod icons;
mod layout;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

pub use bitmap::Bitmap;
pub use command::{DisplayCommand, Layer, Region};
pub use compositor::{Compositor, SCREEN_PADDING};
pub use device::{share, DisplayDevice, Frame, FrameLog, MemoryDisplay, SharedDevice};
pub use font::{FontError, FontFace, FontId, FontSet, TrueTypeFont};
pub use icons::{StatusIcons, ICON_SIZE};
pub use layout::{layout_highlighted, wrap_text, HighlightLayout, LayoutLine, Piece, HIGHLIGHT_PAD};
pub use worker::{run, spawn, DisplayTiming, DisplayWorker};

/// Errors raised by the display stack
#[derive(Debug, Error)]
pub enum DisplayError {
    /// A canvas could not be allocated at this size
    #[error("Invalid display size {width}x{height}")]
    InvalidSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// An image could not be loaded
    #[error("Failed to load image {path}: {reason}")]
    Image {
        /// Image file
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// The panel rejected a frame or command
    #[error("Display device error: {0}")]
    Device(String),

    /// The compositor thread could not be started
    #[error("Failed to spawn display thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Screen dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSize {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Producer side of the display queue
#[derive(Clone)]
pub struct DisplayHandle {
    tx: mpsc::UnboundedSender<DisplayCommand>,
    device: SharedDevice,
    size: ScreenSize,
}

impl DisplayHandle {
    /// Create a handle and the receiver its commands arrive on
    #[must_use]
    pub fn channel(device: SharedDevice) -> (Self, mpsc::UnboundedReceiver<DisplayCommand>) {
        let (width, height) = device.lock().size();
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                device,
                size: ScreenSize { width, height },
            },
            rx,
        )
    }

    /// Screen dimensions
    #[must_use]
    pub fn size(&self) -> ScreenSize {
        self.size
    }

    /// Enqueue a command. Returns false if the compositor has stopped.
    pub fn send(&self, command: DisplayCommand) -> bool {
        let kind = command.kind();
        if self.tx.send(command).is_err() {
            debug!(command = kind, "Display compositor gone, dropping command");
            return false;
        }
        true
    }

    /// Clear a whole layer
    pub fn clear_layer(&self, layer: Layer) {
        self.send(DisplayCommand::ClearLayer(layer));
    }

    /// Clear a rectangle on a layer
    pub fn clear_region(&self, layer: Layer, x: i32, y: i32, width: u32, height: u32) {
        self.send(DisplayCommand::ClearRegion {
            layer,
            region: Region::new(x, y, width, height),
        });
    }

    /// Draw a line of text
    pub fn draw_text(&self, layer: Layer, font: FontId, text: impl Into<String>, x: i32, y: i32) {
        self.send(DisplayCommand::DrawText {
            layer,
            font,
            text: text.into(),
            x,
            y,
        });
    }

    /// Paste a bitmap
    pub fn draw_image(&self, layer: Layer, bitmap: Arc<Bitmap>, x: i32, y: i32) {
        self.send(DisplayCommand::DrawImage {
            layer,
            bitmap,
            x,
            y,
        });
    }

    /// Replace the screen with a title and body
    pub fn set_screen(&self, title: impl Into<String>, body: impl Into<String>) {
        self.send(DisplayCommand::SetScreen {
            title: title.into(),
            body: body.into(),
        });
    }

    /// Replace the screen with a title and a body carrying `[highlight]` spans
    pub fn set_highlight_screen(&self, title: impl Into<String>, body: impl Into<String>) {
        self.send(DisplayCommand::SetHighlightScreen {
            title: title.into(),
            body: body.into(),
        });
    }

    /// Global cursor switch
    pub fn set_cursor_enabled(&self, enabled: bool) {
        self.send(DisplayCommand::SetCursorEnabled(enabled));
    }

    /// Foreground app cursor switch
    pub fn set_app_cursor_enabled(&self, enabled: bool) {
        self.send(DisplayCommand::SetAppCursorEnabled(enabled));
    }

    /// Move the cursor
    pub fn set_cursor_position(&self, x: i32, y: i32) {
        self.send(DisplayCommand::SetCursorPosition { x, y });
    }

    /// Blank the cursor rectangles
    pub fn clear_cursor_area(&self) {
        self.send(DisplayCommand::ClearCursorArea);
    }

    /// Ask the compositor to exit
    pub fn shutdown(&self) {
        self.send(DisplayCommand::Shutdown);
    }

    /// Set panel contrast.
    ///
    /// This bypasses the queue and goes straight to the device under its lock.
    ///
    /// # Errors
    ///
    /// Returns the device error.
    pub fn set_contrast(&self, level: u8) -> Result<(), DisplayError> {
        self.device.lock().set_contrast(level)
    }
}

impl std::fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayHandle")
            .field("size", &self.size)
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

/// Build a compositor for `device`, run it on its own thread and return the
/// handle producers use.
///
/// # Errors
///
/// Returns an error if the compositor cannot be created or its thread fails
/// to start.
pub fn start(
    device: SharedDevice,
    fonts: FontSet,
    timing: DisplayTiming,
) -> Result<(DisplayHandle, DisplayWorker), DisplayError> {
    let compositor = Compositor::new(Arc::clone(&device), fonts)?;
    let (handle, rx) = DisplayHandle::channel(device);
    let worker = spawn(compositor, rx, timing)?;
    Ok((handle, worker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_after_close_is_noop() {
        let (display, _log) = MemoryDisplay::new(16, 8);
        let (handle, rx) = DisplayHandle::channel(share(display));
        assert_eq!(handle.size(), ScreenSize { width: 16, height: 8 });
        drop(rx);
        assert!(!handle.send(DisplayCommand::ClearCursorArea));
    }

    #[test]
    fn test_contrast_goes_to_device() {
        let (display, log) = MemoryDisplay::new(16, 8);
        let (handle, _rx) = DisplayHandle::channel(share(display));
        handle.set_contrast(200).unwrap();
        assert_eq!(log.contrast(), Some(200));
    }
}
