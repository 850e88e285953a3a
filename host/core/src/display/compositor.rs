//! The compositor: sole owner of the layer buffers
//!
//! A [`Compositor`] applies [`DisplayCommand`]s to its three canvases and
//! pushes the flattened result to the device when something changed. It is
//! driven by exactly one consumer (see [`super::run`]); nothing else holds a
//! reference to the canvases.

use std::ops::ControlFlow;

use tracing::{trace, warn};

use super::canvas::{Canvas, CompositeBuffer};
use super::command::{DisplayCommand, Layer, Region};
use super::device::SharedDevice;
use super::font::{FontFace, FontId, FontSet};
use super::layout::{
    layout_highlighted, wrap_text, HighlightLayout, LayoutLine, Piece, HIGHLIGHT_PAD,
};
use super::{DisplayError, ScreenSize};

/// Gap between the screen edge, the title and the body
pub const SCREEN_PADDING: i32 = 2;

const CURSOR_WIDTH: u32 = 1;

#[derive(Debug)]
struct Cursor {
    global_enabled: bool,
    app_enabled: bool,
    on: bool,
    x: i32,
    y: i32,
    prev: (i32, i32),
    height: u32,
}

impl Cursor {
    fn active(&self) -> bool {
        self.global_enabled && self.app_enabled
    }

    fn rect_at(&self, (x, y): (i32, i32)) -> Region {
        Region::new(x + 1, y, CURSOR_WIDTH, self.height)
    }

    fn rect(&self) -> Region {
        self.rect_at((self.x, self.y))
    }
}

/// Layered framebuffer plus cursor state
pub struct Compositor {
    size: ScreenSize,
    base: Canvas,
    secondary: Canvas,
    overlay: Canvas,
    composite: CompositeBuffer,
    fonts: FontSet,
    device: SharedDevice,
    cursor: Cursor,
    dirty: bool,
}

impl Compositor {
    /// Create a compositor sized to the device
    ///
    /// # Errors
    ///
    /// Returns `DisplayError::InvalidSize` if the device reports a zero size.
    pub fn new(device: SharedDevice, fonts: FontSet) -> Result<Self, DisplayError> {
        let (width, height) = device.lock().size();
        let cursor_height = fonts.line_height(FontId::Small);
        Ok(Self {
            size: ScreenSize { width, height },
            base: Canvas::new(width, height, true)?,
            secondary: Canvas::new(width, height, false)?,
            overlay: Canvas::new(width, height, false)?,
            composite: CompositeBuffer::new(width, height)?,
            fonts,
            device,
            cursor: Cursor {
                global_enabled: true,
                app_enabled: false,
                on: false,
                x: 0,
                y: 0,
                prev: (0, 0),
                height: cursor_height,
            },
            // first render pushes the blank screen
            dirty: true,
        })
    }

    /// Screen dimensions
    #[must_use]
    pub fn size(&self) -> ScreenSize {
        self.size
    }

    /// Whether a render would push a new frame
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the cursor is currently drawn lit
    #[must_use]
    pub fn cursor_shown(&self) -> bool {
        self.cursor.active() && self.cursor.on
    }

    /// Current cursor position
    #[must_use]
    pub fn cursor_position(&self) -> (i32, i32) {
        (self.cursor.x, self.cursor.y)
    }

    /// Apply one command. Returns `Break` for [`DisplayCommand::Shutdown`].
    pub fn apply(&mut self, command: DisplayCommand) -> ControlFlow<()> {
        trace!(command = command.kind(), "Applying display command");
        match command {
            DisplayCommand::ClearLayer(layer) => {
                self.canvas_mut(layer).clear();
                self.dirty = true;
                match layer {
                    Layer::Base | Layer::Secondary => self.render_logged(true),
                    Layer::Overlay => {}
                }
            }
            DisplayCommand::ClearRegion { layer, region } => {
                self.canvas_mut(layer).fill_region(region, false);
                self.dirty = true;
            }
            DisplayCommand::DrawText {
                layer,
                font,
                text,
                x,
                y,
            } => {
                let face = self.fonts.get(font);
                match layer {
                    Layer::Base => self.base.draw_text(face, &text, x, y, true),
                    Layer::Secondary => self.secondary.draw_text(face, &text, x, y, true),
                    Layer::Overlay => self.overlay.draw_text(face, &text, x, y, true),
                };
                self.dirty = true;
            }
            DisplayCommand::DrawImage {
                layer,
                bitmap,
                x,
                y,
            } => {
                self.canvas_mut(layer).draw_bitmap(&bitmap, x, y);
                self.dirty = true;
            }
            DisplayCommand::SetScreen { title, body } => {
                self.set_screen(&title, &body, false);
                self.render_logged(true);
            }
            DisplayCommand::SetHighlightScreen { title, body } => {
                self.set_screen(&title, &body, true);
                self.render_logged(true);
            }
            DisplayCommand::SetCursorEnabled(enabled) => {
                self.cursor.global_enabled = enabled;
                self.cursor_flags_changed();
            }
            DisplayCommand::SetAppCursorEnabled(enabled) => {
                self.cursor.app_enabled = enabled;
                self.cursor_flags_changed();
            }
            DisplayCommand::SetCursorPosition { x, y } => self.move_cursor(x, y),
            DisplayCommand::ClearCursorArea => {
                let (current, previous) = (self.cursor.rect(), self.cursor.rect_at(self.cursor.prev));
                self.secondary.fill_region(current, false);
                self.secondary.fill_region(previous, false);
                self.cursor.on = false;
                self.dirty = true;
            }
            DisplayCommand::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Toggle the cursor if both enable flags are set
    pub fn blink(&mut self) {
        if !self.cursor.active() {
            return;
        }
        self.cursor.on = !self.cursor.on;
        let rect = self.cursor.rect();
        self.secondary.fill_region(rect, self.cursor.on);
        self.dirty = true;
    }

    /// Flatten the layers and push the frame to the device.
    ///
    /// Does nothing unless something changed or `force` is set. Returns
    /// whether a frame was pushed.
    ///
    /// # Errors
    ///
    /// Returns the device error if the frame could not be shown.
    pub fn render(&mut self, force: bool) -> Result<bool, DisplayError> {
        if !self.dirty && !force {
            return Ok(false);
        }
        let frame = self
            .composite
            .flatten([&self.base, &self.secondary, &self.overlay]);
        self.device.lock().show(&frame)?;
        self.dirty = false;
        Ok(true)
    }

    pub(crate) fn render_logged(&mut self, force: bool) {
        if let Err(e) = self.render(force) {
            warn!(error = %e, "Failed to push frame to display");
        }
    }

    fn canvas_mut(&mut self, layer: Layer) -> &mut Canvas {
        match layer {
            Layer::Base => &mut self.base,
            Layer::Secondary => &mut self.secondary,
            Layer::Overlay => &mut self.overlay,
        }
    }

    fn cursor_flags_changed(&mut self) {
        if self.cursor.active() {
            return;
        }
        let (current, previous) = (self.cursor.rect(), self.cursor.rect_at(self.cursor.prev));
        self.secondary.fill_region(current, false);
        self.secondary.fill_region(previous, false);
        self.cursor.on = false;
        self.dirty = true;
    }

    fn move_cursor(&mut self, x: i32, y: i32) {
        if (x, y) == (self.cursor.x, self.cursor.y) {
            return;
        }
        let old = self.cursor.rect();
        self.secondary.fill_region(old, false);
        self.cursor.prev = (self.cursor.x, self.cursor.y);
        self.cursor.x = x;
        self.cursor.y = y;
        if self.cursor_shown() {
            let rect = self.cursor.rect();
            self.secondary.fill_region(rect, true);
        }
        self.dirty = true;
    }

    fn set_screen(&mut self, title: &str, body: &str, highlights: bool) {
        self.base.clear();
        self.secondary.clear();
        self.cursor.on = false;

        let font = self.fonts.get(FontId::Small);
        let line_height = font.line_height() as i32;
        let width = self.size.width as i32;

        let title_width = font.measure(title).ceil() as i32;
        let title_x = (width - title_width) / 2;
        self.base
            .draw_text(font, title, title_x, SCREEN_PADDING, true);

        let start_y = SCREEN_PADDING + line_height + SCREEN_PADDING;
        let max_lines = ((self.size.height as i32 - start_y) / line_height.max(1)).max(0) as usize;
        let max_width = (width - 4) as f32;
        let layout = if highlights {
            layout_highlighted(body, font, max_width)
        } else {
            plain_layout(body, font, max_width)
        };

        let mut cursor = (0, start_y);
        for (i, line) in layout.lines.iter().take(max_lines).enumerate() {
            let y = start_y + i as i32 * line_height;
            for piece in &line.pieces {
                let x = piece.x.round() as i32;
                if piece.highlighted {
                    let block = Region::new(x, y, piece.width.round() as u32, line_height as u32);
                    self.base.fill_region(block, true);
                    let text_x = (piece.x + HIGHLIGHT_PAD).round() as i32;
                    self.base.draw_text(font, &piece.text, text_x, y, false);
                } else {
                    self.base.draw_text(font, &piece.text, x, y, true);
                }
            }
            cursor = (line.width.round() as i32, y);
        }

        self.cursor.prev = (self.cursor.x, self.cursor.y);
        (self.cursor.x, self.cursor.y) = cursor;
        self.dirty = true;
    }
}

/// Word-wrapped body with every line as a single unhighlighted piece
fn plain_layout(body: &str, font: &dyn FontFace, max_width: f32) -> HighlightLayout {
    let lines = wrap_text(body, font, max_width)
        .into_iter()
        .map(|text| {
            let width = font.measure(&text);
            LayoutLine {
                pieces: vec![Piece {
                    text,
                    highlighted: false,
                    x: 0.0,
                    width,
                }],
                width,
            }
        })
        .collect();
    HighlightLayout { lines }
}
