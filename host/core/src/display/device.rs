//! Physical (or emulated) display devices
//!
//! The compositor pushes finished [`Frame`]s to a [`DisplayDevice`]. Panel
//! drivers live outside this crate; [`MemoryDisplay`] is the headless device
//! used for tests and for running without a screen.

use std::sync::Arc;

use parking_lot::Mutex;

use super::DisplayError;

/// A flattened monochrome frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

impl Frame {
    /// Blank frame
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; (width * height) as usize],
        }
    }

    pub(crate) fn from_pixels(width: u32, height: u32, pixels: Vec<bool>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
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

    /// Whether (x, y) is lit; out of range is unlit
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.pixels[(y * self.width + x) as usize]
    }

    /// Number of lit pixels in the whole frame
    #[must_use]
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }

    /// Number of lit pixels inside a rectangle (clipped)
    #[must_use]
    pub fn lit_in(&self, x: u32, y: u32, width: u32, height: u32) -> usize {
        let x_end = (x + width).min(self.width);
        let y_end = (y + height).min(self.height);
        (y.min(y_end)..y_end)
            .flat_map(|py| (x.min(x_end)..x_end).map(move |px| (px, py)))
            .filter(|(px, py)| self.get(*px, *py))
            .count()
    }

    /// Iterate rows of pixels
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks(self.width.max(1) as usize)
    }
}

/// Output device for composited frames
pub trait DisplayDevice: Send {
    /// Panel size in pixels
    fn size(&self) -> (u32, u32);

    /// Push a frame to the panel
    ///
    /// # Errors
    ///
    /// Returns `DisplayError::Device` if the panel rejects the frame.
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Set panel contrast/brightness
    ///
    /// # Errors
    ///
    /// Returns `DisplayError::Device` if the panel rejects the command.
    fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
        let _ = level;
        Ok(())
    }
}

/// Device shared between the compositor and device-level callers.
///
/// Anything touching the device outside the compositor must hold this lock.
pub type SharedDevice = Arc<Mutex<Box<dyn DisplayDevice>>>;

/// Wrap a device for sharing
pub fn share(device: impl DisplayDevice + 'static) -> SharedDevice {
    Arc::new(Mutex::new(Box::new(device)))
}

#[derive(Debug, Default)]
struct LogInner {
    frames: Vec<Frame>,
    contrast: Option<u8>,
}

/// Cloneable view of everything a [`MemoryDisplay`] received
#[derive(Clone, Debug, Default)]
pub struct FrameLog {
    inner: Arc<Mutex<LogInner>>,
}

impl FrameLog {
    /// Number of frames shown so far
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Most recent frame
    #[must_use]
    pub fn last(&self) -> Option<Frame> {
        self.inner.lock().frames.last().cloned()
    }

    /// All frames in the order they were shown
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.inner.lock().frames.clone()
    }

    /// Last contrast level set
    #[must_use]
    pub fn contrast(&self) -> Option<u8> {
        self.inner.lock().contrast
    }
}

/// Headless display that records frames in memory
#[derive(Debug)]
pub struct MemoryDisplay {
    width: u32,
    height: u32,
    log: FrameLog,
    history: usize,
}

impl MemoryDisplay {
    /// Frames kept before the oldest are dropped
    pub const DEFAULT_HISTORY: usize = 4096;

    /// Create a headless display and the log that observes it
    #[must_use]
    pub fn new(width: u32, height: u32) -> (Self, FrameLog) {
        let log = FrameLog::default();
        (
            Self {
                width,
                height,
                log: log.clone(),
                history: Self::DEFAULT_HISTORY,
            },
            log,
        )
    }
}

impl DisplayDevice for MemoryDisplay {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let mut inner = self.log.inner.lock();
        if inner.frames.len() >= self.history {
            inner.frames.remove(0);
        }
        inner.frames.push(frame.clone());
        Ok(())
    }

    fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
        self.log.inner.lock().contrast = Some(level);
        Ok(())
    }
}
