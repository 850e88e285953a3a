//! Input device seam
//!
//! OS bindings implement [`DeviceEnumerator`] and [`InputDevice`]; the
//! subsystem only sees key transitions and the two error classes it cares
//! about.

use std::io;

use thiserror::Error;

use super::keys::KeyId;

/// Errors reading from an input device
#[derive(Debug, Error)]
pub enum InputError {
    /// The device went away (ENODEV); the subsystem rediscovers
    #[error("Input device disconnected")]
    Disconnected,

    /// Any other IO failure; fatal
    #[error("Input device error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for InputError {
    fn from(e: io::Error) -> Self {
        if e.raw_os_error() == Some(libc::ENODEV) {
            Self::Disconnected
        } else {
            Self::Io(e)
        }
    }
}

/// Raw key state as reported by the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    /// Released
    Up,
    /// Pressed
    Down,
    /// OS auto-repeat
    Repeat,
}

impl KeyState {
    /// Decode the Linux event value (0 up, 1 down, 2 repeat)
    #[must_use]
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// One raw key transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Key name
    pub key: KeyId,
    /// Transition
    pub state: KeyState,
}

impl RawKeyEvent {
    /// Build an event
    #[must_use]
    pub fn new(key: impl Into<KeyId>, state: KeyState) -> Self {
        Self {
            key: key.into(),
            state,
        }
    }
}

/// An opened input device
pub trait InputDevice: Send {
    /// Device name as reported by the OS
    fn name(&self) -> &str;

    /// Whether this is a pointer device (never selected as the keyboard)
    fn is_pointer(&self) -> bool {
        let name = self.name().to_lowercase();
        name.contains("mouse") || name.contains("touchpad")
    }

    /// Block for the next batch of key transitions.
    ///
    /// Implementations should return (possibly empty) within a bounded time
    /// so the caller can observe shutdown.
    ///
    /// # Errors
    ///
    /// `InputError::Disconnected` when the device is gone, `InputError::Io`
    /// for anything else.
    fn read_batch(&mut self) -> Result<Vec<RawKeyEvent>, InputError>;
}

/// Lists the input devices currently attached
pub trait DeviceEnumerator: Send {
    /// Open every device that can be opened
    ///
    /// # Errors
    ///
    /// Returns an error if the device list itself cannot be read.
    fn enumerate(&mut self) -> Result<Vec<Box<dyn InputDevice>>, InputError>;
}

/// Keyboard heuristic: first non-pointer device whose name mentions "keyboard"
#[must_use]
pub fn pick_keyboard(devices: Vec<Box<dyn InputDevice>>) -> Option<Box<dyn InputDevice>> {
    devices.into_iter().find(|device| {
        if device.is_pointer() {
            tracing::debug!(device = device.name(), "Skipping pointer device");
            return false;
        }
        device.name().to_lowercase().contains("keyboard")
    })
}
