//! Input Subsystem
//!
//! Discovers the keyboard, survives disconnects and turns raw transitions
//! into `key_down`/`key_up` calls on a [`KeyEventSink`]:
//!
//! - duplicate downs (auto-repeat) are suppressed by the [`KeyTracker`],
//! - keys are remapped through the [`ShiftTable`] while shift is held,
//! - ENODEV sends the loop back to discovery, other IO errors end it.

mod device;
#[cfg(feature = "evdev")]
mod evdev_backend;
mod keys;
mod subsystem;
mod tracker;

pub use device::{pick_keyboard, DeviceEnumerator, InputDevice, InputError, KeyState, RawKeyEvent};
#[cfg(feature = "evdev")]
pub use evdev_backend::{EvdevDevice, EvdevEnumerator};
pub use keys::{key_char, KeyId, ShiftTable, DEFAULT_SHIFT_KEY};
pub use subsystem::{InputConfig, InputSubsystem, KeyEventSink};
pub use tracker::{KeyTracker, KeyTransition};
