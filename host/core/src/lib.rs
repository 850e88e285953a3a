//! Proxi Core - runtime host for a small keyboard-driven appliance
//!
//! Hosts pluggable apps on a monochrome panel with speech output. The crate
//! has no terminal or UI dependencies; device backends plug in through
//! traits and the daemon wires them together.
//!
//! # Architecture
//!
//! ```text
//!  keyboard ──► InputSubsystem ──KeyEventSink──► AppManager ──► AppUnit hooks
//!                     │                              │              │
//!                     │ status screens               │ tick threads │ DisplayHandle
//!                     ▼                              ▼              ▼
//!               ┌──────────────────────────────────────────────────────┐
//!               │  display queue ──► Compositor ──► DisplayDevice       │
//!               └──────────────────────────────────────────────────────┘
//!                                          ▲
//!  AppUnit ──Speaker──► SpeechEngine ──────┘ status icons
//!                           │
//!                           ├── SpeechCache (sha256 keyed raw PCM)
//!                           ├── Synthesizer (long-lived external process)
//!                           └── AudioSink (aplay)
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: TOML + environment configuration
//! - [`display`]: Layered compositor, fonts, bitmaps and display devices
//! - [`input`]: Keyboard discovery, edge detection and shift remapping
//! - [`lifecycle`]: App registry, manager, tick workers and control task
//! - [`speech`]: Cached text-to-speech through an external synthesizer
//! - [`testing`]: Doubles for every seam above

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod display;
pub mod input;
pub mod lifecycle;
pub mod speech;
pub mod testing;

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DisplayBackend, HostConfig, HostToml,
};

// Display exports
pub use display::{
    Bitmap, DisplayCommand, DisplayDevice, DisplayError, DisplayHandle, FontId, FontSet, Frame,
    Layer, MemoryDisplay, ScreenSize, StatusIcons,
};

// Input exports
pub use input::{
    DeviceEnumerator, InputConfig, InputDevice, InputError, InputSubsystem, KeyEventSink, KeyId,
    ShiftTable,
};

// Lifecycle exports
pub use lifecycle::{
    AppDescriptor, AppEvent, AppKind, AppManager, AppRegistry, AppServices, AppUnit,
    ControlHandle, HookResult, LifecycleError, LoadError, ServiceTemplate,
};

// Speech exports
pub use speech::{SpeechEngine, SpeechOutcome, Speaker};
