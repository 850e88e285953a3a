//! App Lifecycle Manager
//!
//! Discovers apps, constructs them through registered factories, runs each
//! on its own tick thread and fans key events out to every loaded instance.
//!
//! # Threads
//!
//! ```text
//! app-<name>   start, update x N, stop      (one per running app)
//! input        on_key_down / on_key_up      (via KeyEventSink)
//! control      swap / reload requests       (tokio task + spawn_blocking)
//! ```
//!
//! Each instance sits behind its own mutex, so hooks of one app never run
//! concurrently.

mod app;
pub mod control;
mod descriptor;
mod manager;
mod registry;
mod services;
mod worker;

pub use app::{AppEvent, AppUnit, Hook, HookFailure, HookResult};
pub use control::{ControlHandle, ControlRequest};
pub use descriptor::{AppDescriptor, AppKind, AppMetadata};
pub use manager::{
    AppManager, DispatchReport, LifecycleError, ManagerSettings, StopReport, SwapStage,
};
pub use registry::{AppFactory, AppRegistry, LoadError};
pub use services::{AppServices, ServiceTemplate};
