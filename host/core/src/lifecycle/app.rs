//! The app unit contract and the hook call boundary

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::input::KeyId;

/// Result of one hook invocation
pub type HookResult = anyhow::Result<()>;

/// A pluggable app.
///
/// Every hook defaults to a no-op. Hooks run on the app's own tick thread
/// (`start`, `update`, `stop`) or on the input thread (`on_key_down`,
/// `on_key_up`); the manager serializes them per instance.
///
/// Hooks must never block on the app's own lifecycle. To switch the app out
/// or reload it, send a request through
/// [`ControlHandle`](super::ControlHandle); it runs after the hook returns.
pub trait AppUnit: Send {
    /// Called once on the tick thread before the first update
    fn start(&mut self) -> HookResult {
        Ok(())
    }

    /// Called once per tick
    fn update(&mut self) -> HookResult {
        Ok(())
    }

    /// A key went down
    fn on_key_down(&mut self, key: &KeyId) -> HookResult {
        let _ = key;
        Ok(())
    }

    /// A key went up
    fn on_key_up(&mut self, key: &KeyId) -> HookResult {
        let _ = key;
        Ok(())
    }

    /// Called once on the tick thread after the last update
    fn stop(&mut self) -> HookResult {
        Ok(())
    }
}

/// Which hook is being invoked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    /// `start`
    Start,
    /// `update`
    Update,
    /// `on_key_down`
    KeyDown,
    /// `on_key_up`
    KeyUp,
    /// `stop`
    Stop,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Update => "update",
            Self::KeyDown => "on_key_down",
            Self::KeyUp => "on_key_up",
            Self::Stop => "stop",
        })
    }
}

/// Event fanned out to every loaded app
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppEvent {
    /// Key press
    KeyDown(KeyId),
    /// Key release
    KeyUp(KeyId),
}

impl AppEvent {
    pub(crate) fn hook(&self) -> Hook {
        match self {
            Self::KeyDown(_) => Hook::KeyDown,
            Self::KeyUp(_) => Hook::KeyUp,
        }
    }

    pub(crate) fn deliver(&self, unit: &mut dyn AppUnit) -> HookResult {
        match self {
            Self::KeyDown(key) => unit.on_key_down(key),
            Self::KeyUp(key) => unit.on_key_up(key),
        }
    }
}

/// A hook that returned an error or panicked
#[derive(Debug)]
pub struct HookFailure {
    /// App name
    pub app: String,
    /// Hook that failed
    pub hook: Hook,
    /// Error text or panic payload
    pub message: String,
    /// Whether the hook panicked
    pub panicked: bool,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = if self.panicked { "panicked" } else { "failed" };
        write!(f, "{}.{} {how}: {}", self.app, self.hook, self.message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one hook, containing both error returns and panics.
///
/// Failures are logged and returned; the caller decides whether to carry on.
pub(crate) fn invoke_hook(
    app: &str,
    hook: Hook,
    call: impl FnOnce() -> HookResult,
) -> Result<(), HookFailure> {
    let failure = match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => HookFailure {
            app: app.to_string(),
            hook,
            message: format!("{e:#}"),
            panicked: false,
        },
        Err(payload) => HookFailure {
            app: app.to_string(),
            hook,
            message: panic_message(payload.as_ref()),
            panicked: true,
        },
    };
    warn!(app = %app, hook = %hook, panicked = failure.panicked, error = %failure.message, "App hook failed");
    Err(failure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_contained() {
        let failure = invoke_hook("demo", Hook::Update, || anyhow::bail!("boom")).unwrap_err();
        assert_eq!(failure.hook, Hook::Update);
        assert!(!failure.panicked);
        assert_eq!(failure.to_string(), "demo.update failed: boom");
    }

    #[test]
    fn test_panic_is_contained() {
        let failure = invoke_hook("demo", Hook::KeyDown, || panic!("kaboom")).unwrap_err();
        assert!(failure.panicked);
        assert_eq!(failure.message, "kaboom");
    }

    #[test]
    fn test_success_passes_through() {
        assert!(invoke_hook("demo", Hook::Start, || Ok(())).is_ok());
    }

    #[test]
    fn test_default_hooks_are_noops() {
        struct Empty;
        impl AppUnit for Empty {}

        let mut unit = Empty;
        assert!(unit.start().is_ok());
        assert!(AppEvent::KeyDown(KeyId::from("KEY_A")).deliver(&mut unit).is_ok());
        assert!(unit.stop().is_ok());
    }
}
