//! Built-in app units
//!
//! | App | Kind | Keys |
//! |---|---|---|
//! | `launcher` | app | arrows select, Enter opens |
//! | `clock` | app | Enter speaks the time, Esc returns |
//! | `proxi` | app | typing, Tab completes, Enter speaks, Esc returns |
//! | `overlay_settings` | overlay | brightness keys |
//!
//! Apps never reach the lifecycle manager directly; switching happens
//! through the control channel in their services.

mod clock;
mod launcher;
mod proxi;
mod settings;

use std::time::Duration;

use proxi_core::lifecycle::{AppDescriptor, AppKind, AppRegistry};

pub use clock::Clock;
pub use launcher::Launcher;
pub use proxi::Composer;
pub use settings::OverlaySettings;

/// Pause between an app's last screen and the swap that replaces it
pub const SWAP_DELAY: Duration = Duration::from_millis(100);

/// Where apps go back to and how fast they run
#[derive(Clone, Debug, PartialEq)]
pub struct Home {
    /// Launcher app name
    pub launcher: String,
    /// Tick rate for swapped-in apps
    pub tick_rate: f64,
}

/// Register every built-in app under its default name
pub fn register_builtin(registry: &mut AppRegistry, home: &Home) {
    let h = home.clone();
    registry.register_unit(
        AppDescriptor::new(home.launcher.clone(), AppKind::App),
        move |services| Ok(Box::new(Launcher::new(services, h.clone()))),
    );

    let h = home.clone();
    registry.register_unit(AppDescriptor::new("clock", AppKind::App), move |services| {
        Ok(Box::new(Clock::new(services, h.clone())))
    });

    let h = home.clone();
    registry.register_unit(AppDescriptor::new("proxi", AppKind::App), move |services| {
        Ok(Box::new(Composer::new(services, h.clone())))
    });

    registry.register_unit(
        AppDescriptor::new("overlay_settings", AppKind::Overlay),
        |services| Ok(Box::new(OverlaySettings::new(services))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_registration() {
        let mut registry = AppRegistry::new();
        register_builtin(
            &mut registry,
            &Home {
                launcher: "launcher".to_string(),
                tick_rate: 20.0,
            },
        );

        let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["clock", "launcher", "overlay_settings", "proxi"]);
        assert_eq!(registry.overlays(), vec!["overlay_settings"]);
    }
}
