//! Brightness overlay
//!
//! Loaded next to whatever app is in front; it never ticks and only
//! listens for the brightness keys.

use proxi_core::input::KeyId;
use proxi_core::lifecycle::{AppServices, AppUnit, HookResult};
use tracing::warn;

const STEPS: u8 = 20;
const INITIAL_STEP: u8 = STEPS - 5;

/// Contrast level for a UI step
fn contrast_for(step: u8) -> u8 {
    (u16::from(step.min(STEPS)) * u16::from(u8::MAX) / u16::from(STEPS)) as u8
}

fn percent(step: u8) -> u32 {
    u32::from(step) * 100 / u32::from(STEPS)
}

/// Adjusts panel contrast from the brightness keys
pub struct OverlaySettings {
    services: AppServices,
    step: u8,
}

impl OverlaySettings {
    /// Overlay starting at three quarters brightness
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self {
            services,
            step: INITIAL_STEP,
        }
    }

    fn apply(&mut self, step: u8, label: &str) {
        self.step = step;
        if let Err(e) = self.services.display.set_contrast(contrast_for(step)) {
            warn!(error = %e, "Failed to set contrast");
        }
        self.services
            .display
            .set_screen("Brightness", format!("{label}: {}%", percent(step)));
    }
}

impl AppUnit for OverlaySettings {
    fn on_key_up(&mut self, key: &KeyId) -> HookResult {
        match key.as_str() {
            "KEY_BRIGHTNESSUP" => self.apply((self.step + 1).min(STEPS), "Up"),
            "KEY_BRIGHTNESSDOWN" => self.apply(self.step.saturating_sub(1), "Down"),
            _ => {}
        }
        Ok(())
    }
}
