//! App grid
//!
//! Shows every non-overlay app, two rows of three per page. Apps with an
//! icon are drawn as the icon (its selected variant when highlighted),
//! the rest by name.

use std::sync::Arc;

use proxi_core::display::{FontId, Layer};
use proxi_core::input::KeyId;
use proxi_core::lifecycle::{AppDescriptor, AppServices, AppUnit, HookResult};
use tracing::info;

use super::{Home, SWAP_DELAY};

const COLUMNS: usize = 3;
const ROWS: usize = 2;
const PAGE: usize = COLUMNS * ROWS;

/// Selection within a grid of `len` cells
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Selection {
    len: usize,
    index: usize,
}

impl Selection {
    pub(crate) fn new(len: usize) -> Self {
        Self { len, index: 0 }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Move by `delta` cells, stopping at either end
    pub(crate) fn step(&mut self, delta: isize) {
        if self.len == 0 {
            return;
        }
        let last = self.len - 1;
        self.index = self.index.saturating_add_signed(delta).min(last);
    }

    pub(crate) fn page(&self) -> usize {
        self.index / PAGE
    }
}

/// The home screen
pub struct Launcher {
    services: AppServices,
    home: Home,
    apps: Vec<AppDescriptor>,
    selection: Selection,
}

impl Launcher {
    /// Grid over the catalog, minus overlays and the launcher itself
    #[must_use]
    pub fn new(services: AppServices, home: Home) -> Self {
        let apps: Vec<AppDescriptor> = services
            .catalog
            .iter()
            .filter(|d| !d.is_overlay() && d.name != services.name)
            .cloned()
            .collect();
        Self {
            selection: Selection::new(apps.len()),
            services,
            home,
            apps,
        }
    }

    fn selected(&self) -> Option<&AppDescriptor> {
        self.apps.get(self.selection.index())
    }

    fn render(&self) {
        let display = &self.services.display;
        if self.apps.is_empty() {
            display.set_screen("Launcher", "No apps installed");
            return;
        }

        display.clear_layer(Layer::Base);
        let cell_w = (self.services.screen.width as usize / COLUMNS) as i32;
        let cell_h = (self.services.screen.height as usize / ROWS) as i32;
        let line = self.services.fonts.line_height(FontId::Small) as i32;
        let first = self.selection.page() * PAGE;

        for (slot, app) in self.apps.iter().skip(first).take(PAGE).enumerate() {
            let selected = first + slot == self.selection.index();
            let x = (slot % COLUMNS) as i32 * cell_w;
            let y = (slot / COLUMNS) as i32 * cell_h;

            let icon = if selected {
                app.icon_selected.as_ref().or(app.icon.as_ref())
            } else {
                app.icon.as_ref()
            };
            if let Some(icon) = icon {
                let ix = x + (cell_w - icon.width() as i32) / 2;
                let iy = y + (cell_h - icon.height() as i32) / 2;
                display.draw_image(Layer::Base, Arc::clone(icon), ix, iy);
                if selected && app.icon_selected.is_none() {
                    display.draw_text(Layer::Base, FontId::Small, ">", x, iy);
                }
                continue;
            }

            let label = if selected {
                format!(">{}", app.display_name())
            } else {
                app.display_name().to_string()
            };
            let width = self.services.measure(FontId::Small, &label) as i32;
            let tx = x + ((cell_w - width) / 2).max(0);
            let ty = y + (cell_h - line) / 2;
            display.draw_text(Layer::Base, FontId::Small, label, tx, ty);
        }
    }

    fn open_selected(&self) {
        let Some(app) = self.selected() else {
            return;
        };
        info!(app = %app.name, "Launching");
        self.services
            .display
            .set_screen(app.display_name(), "Loading...");
        self.services
            .control
            .swap(&self.services.name, &app.name, self.home.tick_rate, SWAP_DELAY);
    }
}

impl AppUnit for Launcher {
    fn start(&mut self) -> HookResult {
        self.render();
        Ok(())
    }

    fn on_key_up(&mut self, key: &KeyId) -> HookResult {
        let delta: isize = match key.as_str() {
            "KEY_LEFT" => -1,
            "KEY_RIGHT" => 1,
            "KEY_UP" => -(COLUMNS as isize),
            "KEY_DOWN" => COLUMNS as isize,
            "KEY_ENTER" => {
                self.open_selected();
                return Ok(());
            }
            _ => return Ok(()),
        };
        let before = self.selection;
        self.selection.step(delta);
        if self.selection != before {
            self.render();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proxi_core::display::DisplayCommand;
    use proxi_core::lifecycle::control::ControlRequest;
    use proxi_core::lifecycle::AppKind;
    use proxi_core::testing::TestServices;

    fn home() -> Home {
        Home {
            launcher: "launcher".to_string(),
            tick_rate: 20.0,
        }
    }

    fn catalog() -> Vec<AppDescriptor> {
        vec![
            AppDescriptor::new("clock", AppKind::App),
            AppDescriptor::new("launcher", AppKind::App),
            AppDescriptor::new("overlay_settings", AppKind::Overlay),
            AppDescriptor::new("proxi", AppKind::App),
        ]
    }

    #[test]
    fn test_selection_clamps() {
        let mut sel = Selection::new(4);
        sel.step(-1);
        assert_eq!(sel.index(), 0);
        sel.step(3);
        assert_eq!(sel.index(), 3);
        sel.step(3);
        assert_eq!(sel.index(), 3);

        let mut empty = Selection::new(0);
        empty.step(1);
        assert_eq!(empty.index(), 0);
    }

    #[test]
    fn test_selection_pages() {
        let mut sel = Selection::new(10);
        sel.step(5);
        assert_eq!(sel.page(), 0);
        sel.step(1);
        assert_eq!(sel.page(), 1);
    }

    #[test]
    fn test_grid_hides_overlays_and_itself() {
        let dir = tempfile::tempdir().unwrap();
        let services = TestServices::new(dir.path());
        let template = services.template.with_catalog(catalog());
        let launcher = Launcher::new(template.for_app("launcher"), home());

        let names: Vec<&str> = launcher.apps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["clock", "proxi"]);
    }

    #[test]
    fn test_enter_requests_swap_to_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = TestServices::new(dir.path());
        let template = services.template.clone().with_catalog(catalog());
        let mut launcher = Launcher::new(template.for_app("launcher"), home());

        launcher.start().unwrap();
        launcher.on_key_up(&KeyId::from("KEY_RIGHT")).unwrap();
        launcher.on_key_up(&KeyId::from("KEY_ENTER")).unwrap();

        let request = services.control_rx.try_recv().unwrap();
        assert_eq!(
            request,
            ControlRequest::Swap {
                from: "launcher".to_string(),
                to: "proxi".to_string(),
                hz: 20.0,
                delay: SWAP_DELAY,
            }
        );
        let screens: Vec<String> = services
            .drain_display()
            .into_iter()
            .filter_map(|cmd| match cmd {
                DisplayCommand::SetScreen { title, .. } => Some(title),
                _ => None,
            })
            .collect();
        assert_eq!(screens, vec!["proxi"]);
    }

    #[test]
    fn test_empty_catalog_shows_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = TestServices::new(dir.path());
        let mut launcher = Launcher::new(services.template.for_app("launcher"), home());

        launcher.start().unwrap();
        launcher.on_key_up(&KeyId::from("KEY_ENTER")).unwrap();

        assert!(services.control_rx.try_recv().is_err());
        assert!(services.drain_display().iter().any(|cmd| matches!(
            cmd,
            DisplayCommand::SetScreen { body, .. } if body == "No apps installed"
        )));
    }
}
