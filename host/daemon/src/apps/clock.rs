//! Wall clock

use chrono::{Local, NaiveTime};
use proxi_core::input::KeyId;
use proxi_core::lifecycle::{AppServices, AppUnit, HookResult};

use super::{Home, SWAP_DELAY};

fn display_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn spoken_time(time: NaiveTime) -> String {
    format!("The current time is {}", time.format("%H:%M"))
}

/// Shows the time, redrawn once a second
pub struct Clock {
    services: AppServices,
    home: Home,
    shown: Option<String>,
}

impl Clock {
    /// Clock app
    #[must_use]
    pub fn new(services: AppServices, home: Home) -> Self {
        Self {
            services,
            home,
            shown: None,
        }
    }

    /// Redraw if the displayed second changed
    fn refresh(&mut self, now: NaiveTime) {
        let text = display_time(now);
        if self.shown.as_deref() == Some(text.as_str()) {
            return;
        }
        self.services.display.set_screen("Clock", text.as_str());
        self.shown = Some(text);
    }
}

impl AppUnit for Clock {
    fn start(&mut self) -> HookResult {
        self.shown = None;
        self.refresh(Local::now().time());
        Ok(())
    }

    fn update(&mut self) -> HookResult {
        self.refresh(Local::now().time());
        Ok(())
    }

    fn on_key_up(&mut self, key: &KeyId) -> HookResult {
        match key.as_str() {
            "KEY_ENTER" => {
                self.services
                    .speech
                    .speak(&spoken_time(Local::now().time()), false);
                // speech took over the screen
                self.shown = None;
            }
            "KEY_ESC" => {
                self.services.control.swap(
                    &self.services.name,
                    &self.home.launcher,
                    self.home.tick_rate,
                    SWAP_DELAY,
                );
            }
            _ => {}
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
    use proxi_core::testing::TestServices;

    fn home() -> Home {
        Home {
            launcher: "launcher".to_string(),
            tick_rate: 20.0,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_time_formats() {
        assert_eq!(display_time(at(7, 5, 9)), "07:05:09");
        assert_eq!(spoken_time(at(17, 30, 0)), "The current time is 17:30");
    }

    #[test]
    fn test_redraws_only_when_the_second_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = TestServices::new(dir.path());
        let mut clock = Clock::new(services.template.for_app("clock"), home());

        clock.refresh(at(12, 0, 0));
        clock.refresh(at(12, 0, 0));
        clock.refresh(at(12, 0, 1));

        let bodies: Vec<String> = services
            .drain_display()
            .into_iter()
            .filter_map(|cmd| match cmd {
                DisplayCommand::SetScreen { body, .. } => Some(body),
                _ => None,
            })
            .collect();
        assert_eq!(bodies, vec!["12:00:00", "12:00:01"]);
    }

    #[test]
    fn test_enter_speaks_and_esc_returns() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = TestServices::new(dir.path());
        let mut clock = Clock::new(services.template.for_app("clock"), home());

        clock.on_key_up(&KeyId::from("KEY_ENTER")).unwrap();
        let spoken = services.speech.spoken();
        assert_eq!(spoken.len(), 1);
        assert!(spoken[0].starts_with("The current time is "));

        clock.on_key_up(&KeyId::from("KEY_ESC")).unwrap();
        assert!(matches!(
            services.control_rx.try_recv().unwrap(),
            ControlRequest::Swap { ref to, .. } if to == "launcher"
        ));
    }
}
