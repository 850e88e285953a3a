//! Text composer
//!
//! Type a line, Tab accepts the highlighted completion, Enter speaks the
//! line. Completions come from `words.txt` in the app's scratch directory,
//! one word per line.

use std::fs;
use std::path::Path;

use proxi_core::input::{key_char, KeyId, DEFAULT_SHIFT_KEY};
use proxi_core::lifecycle::{AppServices, AppUnit, HookResult};
use proxi_core::speech::SpeechOutcome;
use tracing::{debug, info, warn};

use super::{Home, SWAP_DELAY};

/// Word list file in the scratch directory
pub const WORDS_FILE: &str = "words.txt";

const READY: &str = "Ready for input! Press [TAB] to autocomplete and [ESC] to return to launcher.";

/// Prefix completion over a sorted word list
#[derive(Clone, Debug, Default)]
pub struct Completer {
    words: Vec<String>,
}

impl Completer {
    /// Completer over `words`; blank entries are dropped
    #[must_use]
    pub fn new(words: impl IntoIterator<Item = String>) -> Self {
        let mut words: Vec<String> = words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        words.sort();
        words.dedup();
        Self { words }
    }

    /// Read one word per line; a missing or unreadable file gives no words
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => {
                let completer = Self::new(text.lines().map(str::to_string));
                info!(path = %path.display(), words = completer.words.len(), "Loaded completion words");
                completer
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "No completion words");
                Self::default()
            }
        }
    }

    /// Rest of the first word extending the last word of `text`
    #[must_use]
    pub fn suggest(&self, text: &str) -> Option<&str> {
        if text.is_empty() || text.ends_with(' ') {
            return None;
        }
        let last = text.rsplit(' ').next()?.to_lowercase();
        let at = self.words.partition_point(|w| w.as_str() < last.as_str());
        let candidate = self.words.get(at)?;
        if !candidate.starts_with(&last) {
            return None;
        }
        let rest = &candidate[last.len()..];
        (!rest.is_empty()).then_some(rest)
    }
}

/// The composer app
pub struct Composer {
    services: AppServices,
    home: Home,
    completer: Completer,
    line: String,
    shift: bool,
}

impl Composer {
    /// Composer with words from the scratch directory
    #[must_use]
    pub fn new(services: AppServices, home: Home) -> Self {
        let completer = match services.scratch_dir() {
            Ok(dir) => Completer::load(&dir.join(WORDS_FILE)),
            Err(e) => {
                warn!(error = %e, "No scratch directory for completion words");
                Completer::default()
            }
        };
        Self {
            services,
            home,
            completer,
            line: String::new(),
            shift: false,
        }
    }

    /// Current line
    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    fn show_line(&self) {
        let body = match self.completer.suggest(&self.line) {
            Some(rest) => format!("{}[{rest}]", self.line),
            None => self.line.clone(),
        };
        self.services.display.set_highlight_screen("Input", body);
    }

    fn complete(&mut self) {
        if let Some(rest) = self.completer.suggest(&self.line) {
            let rest = rest.to_string();
            self.line.push_str(&rest);
            self.line.push(' ');
        }
        self.show_line();
    }

    fn speak(&mut self) {
        if self.line.trim().is_empty() {
            return;
        }
        match self.services.speech.speak(&self.line, false) {
            SpeechOutcome::Cached | SpeechOutcome::Synthesized => {
                self.line.clear();
                self.services
                    .display
                    .set_highlight_screen("Ready", "Text spoken! Ready for [new input]...");
            }
            outcome => {
                debug!(?outcome, "Line kept after speech");
                self.show_line();
            }
        }
    }

    fn leave(&self) {
        self.services
            .display
            .set_screen("Launcher", "Switching to Launcher...");
        self.services.control.swap(
            &self.services.name,
            &self.home.launcher,
            self.home.tick_rate,
            SWAP_DELAY,
        );
    }

    fn is_shift(key: &KeyId) -> bool {
        key.is(DEFAULT_SHIFT_KEY) || key.is("KEY_RIGHTSHIFT")
    }
}

impl AppUnit for Composer {
    fn start(&mut self) -> HookResult {
        self.services.display.set_app_cursor_enabled(true);
        self.services.display.set_highlight_screen("Ready", READY);
        Ok(())
    }

    fn on_key_down(&mut self, key: &KeyId) -> HookResult {
        if Self::is_shift(key) {
            self.shift = true;
        }
        Ok(())
    }

    fn on_key_up(&mut self, key: &KeyId) -> HookResult {
        if Self::is_shift(key) {
            self.shift = false;
            return Ok(());
        }
        match key.as_str() {
            "KEY_ESC" => self.leave(),
            "KEY_TAB" => self.complete(),
            "KEY_ENTER" => self.speak(),
            "KEY_BACKSPACE" => {
                self.line.pop();
                self.show_line();
            }
            _ => {
                let Some(c) = key_char(key) else {
                    return Ok(());
                };
                self.line
                    .push(if self.shift { c.to_ascii_uppercase() } else { c });
                self.show_line();
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> HookResult {
        self.services.display.set_app_cursor_enabled(false);
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

    fn completer() -> Completer {
        Completer::new(["help", "hello", "world", ""].map(String::from))
    }

    fn home() -> Home {
        Home {
            launcher: "launcher".to_string(),
            tick_rate: 20.0,
        }
    }

    fn press(app: &mut Composer, keys: &[&str]) {
        for key in keys {
            let key = KeyId::from(*key);
            app.on_key_down(&key).unwrap();
            app.on_key_up(&key).unwrap();
        }
    }

    fn last_body(services: &mut TestServices) -> Option<String> {
        services
            .drain_display()
            .into_iter()
            .filter_map(|cmd| match cmd {
                DisplayCommand::SetScreen { body, .. }
                | DisplayCommand::SetHighlightScreen { body, .. } => Some(body),
                _ => None,
            })
            .last()
    }

    #[test]
    fn test_suggest_uses_first_match_in_order() {
        let c = completer();
        assert_eq!(c.suggest("say hel"), Some("lo"));
        assert_eq!(c.suggest("HEL"), Some("lo"));
        assert_eq!(c.suggest("wor"), Some("ld"));
    }

    #[test]
    fn test_suggest_edge_cases() {
        let c = completer();
        assert_eq!(c.suggest(""), None);
        assert_eq!(c.suggest("hel "), None);
        assert_eq!(c.suggest("world"), None);
        assert_eq!(c.suggest("xyz"), None);
    }

    #[test]
    fn test_missing_word_file_gives_no_words() {
        let dir = tempfile::tempdir().unwrap();
        let c = Completer::load(&dir.path().join("nope.txt"));
        assert_eq!(c.suggest("hel"), None);
    }

    #[test]
    fn test_typing_and_tab_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = TestServices::new(dir.path());
        let app_services = services.template.for_app("proxi");
        let scratch = app_services.scratch_dir().unwrap().to_path_buf();
        fs::write(scratch.join(WORDS_FILE), "hello\nhelp\n").unwrap();
        let mut app = Composer::new(app_services, home());

        app.start().unwrap();
        let shift = KeyId::from("KEY_LEFTSHIFT");
        app.on_key_down(&shift).unwrap();
        press(&mut app, &["KEY_H"]);
        app.on_key_up(&shift).unwrap();
        press(&mut app, &["KEY_E", "KEY_L"]);
        assert_eq!(app.line(), "Hel");
        // the suggestion is marked, so it must go out as a highlight screen
        let input = services.drain_display().into_iter().rev().find_map(|cmd| match cmd {
            DisplayCommand::SetHighlightScreen { title, body } => Some((title, body)),
            _ => None,
        });
        assert_eq!(input, Some(("Input".to_string(), "Hel[lo]".to_string())));

        press(&mut app, &["KEY_TAB"]);
        assert_eq!(app.line(), "Hello ");
        assert_eq!(last_body(&mut services).as_deref(), Some("Hello "));

        press(&mut app, &["KEY_BACKSPACE"]);
        assert_eq!(app.line(), "Hello");
    }

    #[test]
    fn test_enter_speaks_and_keeps_unspoken_line() {
        let dir = tempfile::tempdir().unwrap();
        let services = TestServices::new(dir.path());
        let mut app = Composer::new(services.template.for_app("proxi"), home());

        press(&mut app, &["KEY_H", "KEY_I", "KEY_ENTER"]);

        assert_eq!(services.speech.spoken(), vec!["hi"]);
        // the null speaker skips, so nothing was spoken and the line stays
        assert_eq!(app.line(), "hi");
    }

    #[test]
    fn test_esc_returns_to_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = TestServices::new(dir.path());
        let mut app = Composer::new(services.template.for_app("proxi"), home());

        press(&mut app, &["KEY_ESC"]);

        assert_eq!(
            services.control_rx.try_recv().unwrap(),
            ControlRequest::Swap {
                from: "proxi".to_string(),
                to: "launcher".to_string(),
                hz: 20.0,
                delay: SWAP_DELAY,
            }
        );
    }
}
