//! Terminal emulator stand-ins for the panel and the keyboard
//!
//! The panel is drawn with half-block characters, two pixel rows per
//! terminal row, in a gray level that follows the contrast setting. Keys
//! typed into the terminal are replayed as Linux key names: uppercase
//! letters arrive wrapped in a left-shift press, and F1/F2 stand in for the
//! brightness keys. Ctrl-C asks the host to shut down.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::{cursor, execute, queue, terminal};
use tokio::sync::Notify;
use tracing::{debug, info};

use proxi_core::display::{DisplayDevice, DisplayError, Frame};
use proxi_core::input::{
    DeviceEnumerator, InputDevice, InputError, KeyState, RawKeyEvent, DEFAULT_SHIFT_KEY,
};

/// Name the terminal keyboard reports
pub const KEYBOARD_NAME: &str = "Terminal Keyboard";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Screen
// ============================================================================

/// Raw mode and the alternate screen, restored on drop
#[derive(Debug)]
pub struct TerminalGuard(());

impl TerminalGuard {
    /// Switch the terminal into raw mode on the alternate screen
    ///
    /// # Errors
    ///
    /// Returns the IO error if the terminal cannot be configured.
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = Self(());
        execute!(
            io::stdout(),
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All)
        )?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(
            io::stdout(),
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

/// Half-block rendering of a panel on stdout
pub struct TerminalDisplay {
    width: u32,
    height: u32,
    contrast: u8,
    out: Stdout,
}

impl TerminalDisplay {
    /// A `width` x `height` panel
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            contrast: u8::MAX,
            out: io::stdout(),
        }
    }

    fn color(&self) -> Color {
        // keep the dimmest setting readable
        let level = 64 + (u16::from(self.contrast) * 191 / 255) as u8;
        Color::Rgb {
            r: level,
            g: level,
            b: level,
        }
    }

    fn draw(&mut self, frame: &Frame) -> io::Result<()> {
        let color = self.color();
        queue!(self.out, SetForegroundColor(color))?;
        let rows: Vec<&[bool]> = frame.rows().collect();
        for (i, pair) in rows.chunks(2).enumerate() {
            let line = half_blocks(pair[0], pair.get(1).copied());
            let row = u16::try_from(i).unwrap_or(u16::MAX);
            queue!(self.out, cursor::MoveTo(0, row), Print(line))?;
        }
        self.out.flush()
    }
}

/// One terminal row covering two pixel rows
fn half_blocks(top: &[bool], bottom: Option<&[bool]>) -> String {
    top.iter()
        .enumerate()
        .map(|(x, &upper)| {
            let lower = bottom.is_some_and(|row| row.get(x).copied().unwrap_or(false));
            match (upper, lower) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            }
        })
        .collect()
}

impl DisplayDevice for TerminalDisplay {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.draw(frame)
            .map_err(|e| DisplayError::Device(e.to_string()))
    }

    fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
        debug!(level, "Terminal contrast");
        self.contrast = level;
        Ok(())
    }
}

/// Panel that discards frames, for running without a screen
#[derive(Debug)]
pub struct HeadlessDisplay {
    width: u32,
    height: u32,
}

impl HeadlessDisplay {
    /// A `width` x `height` panel
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl DisplayDevice for HeadlessDisplay {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        tracing::trace!(lit = frame.lit_count(), "Headless frame");
        Ok(())
    }
}

// ============================================================================
// Keyboard
// ============================================================================

/// Linux key name for a typed character, and whether shift is needed
fn char_key(c: char) -> Option<(String, bool)> {
    if c.is_ascii_lowercase() || c.is_ascii_digit() {
        return Some((format!("KEY_{}", c.to_ascii_uppercase()), false));
    }
    if c.is_ascii_uppercase() {
        return Some((format!("KEY_{c}"), true));
    }
    let (name, shifted) = match c {
        ' ' => ("SPACE", false),
        '-' => ("MINUS", false),
        '=' => ("EQUAL", false),
        '[' => ("LEFTBRACE", false),
        ']' => ("RIGHTBRACE", false),
        ';' => ("SEMICOLON", false),
        '\'' => ("APOSTROPHE", false),
        ',' => ("COMMA", false),
        '.' => ("DOT", false),
        '/' => ("SLASH", false),
        '\\' => ("BACKSLASH", false),
        '`' => ("GRAVE", false),
        '"' => ("QUOTE", false),
        '!' => ("EXCLAMATION", false),
        '@' => ("AT", false),
        '#' => ("HASH", false),
        '$' => ("DOLLAR", false),
        // the shift table turns these back into their symbols
        '?' => ("SLASH", true),
        '|' => ("BACKSLASH", true),
        '~' => ("GRAVE", true),
        _ => return None,
    };
    Some((format!("KEY_{name}"), shifted))
}

fn code_key(code: KeyCode) -> Option<(String, bool)> {
    let name = match code {
        KeyCode::Char(c) => return char_key(c),
        KeyCode::Enter => "KEY_ENTER",
        KeyCode::Backspace => "KEY_BACKSPACE",
        KeyCode::Esc => "KEY_ESC",
        KeyCode::Tab => "KEY_TAB",
        KeyCode::Up => "KEY_UP",
        KeyCode::Down => "KEY_DOWN",
        KeyCode::Left => "KEY_LEFT",
        KeyCode::Right => "KEY_RIGHT",
        KeyCode::Delete => "KEY_DELETE",
        KeyCode::F(1) => "KEY_BRIGHTNESSDOWN",
        KeyCode::F(2) => "KEY_BRIGHTNESSUP",
        KeyCode::F(n) => return Some((format!("KEY_F{n}"), false)),
        _ => return None,
    };
    Some((name.to_string(), false))
}

/// Press and release for one terminal key event
fn translate(key: &KeyEvent) -> Vec<RawKeyEvent> {
    let Some((name, shifted)) = code_key(key.code) else {
        return Vec::new();
    };
    let mut events = Vec::with_capacity(4);
    if shifted {
        events.push(RawKeyEvent::new(DEFAULT_SHIFT_KEY, KeyState::Down));
    }
    events.push(RawKeyEvent::new(name.as_str(), KeyState::Down));
    events.push(RawKeyEvent::new(name.as_str(), KeyState::Up));
    if shifted {
        events.push(RawKeyEvent::new(DEFAULT_SHIFT_KEY, KeyState::Up));
    }
    events
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c' | 'C'))
}

/// Keyboard reading from the controlling terminal
pub struct TerminalKeyboard {
    quit: Arc<Notify>,
}

impl TerminalKeyboard {
    /// Keyboard that notifies `quit` on Ctrl-C
    #[must_use]
    pub fn new(quit: Arc<Notify>) -> Self {
        Self { quit }
    }
}

impl InputDevice for TerminalKeyboard {
    fn name(&self) -> &str {
        KEYBOARD_NAME
    }

    fn read_batch(&mut self) -> Result<Vec<RawKeyEvent>, InputError> {
        if !event::poll(POLL_INTERVAL)? {
            return Ok(Vec::new());
        }
        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                if is_interrupt(&key) {
                    info!("Ctrl-C from terminal keyboard");
                    self.quit.notify_one();
                    return Ok(Vec::new());
                }
                Ok(translate(&key))
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Always finds exactly one [`TerminalKeyboard`]
pub struct TerminalEnumerator {
    quit: Arc<Notify>,
}

impl TerminalEnumerator {
    /// Enumerator whose keyboards notify `quit` on Ctrl-C
    #[must_use]
    pub fn new(quit: Arc<Notify>) -> Self {
        Self { quit }
    }
}

impl DeviceEnumerator for TerminalEnumerator {
    fn enumerate(&mut self) -> Result<Vec<Box<dyn InputDevice>>, InputError> {
        Ok(vec![Box::new(TerminalKeyboard::new(Arc::clone(&self.quit)))])
    }
}
