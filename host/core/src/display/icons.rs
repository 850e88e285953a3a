//! Built-in status icons
//!
//! Three 8x8 icons are drawn on the overlay layer while the host is busy:
//! `searching` (input discovery), `generating` (speech synthesis) and
//! `speaking` (audio playback). Any of them can be replaced by a PNG of the
//! same name in the configured icon directory.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::bitmap::Bitmap;

const SEARCHING: [&str; 8] = [
    "..###...",
    ".#...#..",
    "#.....#.",
    "#.....#.",
    "#.....#.",
    ".#...#..",
    "..####..",
    "......##",
];

const GENERATING: [&str; 8] = [
    "........",
    ".######.",
    ".#....#.",
    ".#.##.#.",
    ".#.##.#.",
    ".#....#.",
    ".######.",
    "........",
];

const SPEAKING: [&str; 8] = [
    "...#....",
    "..##..#.",
    "####.#..",
    "####.#.#",
    "####.#.#",
    "####.#..",
    "..##..#.",
    "...#....",
];

/// Side length of the built-in icons
pub const ICON_SIZE: u32 = 8;

/// The status icon bundle shared by the speech engine and input subsystem
#[derive(Clone, Debug)]
pub struct StatusIcons {
    /// Shown while looking for a keyboard
    pub searching: Arc<Bitmap>,
    /// Shown while speech is being synthesized
    pub generating: Arc<Bitmap>,
    /// Shown while audio is playing
    pub speaking: Arc<Bitmap>,
}

impl StatusIcons {
    /// The compiled-in icons
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            searching: Arc::new(Bitmap::from_ascii(&SEARCHING)),
            generating: Arc::new(Bitmap::from_ascii(&GENERATING)),
            speaking: Arc::new(Bitmap::from_ascii(&SPEAKING)),
        }
    }

    /// Built-in icons, replaced by `<dir>/<name>.png` where such a file exists.
    ///
    /// Unreadable replacements are logged and the built-in icon is kept.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let mut icons = Self::builtin();
        for (name, slot) in [
            ("searching", &mut icons.searching),
            ("generating", &mut icons.generating),
            ("speaking", &mut icons.speaking),
        ] {
            let path = dir.join(format!("{name}.png"));
            if !path.is_file() {
                continue;
            }
            match Bitmap::load_png(&path) {
                Ok(bitmap) => {
                    debug!(icon = name, path = %path.display(), "Loaded status icon");
                    *slot = Arc::new(bitmap);
                }
                Err(e) => warn!(icon = name, error = %e, "Keeping built-in status icon"),
            }
        }
        icons
    }
}

impl Default for StatusIcons {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_icons_are_square() {
        let icons = StatusIcons::builtin();
        for icon in [&icons.searching, &icons.generating, &icons.speaking] {
            assert_eq!((icon.width(), icon.height()), (ICON_SIZE, ICON_SIZE));
            assert!(icon.lit_pixels().count() > 0);
        }
    }

    #[test]
    fn test_broken_override_keeps_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("speaking.png"), b"not a png").unwrap();

        let icons = StatusIcons::load(dir.path());
        assert_eq!(*icons.speaking, Bitmap::from_ascii(&SPEAKING));
    }
}
