//! Key identifiers and the shift table

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Linux input key name, e.g. `KEY_A` or `KEY_LEFTSHIFT`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Wrap a key name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The key name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the given key name
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Modifier whose hold activates the shift table
pub const DEFAULT_SHIFT_KEY: &str = "KEY_LEFTSHIFT";

/// Remapping applied to keys while shift is held
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShiftTable {
    map: HashMap<KeyId, KeyId>,
}

impl ShiftTable {
    /// Table from explicit pairs
    #[must_use]
    pub fn new(pairs: impl IntoIterator<Item = (KeyId, KeyId)>) -> Self {
        Self {
            map: pairs.into_iter().collect(),
        }
    }

    /// Shifted form of `key`; keys without one are returned unchanged
    #[must_use]
    pub fn map(&self, key: &KeyId) -> KeyId {
        self.map.get(key).cloned().unwrap_or_else(|| key.clone())
    }
}

impl Default for ShiftTable {
    fn default() -> Self {
        Self::new(
            [
                ("KEY_SLASH", "KEY_QUESTION"),
                ("KEY_BACKSLASH", "KEY_PIPE"),
                ("KEY_GRAVE", "KEY_TILDE"),
                ("KEY_SPACE", "KEY_TAB"),
            ]
            .into_iter()
            .map(|(from, to)| (KeyId::from(from), KeyId::from(to))),
        )
    }
}

/// Printable character for a key, for text-entry apps
#[must_use]
pub fn key_char(key: &KeyId) -> Option<char> {
    let name = key.as_str().strip_prefix("KEY_")?;
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_uppercase() {
            return Some(c.to_ascii_lowercase());
        }
        if c.is_ascii_digit() {
            return Some(c);
        }
    }
    let c = match name {
        "SPACE" => ' ',
        "ENTER" => '\n',
        "MINUS" => '-',
        "EQUAL" => '=',
        "LEFTBRACE" => '[',
        "RIGHTBRACE" => ']',
        "SEMICOLON" => ';',
        "APOSTROPHE" => '\'',
        "COMMA" => ',',
        "DOT" => '.',
        "SLASH" => '/',
        "BACKSLASH" => '\\',
        "QUOTE" => '"',
        "QUESTION" => '?',
        "EXCLAMATION" => '!',
        "AT" => '@',
        "HASH" => '#',
        "DOLLAR" => '$',
        "PIPE" => '|',
        "GRAVE" => '`',
        "TILDE" => '~',
        _ => return None,
    };
    Some(c)
}
