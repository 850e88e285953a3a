//! Edge detection over raw key transitions

use std::collections::HashSet;

use super::device::{KeyState, RawKeyEvent};
use super::keys::{KeyId, ShiftTable};

/// A transition worth dispatching to apps
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyTransition {
    /// Genuine new press
    Down(KeyId),
    /// Release of a key seen pressed
    Up(KeyId),
}

/// Owns the set of currently pressed keys
#[derive(Debug)]
pub struct KeyTracker {
    pressed: HashSet<KeyId>,
    shift_key: KeyId,
    shift: ShiftTable,
}

impl KeyTracker {
    /// Tracker remapping through `shift` while `shift_key` is held
    #[must_use]
    pub fn new(shift_key: KeyId, shift: ShiftTable) -> Self {
        Self {
            pressed: HashSet::new(),
            shift_key,
            shift,
        }
    }

    /// Record a press. Returns the key to dispatch, or `None` for a duplicate.
    pub fn on_down(&mut self, key: KeyId) -> Option<KeyId> {
        if !self.pressed.insert(key.clone()) {
            return None;
        }
        Some(self.remap(key))
    }

    /// Record a release. Returns the key to dispatch, or `None` if it was
    /// never seen pressed.
    pub fn on_up(&mut self, key: KeyId) -> Option<KeyId> {
        if !self.pressed.remove(&key) {
            return None;
        }
        Some(self.remap(key))
    }

    /// Feed one raw event; auto-repeat is ignored
    pub fn handle(&mut self, event: RawKeyEvent) -> Option<KeyTransition> {
        match event.state {
            KeyState::Down => self.on_down(event.key).map(KeyTransition::Down),
            KeyState::Up => self.on_up(event.key).map(KeyTransition::Up),
            KeyState::Repeat => None,
        }
    }

    /// Whether `key` is currently held
    #[must_use]
    pub fn is_pressed(&self, key: &KeyId) -> bool {
        self.pressed.contains(key)
    }

    /// Number of keys currently held
    #[must_use]
    pub fn pressed_count(&self) -> usize {
        self.pressed.len()
    }

    /// Forget every held key (after losing the device)
    pub fn clear(&mut self) {
        self.pressed.clear();
    }

    fn remap(&self, key: KeyId) -> KeyId {
        if self.pressed.contains(&self.shift_key) {
            self.shift.map(&key)
        } else {
            key
        }
    }
}

impl Default for KeyTracker {
    fn default() -> Self {
        Self::new(KeyId::from(super::keys::DEFAULT_SHIFT_KEY), ShiftTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn down(name: &str) -> RawKeyEvent {
        RawKeyEvent::new(name, KeyState::Down)
    }

    fn up(name: &str) -> RawKeyEvent {
        RawKeyEvent::new(name, KeyState::Up)
    }

    #[test]
    fn test_duplicate_down_suppressed() {
        let mut tracker = KeyTracker::default();
        assert_eq!(tracker.handle(down("KEY_A")), Some(KeyTransition::Down("KEY_A".into())));
        assert_eq!(tracker.handle(down("KEY_A")), None);
        assert_eq!(tracker.handle(RawKeyEvent::new("KEY_A", KeyState::Repeat)), None);
        assert_eq!(tracker.handle(up("KEY_A")), Some(KeyTransition::Up("KEY_A".into())));
        assert_eq!(tracker.pressed_count(), 0);
    }

    #[test]
    fn test_unknown_release_ignored() {
        let mut tracker = KeyTracker::default();
        assert_eq!(tracker.handle(up("KEY_B")), None);
    }

    #[test]
    fn test_shift_remaps_while_held() {
        let mut tracker = KeyTracker::default();
        tracker.handle(down("KEY_LEFTSHIFT"));
        assert_eq!(
            tracker.handle(down("KEY_SLASH")),
            Some(KeyTransition::Down("KEY_QUESTION".into()))
        );
        assert_eq!(
            tracker.handle(up("KEY_SLASH")),
            Some(KeyTransition::Up("KEY_QUESTION".into()))
        );
        // no shifted form: identifier passes through
        assert_eq!(tracker.handle(down("KEY_A")), Some(KeyTransition::Down("KEY_A".into())));

        tracker.handle(up("KEY_LEFTSHIFT"));
        assert_eq!(
            tracker.handle(down("KEY_SLASH")),
            Some(KeyTransition::Down("KEY_SLASH".into()))
        );
    }

    #[test]
    fn test_shift_release_reports_plain_key() {
        let mut tracker = KeyTracker::default();
        tracker.handle(down("KEY_LEFTSHIFT"));
        assert_eq!(
            tracker.handle(up("KEY_LEFTSHIFT")),
            Some(KeyTransition::Up("KEY_LEFTSHIFT".into()))
        );
    }
}
