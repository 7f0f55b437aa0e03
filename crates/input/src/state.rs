use std::collections::BTreeSet;

use glam::Vec2;

use crate::Key;

/// Keys currently held down.
///
/// Uses a BTreeSet so iteration over held keys is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardState {
    held: BTreeSet<Key>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press or release.
    pub fn set(&mut self, key: Key, pressed: bool) {
        if pressed {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn held(&self) -> impl Iterator<Item = Key> + '_ {
        self.held.iter().copied()
    }

    /// Release everything, e.g. when the surface loses focus.
    pub fn clear(&mut self) {
        if !self.held.is_empty() {
            tracing::debug!(count = self.held.len(), "releasing held keys");
        }
        self.held.clear();
    }
}

/// Mouse buttons and cursor motion accumulated since the last input step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseState {
    /// Last known cursor position in surface pixels.
    pub position: Option<Vec2>,
    /// Cursor motion since the previous input step. `x` holds the vertical
    /// motion and `y` the horizontal one, so it can be added directly to a
    /// pitch/yaw rotation.
    pub displacement: Vec2,
    pub right_pressed: bool,
    pub in_surface: bool,
}

impl MouseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a new cursor position. Motion only accumulates while the cursor
    /// is inside the surface and a previous position is known.
    pub fn cursor_moved(&mut self, to: Vec2) {
        if let (Some(from), true) = (self.position, self.in_surface) {
            let delta = to - from;
            self.displacement += Vec2::new(delta.y, delta.x);
        }
        self.position = Some(to);
    }

    /// Feed raw device motion (used when the cursor is grabbed).
    pub fn moved_by(&mut self, dx: f32, dy: f32) {
        self.displacement += Vec2::new(dy, dx);
    }

    pub fn set_in_surface(&mut self, inside: bool) {
        self.in_surface = inside;
        if !inside {
            self.position = None;
        }
    }

    /// Return the accumulated displacement and reset it.
    pub fn take_displacement(&mut self) -> Vec2 {
        std::mem::take(&mut self.displacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut kb = KeyboardState::new();
        kb.set(Key::W, true);
        assert!(kb.is_pressed(Key::W));
        assert!(!kb.is_pressed(Key::S));
        kb.set(Key::W, false);
        assert!(!kb.is_pressed(Key::W));
    }

    #[test]
    fn clear_releases_all() {
        let mut kb = KeyboardState::new();
        kb.set(Key::A, true);
        kb.set(Key::D, true);
        kb.clear();
        assert_eq!(kb.held().count(), 0);
    }

    #[test]
    fn cursor_displacement_swaps_axes() {
        let mut mouse = MouseState::new();
        mouse.set_in_surface(true);
        mouse.cursor_moved(Vec2::new(10.0, 10.0));
        mouse.cursor_moved(Vec2::new(13.0, 15.0));
        assert_eq!(mouse.displacement, Vec2::new(5.0, 3.0));
    }

    #[test]
    fn cursor_outside_surface_does_not_accumulate() {
        let mut mouse = MouseState::new();
        mouse.cursor_moved(Vec2::new(0.0, 0.0));
        mouse.cursor_moved(Vec2::new(50.0, 50.0));
        assert_eq!(mouse.displacement, Vec2::ZERO);
    }

    #[test]
    fn take_displacement_resets() {
        let mut mouse = MouseState::new();
        mouse.moved_by(2.0, 1.0);
        assert_eq!(mouse.take_displacement(), Vec2::new(1.0, 2.0));
        assert_eq!(mouse.displacement, Vec2::ZERO);
    }
}
