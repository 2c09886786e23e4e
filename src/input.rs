//! Mouse and keyboard handling for the orbiting camera.

use glam::Vec2;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

/// Cursor jumps at or above this many pixels on either axis are ignored.
pub const MAX_ROTATION_DISTANCE: f32 = 30.0;

/// Identifier for a keyboard key, independent of the windowing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Escape" | "Esc" => Some(Self::Named(NamedKey::Escape)),
            "Space" => Some(Self::Named(NamedKey::Space)),
            "Enter" | "Return" => Some(Self::Named(NamedKey::Enter)),
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) if ch.is_ascii_alphanumeric() => {
                        Some(Self::Character(ch.to_ascii_uppercase()))
                    }
                    _ => None,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Escape,
    Space,
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// What the frame driver should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Continue,
    Exit,
}

/// Turns raw window input into camera commands.
///
/// Dragging with the left or right button held orbits the camera, the
/// wheel zooms, `R` resets and `Escape` requests exit.
#[derive(Debug, Default)]
pub struct CameraInput {
    rotation_enabled: bool,
    last_cursor: Option<Vec2>,
}

impl CameraInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if matches!(button, MouseButton::Left | MouseButton::Right) {
            self.rotation_enabled = pressed;
        }
    }

    /// Records the cursor and orbits the camera by the movement since the
    /// previous call. The first call only records. Returns whether the
    /// camera moved.
    pub fn cursor_moved(&mut self, camera: &mut Camera, position: Vec2) -> bool {
        let Some(previous) = self.last_cursor.replace(position) else {
            return false;
        };
        if !self.rotation_enabled {
            return false;
        }
        let delta = position - previous;
        if delta.x.abs() >= MAX_ROTATION_DISTANCE || delta.y.abs() >= MAX_ROTATION_DISTANCE {
            warn!(
                "ignoring cursor jump of ({:.0}, {:.0}) px",
                delta.x, delta.y
            );
            return false;
        }
        camera.rotate(delta.x, delta.y);
        true
    }

    /// Scrolling up (positive `delta`) zooms in, down zooms out.
    pub fn wheel(&mut self, camera: &mut Camera, delta: f32) {
        if delta > 0.0 {
            camera.zoom_in();
        } else if delta < 0.0 {
            camera.zoom_out();
        }
    }

    pub fn key_pressed(&mut self, camera: &mut Camera, key: KeyCode) -> InputAction {
        match key {
            KeyCode::Named(NamedKey::Escape) => InputAction::Exit,
            KeyCode::Character('R') | KeyCode::Character('r') => {
                camera.reset();
                InputAction::Continue
            }
            _ => InputAction::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(800.0, 600.0)
    }

    #[test]
    fn parses_key_names() {
        assert_eq!(
            KeyCode::from_name("Esc"),
            Some(KeyCode::Named(NamedKey::Escape))
        );
        assert_eq!(KeyCode::from_name("r"), Some(KeyCode::Character('R')));
        assert_eq!(KeyCode::from_name("F13"), None);
    }

    #[test]
    fn first_motion_only_records() {
        let mut input = CameraInput::new();
        let mut camera = camera();
        input.mouse_button(MouseButton::Left, true);
        assert!(!input.cursor_moved(&mut camera, Vec2::new(100.0, 100.0)));
        assert_eq!(camera, self::camera());
        assert!(input.cursor_moved(&mut camera, Vec2::new(110.0, 95.0)));
        assert_ne!(camera, self::camera());
    }

    #[test]
    fn motion_without_button_is_ignored() {
        let mut input = CameraInput::new();
        let mut camera = camera();
        input.cursor_moved(&mut camera, Vec2::ZERO);
        assert!(!input.cursor_moved(&mut camera, Vec2::new(5.0, 5.0)));
        input.mouse_button(MouseButton::Middle, true);
        assert!(!input.rotation_enabled());
        input.mouse_button(MouseButton::Right, true);
        assert!(input.cursor_moved(&mut camera, Vec2::new(10.0, 10.0)));
        input.mouse_button(MouseButton::Right, false);
        assert!(!input.cursor_moved(&mut camera, Vec2::new(12.0, 10.0)));
    }

    #[test]
    fn large_jumps_are_dropped_but_tracked() {
        let mut input = CameraInput::new();
        let mut camera = camera();
        input.mouse_button(MouseButton::Left, true);
        input.cursor_moved(&mut camera, Vec2::ZERO);
        assert!(!input.cursor_moved(&mut camera, Vec2::new(30.0, 0.0)));
        assert_eq!(camera, self::camera());
        assert!(input.cursor_moved(&mut camera, Vec2::new(31.0, 0.0)));
    }

    #[test]
    fn wheel_and_keys_drive_the_camera() {
        let mut input = CameraInput::new();
        let mut camera = camera();
        let radius = camera.radius();
        input.wheel(&mut camera, 1.0);
        assert!(camera.radius() < radius);
        input.wheel(&mut camera, -1.0);
        input.wheel(&mut camera, -1.0);
        assert!(camera.radius() > radius);
        let before = camera.radius();
        input.wheel(&mut camera, 0.0);
        assert_eq!(camera.radius(), before);

        assert_eq!(
            input.key_pressed(&mut camera, KeyCode::Character('R')),
            InputAction::Continue
        );
        assert_eq!(camera, self::camera());
        assert_eq!(
            input.key_pressed(&mut camera, KeyCode::Named(NamedKey::Escape)),
            InputAction::Exit
        );
    }
}
