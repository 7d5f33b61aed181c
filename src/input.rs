use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Only the primary button drives the orbit camera.
    pub fn drives_drag(self) -> bool {
        self == Self::LEFT
    }
}

/// Pointer drag state fed by the platform's input events and read by the
/// frame orchestrator once per tick.
///
/// Positions are in physical pixels relative to the render target origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    active: bool,
    last: Vec2,
    current: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a drag at `position`.
    pub fn press(&mut self, position: Vec2) {
        self.active = true;
        self.last = position;
        self.current = position;
    }

    /// Records pointer movement. Ignored unless a drag is active.
    pub fn move_to(&mut self, position: Vec2) {
        if self.active {
            self.current = position;
        }
    }

    /// Ends the drag and clears both positions.
    pub fn release(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `(current, previous)` while a drag is in progress.
    pub fn drag(&self) -> Option<(Vec2, Vec2)> {
        self.active.then_some((self.current, self.last))
    }

    /// Marks the pending movement as applied.
    pub fn mark_consumed(&mut self) {
        self.last = self.current;
    }
}

/// Maps a pixel position into arcball space, `[-0.5, 0.5]` on each axis.
///
/// The `z` component is left at zero so the camera derives it from the
/// sphere equation.
pub fn normalized(position: Vec2, size: (u32, u32)) -> Vec3 {
    let width = size.0.max(1) as f32;
    let height = size.1.max(1) as f32;
    Vec3::new(position.x / width - 0.5, position.y / height - 0.5, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_is_ignored_until_pressed() {
        let mut state = InputState::new();
        state.move_to(Vec2::new(10.0, 20.0));
        assert!(!state.is_active());
        assert_eq!(state, InputState::default());
        assert!(state.drag().is_none());
    }

    #[test]
    fn drag_tracks_previous_until_consumed() {
        let mut state = InputState::new();
        state.press(Vec2::new(5.0, 5.0));
        state.move_to(Vec2::new(8.0, 9.0));
        state.move_to(Vec2::new(12.0, 3.0));
        assert_eq!(
            state.drag(),
            Some((Vec2::new(12.0, 3.0), Vec2::new(5.0, 5.0)))
        );
        state.mark_consumed();
        assert_eq!(
            state.drag(),
            Some((Vec2::new(12.0, 3.0), Vec2::new(12.0, 3.0)))
        );
    }

    #[test]
    fn release_resets_to_zero() {
        let mut state = InputState::new();
        state.press(Vec2::new(5.0, 5.0));
        state.move_to(Vec2::new(6.0, 7.0));
        state.release();
        assert_eq!(state, InputState::default());
        assert!(!state.is_active());
    }

    #[test]
    fn normalization_centers_the_target() {
        let size = (800, 600);
        assert_eq!(normalized(Vec2::new(400.0, 300.0), size), Vec3::ZERO);
        assert_eq!(
            normalized(Vec2::new(0.0, 600.0), size),
            Vec3::new(-0.5, 0.5, 0.0)
        );
        // Zero-sized targets do not divide by zero.
        assert!(normalized(Vec2::new(1.0, 1.0), (0, 0)).is_finite());
    }

    #[test]
    fn only_left_button_drags() {
        assert!(MouseButton::new(0).drives_drag());
        assert!(!MouseButton::RIGHT.drives_drag());
        assert_eq!(MouseButton::MIDDLE.index(), 2);
    }
}
