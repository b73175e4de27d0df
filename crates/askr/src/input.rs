//! Pointer input state.
//!
//! The [`PointerState`] resource tracks the cursor position (canvas pixels)
//! and which mouse buttons are held, just pressed, or just released this
//! tick. The host window feeds it; GUI nodes such as
//! [`ButtonNode`](crate::gui::ButtonNode) read it.

use std::collections::HashSet;
use std::hash::Hash;

use crate::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Tracks the state of a set of inputs.
///
/// - `pressed`: currently held down
/// - `just_pressed`: pressed this tick (not held last tick)
/// - `just_released`: released this tick
#[derive(Debug, Clone)]
pub struct Input<T: Eq + Hash + Copy> {
    pressed: HashSet<T>,
    just_pressed: HashSet<T>,
    just_released: HashSet<T>,
}

impl<T: Eq + Hash + Copy> Input<T> {
    pub fn new() -> Self {
        Self {
            pressed: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
        }
    }

    pub fn pressed(&self, input: T) -> bool {
        self.pressed.contains(&input)
    }

    pub fn just_pressed(&self, input: T) -> bool {
        self.just_pressed.contains(&input)
    }

    pub fn just_released(&self, input: T) -> bool {
        self.just_released.contains(&input)
    }

    pub fn press(&mut self, input: T) {
        if self.pressed.insert(input) {
            self.just_pressed.insert(input);
        }
    }

    pub fn release(&mut self, input: T) {
        if self.pressed.remove(&input) {
            self.just_released.insert(input);
        }
    }

    /// Clear per-tick state. The engine calls this at the end of each tick.
    pub fn clear_just(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

impl<T: Eq + Hash + Copy> Default for Input<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor position plus mouse buttons.
#[derive(Debug, Clone, Default)]
pub struct PointerState {
    position: Vec2,
    buttons: Input<MouseButton>,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn buttons(&self) -> &Input<MouseButton> {
        &self.buttons
    }

    pub fn pressed(&self, button: MouseButton) -> bool {
        self.buttons.pressed(button)
    }

    pub fn press(&mut self, button: MouseButton) {
        self.buttons.press(button);
    }

    pub fn release(&mut self, button: MouseButton) {
        self.buttons.release(button);
    }

    pub fn clear_just(&mut self) {
        self.buttons.clear_just();
    }
}
