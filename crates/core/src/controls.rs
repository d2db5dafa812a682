//! Windowing-agnostic movement input.

/// A logical movement action; the platform layer maps physical keys onto these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKey {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    Run,
}

/// Snapshot of the currently held movement keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub run: bool,
}

impl MoveKeys {
    pub fn set(&mut self, key: MoveKey, pressed: bool) {
        let slot = match key {
            MoveKey::Forward => &mut self.forward,
            MoveKey::Backward => &mut self.backward,
            MoveKey::Left => &mut self.left,
            MoveKey::Right => &mut self.right,
            MoveKey::Up => &mut self.up,
            MoveKey::Down => &mut self.down,
            MoveKey::Run => &mut self.run,
        };
        *slot = pressed;
    }

    /// Release everything, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
