//! Physical key -> viewer action.

use corelib::controls::MoveKey;
use winit::keyboard::KeyCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Held while the key is down.
    Move(MoveKey),
    ToggleFullscreen,
    ToggleWireframe,
    Exit,
}

pub fn action_for(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::KeyW => Action::Move(MoveKey::Forward),
        KeyCode::KeyS => Action::Move(MoveKey::Backward),
        KeyCode::KeyA => Action::Move(MoveKey::Left),
        KeyCode::KeyD => Action::Move(MoveKey::Right),
        KeyCode::Space => Action::Move(MoveKey::Up),
        KeyCode::ControlLeft | KeyCode::ControlRight => Action::Move(MoveKey::Down),
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Action::Move(MoveKey::Run),
        KeyCode::KeyF => Action::ToggleFullscreen,
        KeyCode::KeyP => Action::ToggleWireframe,
        KeyCode::Escape => Action::Exit,
        _ => return None,
    };
    Some(action)
}
