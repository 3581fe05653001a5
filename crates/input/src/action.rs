use gravpool_common::{Settings, SimulationState};
use winit::keyboard::KeyCode;

/// One of the six flyable directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Left,
    Back,
    Right,
    Up,
    Down,
}

/// A high-level action produced from raw window events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Raise or clear one movement flag.
    Movement { direction: Direction, held: bool },
    /// Restore the camera position to the compiled-in default.
    ResetCamera,
    /// Cursor moved, in window coordinates (origin top-left).
    PointerMoved { x: f32, y: f32 },
    /// Key without defined behavior; ignored.
    Noop,
}

/// Map a physical key transition to an action.
///
/// Reset fires on press only; releases of unbound keys are swallowed.
pub fn map_key(key: KeyCode, pressed: bool) -> Action {
    let direction = match key {
        KeyCode::KeyW => Some(Direction::Forward),
        KeyCode::KeyA => Some(Direction::Left),
        KeyCode::KeyS => Some(Direction::Back),
        KeyCode::KeyD => Some(Direction::Right),
        KeyCode::KeyQ => Some(Direction::Up),
        KeyCode::KeyE => Some(Direction::Down),
        _ => None,
    };
    if let Some(direction) = direction {
        return Action::Movement {
            direction,
            held: pressed,
        };
    }
    if key == KeyCode::KeyR && pressed {
        return Action::ResetCamera;
    }
    tracing::debug!(?key, pressed, "unbound key");
    Action::Noop
}

/// Apply an action to the shared records.
pub fn apply(action: Action, state: &mut SimulationState, settings: &mut Settings) {
    match action {
        Action::Movement { direction, held } => {
            let flag = match direction {
                Direction::Forward => &mut state.movement.forward,
                Direction::Left => &mut state.movement.left,
                Direction::Back => &mut state.movement.back,
                Direction::Right => &mut state.movement.right,
                Direction::Up => &mut state.movement.up,
                Direction::Down => &mut state.movement.down,
            };
            *flag = held;
        }
        Action::ResetCamera => {
            settings.camera_position = Settings::DEFAULT_CAMERA_POSITION;
        }
        Action::PointerMoved { x, y } => {
            state.mouse_coords = (x, y);
        }
        Action::Noop => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn movement_keys_map_to_flags() {
        let cases = [
            (KeyCode::KeyW, Direction::Forward),
            (KeyCode::KeyA, Direction::Left),
            (KeyCode::KeyS, Direction::Back),
            (KeyCode::KeyD, Direction::Right),
            (KeyCode::KeyQ, Direction::Up),
            (KeyCode::KeyE, Direction::Down),
        ];
        for (key, direction) in cases {
            assert_eq!(
                map_key(key, true),
                Action::Movement {
                    direction,
                    held: true
                }
            );
            assert_eq!(
                map_key(key, false),
                Action::Movement {
                    direction,
                    held: false
                }
            );
        }
    }

    #[test]
    fn press_and_release_toggle_flag() {
        let mut state = SimulationState::default();
        let mut settings = Settings::default();
        apply(map_key(KeyCode::KeyW, true), &mut state, &mut settings);
        assert!(state.movement.forward);
        apply(map_key(KeyCode::KeyW, false), &mut state, &mut settings);
        assert!(!state.movement.forward);
    }

    #[test]
    fn reset_fires_on_press_only() {
        assert_eq!(map_key(KeyCode::KeyR, true), Action::ResetCamera);
        assert_eq!(map_key(KeyCode::KeyR, false), Action::Noop);
    }

    #[test]
    fn reset_restores_position_leaves_velocity() {
        let mut state = SimulationState::default();
        state.player_velocity = Vec3::new(0.3, -0.2, 1.1);
        let mut settings = Settings {
            camera_position: Vec3::new(40.0, 7.0, -2.0),
            ..Settings::default()
        };
        apply(Action::ResetCamera, &mut state, &mut settings);
        assert_eq!(settings.camera_position, Settings::DEFAULT_CAMERA_POSITION);
        assert_eq!(state.player_velocity, Vec3::new(0.3, -0.2, 1.1));
    }

    #[test]
    fn unbound_keys_are_noop() {
        assert_eq!(map_key(KeyCode::Space, true), Action::Noop);
        assert_eq!(map_key(KeyCode::F5, true), Action::Noop);
    }

    #[test]
    fn pointer_updates_mouse_coords() {
        let mut state = SimulationState::default();
        let mut settings = Settings::default();
        apply(
            Action::PointerMoved { x: 320.0, y: 14.5 },
            &mut state,
            &mut settings,
        );
        assert_eq!(state.mouse_coords, (320.0, 14.5));
    }
}
