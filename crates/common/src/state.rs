use glam::Vec3;

/// Number of gravitating bodies. Fixed for the lifetime of the process;
/// the shader contract sizes its uniform arrays to match.
pub const BODY_COUNT: usize = 11;

/// Held-key flags for the six movement directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementFlags {
    pub forward: bool,
    pub left: bool,
    pub back: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

/// Process-wide simulation state. Not persisted.
///
/// `ball_positions` and `ball_velocities` are parallel arrays of the same
/// fixed length.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub movement: MovementFlags,
    pub player_velocity: Vec3,
    /// Cursor position in window coordinates (origin top-left).
    pub mouse_coords: (f32, f32),
    pub ball_positions: [Vec3; BODY_COUNT],
    pub ball_velocities: [Vec3; BODY_COUNT],
}

/// Billiard-style rack layout: nine object balls in three rows, a tenth on
/// the wing, and the cue ball behind the camera line.
const RACK: [Vec3; BODY_COUNT] = [
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(-0.5, 0.0, 2.0),
    Vec3::new(0.5, 0.0, 2.0),
    Vec3::new(-1.0, 0.0, 3.0),
    Vec3::new(0.0, 0.0, 3.0),
    Vec3::new(1.0, 0.0, 3.0),
    Vec3::new(-1.5, 0.0, 4.0),
    Vec3::new(-0.5, 0.0, 4.0),
    Vec3::new(0.5, 0.0, 4.0),
    Vec3::new(1.5, 0.0, 4.0),
    Vec3::new(0.0, 0.0, -1.0),
];

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            movement: MovementFlags::default(),
            player_velocity: Vec3::ZERO,
            mouse_coords: (0.0, 0.0),
            ball_positions: RACK,
            ball_velocities: RACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rack_has_fixed_body_count() {
        let state = SimulationState::default();
        assert_eq!(state.ball_positions.len(), BODY_COUNT);
        assert_eq!(state.ball_velocities.len(), state.ball_positions.len());
    }

    #[test]
    fn default_state_is_at_rest() {
        let state = SimulationState::default();
        assert_eq!(state.player_velocity, Vec3::ZERO);
        assert_eq!(state.movement, MovementFlags::default());
    }
}
