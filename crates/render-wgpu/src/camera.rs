//! Damped fly-camera integrator.
//!
//! Invoked once per tick while playing. Velocity deltas are fixed per
//! invocation, NOT scaled by elapsed wall-clock time; motion is
//! frame-rate dependent and must stay that way.

use gravpool_common::{MovementFlags, Settings, SimulationState};

/// Velocity gained per tick while a movement flag is held.
pub const MOVE_STEP: f32 = 0.1;
/// Per-tick decay factor applied to an axis with neither flag held.
/// Drives velocity asymptotically toward zero, never snapping it.
pub const DAMPING: f32 = 0.85;

/// One integration tick: flags -> velocity -> position.
///
/// Play gating happens one level up, in the frame controller.
pub fn integrate(state: &mut SimulationState, settings: &mut Settings) {
    let MovementFlags {
        forward,
        left,
        back,
        right,
        up,
        down,
    } = state.movement;

    axis(&mut state.player_velocity.x, right, left);
    axis(&mut state.player_velocity.y, up, down);
    axis(&mut state.player_velocity.z, forward, back);

    settings.camera_position += state.player_velocity;
}

fn axis(velocity: &mut f32, positive: bool, negative: bool) {
    if positive {
        *velocity += MOVE_STEP;
    }
    if negative {
        *velocity -= MOVE_STEP;
    }
    if !positive && !negative {
        *velocity *= DAMPING;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn unflagged_velocity_decays_geometrically() {
        let mut state = SimulationState::default();
        let mut settings = Settings::default();
        let v0 = Vec3::new(1.0, -2.0, 0.5);
        state.player_velocity = v0;

        for n in 1..=20 {
            integrate(&mut state, &mut settings);
            let factor = DAMPING.powi(n);
            approx(state.player_velocity.x, v0.x * factor);
            approx(state.player_velocity.y, v0.y * factor);
            approx(state.player_velocity.z, v0.z * factor);
        }
        // Asymptotic: never snapped to exactly zero.
        assert_ne!(state.player_velocity, Vec3::ZERO);
    }

    #[test]
    fn held_flag_accumulates_fixed_steps() {
        let mut state = SimulationState::default();
        let mut settings = Settings::default();
        state.movement.up = true;

        let ticks = 7;
        for _ in 0..ticks {
            integrate(&mut state, &mut settings);
        }
        approx(state.player_velocity.y, MOVE_STEP * ticks as f32);
    }

    #[test]
    fn opposite_flags_cancel() {
        let mut state = SimulationState::default();
        let mut settings = Settings::default();
        state.movement.forward = true;
        state.movement.back = true;

        integrate(&mut state, &mut settings);
        approx(state.player_velocity.z, 0.0);
    }

    #[test]
    fn position_moves_by_velocity_every_tick() {
        let mut state = SimulationState::default();
        let mut settings = Settings::default();
        let start = settings.camera_position;
        state.player_velocity = Vec3::new(0.0, 0.0, 2.0);

        integrate(&mut state, &mut settings);
        // Position advances by the post-damping velocity of this tick.
        approx(
            settings.camera_position.z - start.z,
            2.0 * DAMPING,
        );
    }

    #[test]
    fn axis_signs_match_directions() {
        let mut state = SimulationState::default();
        let mut settings = Settings::default();
        state.movement.left = true;
        state.movement.down = true;
        state.movement.back = true;

        integrate(&mut state, &mut settings);
        assert!(state.player_velocity.x < 0.0);
        assert!(state.player_velocity.y < 0.0);
        assert!(state.player_velocity.z < 0.0);
    }
}
