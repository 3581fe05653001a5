//! Shared types and utilities for the gravpool renderer.

pub mod settings;
pub mod state;

pub use settings::{Settings, SettingsError};
pub use state::{BODY_COUNT, MovementFlags, SimulationState};
