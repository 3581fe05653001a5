//! Desktop input mapped to renderer actions.
//!
//! # Invariants
//! - The frame loop consumes actions, never raw window events.
//! - Only w/a/s/d/q/e (movement) and r (camera reset) have defined
//!   behavior; every other key maps to [`Action::Noop`].

pub mod action;

pub use action::{Action, Direction, apply, map_key};
