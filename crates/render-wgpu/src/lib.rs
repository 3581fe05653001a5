//! wgpu ray-march backend for gravpool.
//!
//! Renders a full-screen quad through a WGSL ray-marching program driven by
//! a fixed uniform contract. Setup follows a strict order: shader compile,
//! link, location resolution, then texture/buffer upload; no draw is legal
//! before all four complete.
//!
//! # Invariants
//! - The renderer never mutates simulation state; the frame controller owns
//!   both shared records and the integrator works through references.
//! - Camera motion is intentionally frame-rate dependent (fixed per-tick
//!   deltas, no wall-clock scaling).
//! - GPU errors observed after risky calls are logged, never raised.

pub mod camera;
pub mod diagnostics;
pub mod frame;
pub mod gpu;
pub mod program;
pub mod resources;
pub mod uniforms;

pub use diagnostics::DiagnosticsMonitor;
pub use frame::{FrameController, FrameTiming, RunState, TickSource};
pub use gpu::{FrameReport, RaymarchRenderer};
pub use program::{ProgramBindings, ProgramError, ProgramHandle, ShaderStage, compile, link};
