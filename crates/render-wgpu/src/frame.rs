//! Frame loop controller: run-state machine, timing window, and the
//! per-tick bookkeeping that brackets the GPU work.
//!
//! The controller owns the two shared mutable records (settings and
//! simulation state) for the process lifetime; input handlers and the
//! camera integrator work through references. Scheduling is host-driven:
//! every tick ends by asking the injected [`TickSource`] for the next one.

use crate::camera;
use gravpool_common::{Settings, SimulationState};
use gravpool_persist::SettingsStore;
use std::collections::VecDeque;
use std::time::Instant;

/// Controller states. Leaving `Uninitialized` requires both the program
/// builder and the resource loader to have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    ReadyPaused,
    ReadyPlaying,
}

impl RunState {
    fn ready(start_on_load: bool) -> Self {
        if start_on_load {
            RunState::ReadyPlaying
        } else {
            RunState::ReadyPaused
        }
    }

    fn toggled(self) -> Self {
        match self {
            RunState::Uninitialized => RunState::Uninitialized,
            RunState::ReadyPaused => RunState::ReadyPlaying,
            RunState::ReadyPlaying => RunState::ReadyPaused,
        }
    }
}

/// Where the next frame comes from. Production wires this to the window's
/// redraw request; tests count calls.
pub trait TickSource {
    fn request_tick(&self);
}

/// Rolling window of recent frame deltas, newest first.
pub struct FrameTiming {
    samples: VecDeque<f32>,
}

impl FrameTiming {
    pub const CAPACITY: usize = 90;

    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(Self::CAPACITY),
        }
    }

    /// Record a frame delta in seconds, evicting the oldest sample once the
    /// window is full.
    pub fn record(&mut self, delta_seconds: f32) {
        self.samples.push_front(delta_seconds);
        self.samples.truncate(Self::CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Average delta over the window, zero while empty.
    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    pub fn newest(&self) -> Option<f32> {
        self.samples.front().copied()
    }

    pub fn oldest(&self) -> Option<f32> {
        self.samples.back().copied()
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the shared records and sequences each tick:
/// persist -> (integrate while playing) -> GPU steps -> timing -> schedule.
pub struct FrameController {
    pub settings: Settings,
    pub sim: SimulationState,
    state: RunState,
    timing: FrameTiming,
    store: SettingsStore,
    started: Instant,
    last_tick: Instant,
}

impl FrameController {
    /// Load settings through the store bridge and start uninitialized.
    pub fn new(store: SettingsStore) -> Self {
        let settings = store.load();
        if let Err(e) = settings.validate() {
            tracing::warn!(error = %e, "loaded settings out of range");
        }
        let now = Instant::now();
        Self {
            settings,
            sim: SimulationState::default(),
            state: RunState::Uninitialized,
            timing: FrameTiming::new(),
            store,
            started: now,
            last_tick: now,
        }
    }

    /// Transition out of `Uninitialized` once setup has fully completed.
    /// The initial ready state honors `startOnLoad`.
    pub fn mark_ready(&mut self) {
        if self.state == RunState::Uninitialized {
            self.state = RunState::ready(self.settings.start_on_load);
            self.last_tick = Instant::now();
            tracing::info!(playing = self.is_playing(), "renderer ready");
        }
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == RunState::ReadyPlaying
    }

    /// Flip playing/paused and persist. Pausing gates only the camera
    /// integration; frames keep rendering with a frozen camera.
    pub fn toggle_play(&mut self) {
        self.state = self.state.toggled();
        self.persist();
    }

    pub fn toggle_start_on_load(&mut self) {
        self.settings.start_on_load = !self.settings.start_on_load;
        self.persist();
    }

    /// Seconds since process start, for the `time` uniform.
    pub fn elapsed_seconds(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    /// Tick step 1 plus integration: write-through persist, then advance
    /// the camera while playing.
    pub fn begin_tick(&mut self) {
        self.persist();
        if self.is_playing() {
            camera::integrate(&mut self.sim, &mut self.settings);
        }
    }

    /// Tick step 7: record the delta, report the rolling average, and ask
    /// the host for the next frame.
    pub fn end_tick(&mut self, ticks: &dyn TickSource) {
        let now = Instant::now();
        let delta = (now - self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.timing.record(delta);

        let average = self.timing.average();
        let fps = if average > 0.0 { 1.0 / average } else { 0.0 };
        tracing::trace!(delta_ms = delta * 1000.0, avg_fps = fps, "frame rendered");

        ticks.request_tick();
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.settings) {
            tracing::error!(error = %e, "failed to persist settings");
        }
    }
}
