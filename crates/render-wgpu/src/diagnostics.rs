//! GPU diagnostics monitor.
//!
//! Risky device calls run inside a validation error scope; after each, one
//! non-blocking pop observes the error state. A captured error is logged
//! together with the program's and both shader stages' diagnostic context,
//! and execution always continues.

use crate::program::ProgramHandle;

/// Retained diagnostic context plus the error-scope wrapper.
pub struct DiagnosticsMonitor {
    program: String,
    vertex: String,
    fragment: String,
}

impl DiagnosticsMonitor {
    pub fn new(program: &ProgramHandle) -> Self {
        Self {
            program: program.diagnostic(),
            vertex: program.vertex.diagnostic(),
            fragment: program.fragment.diagnostic(),
        }
    }

    /// Run `f` inside a validation scope and poll the error state after.
    /// Never raises; a captured error is logged with full context.
    pub fn scoped<T>(&self, device: &wgpu::Device, label: &str, f: impl FnOnce() -> T) -> T {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f();
        // Validation happens synchronously on native backends, so this
        // resolves without waiting on the GPU.
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            tracing::error!(
                label,
                error = %error,
                program = %self.program,
                vertex = %self.vertex,
                fragment = %self.fragment,
                "GPU error state"
            );
        }
        out
    }
}
