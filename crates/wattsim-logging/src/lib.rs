//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters for simulation runs."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the simulation engine and daemon.

use tracing::Level;

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Run identifier associated with the log event.
    pub run: Option<&'a str>,
    /// Monitoring point identifier.
    pub point: Option<&'a str>,
    /// Cycle or historical step index.
    pub step: Option<u64>,
    /// Clock mode (real-time, historical).
    pub mode: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a run identifier.
    pub fn with_run(mut self, run: &'a str) -> Self {
        self.run = Some(run);
        self
    }

    /// Attach a monitoring point identifier.
    pub fn with_point(mut self, point: &'a str) -> Self {
        self.point = Some(point);
        self
    }

    /// Attach a step index.
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    /// Attach a clock mode descriptor.
    pub fn with_mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation was rejected or aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event (run started, stopped, completed).
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    // `tracing::event!` needs a constant level, hence the two arms.
    match outcome {
        SystemEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            run = ctx.run.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            step = ctx.step.unwrap_or_default(),
            mode = ctx.mode.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::event!(
            Level::WARN,
            event,
            outcome = outcome.as_str(),
            run = ctx.run.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            step = ctx.step.unwrap_or_default(),
            mode = ctx.mode.unwrap_or(""),
            message = %message
        ),
    }
}
