//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Error taxonomy for configuration, persistence, and run control."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use thiserror::Error;
use wattsim_common::TimeError;

/// Rejected configuration. Always surfaces from `start()` before any state changes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidDate(#[from] TimeError),
    #[error("end_date is set but start_date is missing")]
    EndWithoutStart,
    #[error("start_date {start} must be before end_date {end}")]
    StartNotBeforeEnd { start: String, end: String },
    #[error("interval of {actual_ms} ms is below the minimum of {minimum_ms} ms")]
    IntervalTooShort { actual_ms: u64, minimum_ms: u64 },
    #[error("step must be greater than zero")]
    ZeroStep,
    #[error("step of {0} ms cannot be represented as a calendar offset")]
    StepTooLarge(u64),
    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,
    #[error("{field} = {value} is outside {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("peak window '{name}' has invalid hours [{start_hour}, {end_hour})")]
    InvalidPeakWindow {
        name: String,
        start_hour: u32,
        end_hour: u32,
    },
    #[error("point '{id}': {reason}")]
    InvalidPoint { id: String, reason: &'static str },
}

/// Failure handing a single reading to the persistence collaborator.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("reading rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid simulation configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("simulation run {run_id} is already active")]
    AlreadyRunning { run_id: String },
    #[error("unknown monitoring point '{0}'")]
    UnknownPoint(String),
}
