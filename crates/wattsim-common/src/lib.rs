//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the simulator runtime."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the WattSim workspace.
//! This crate exposes configuration loading, tracing setup, boundary date
//! parsing, and cycle timing statistics consumed across the workspace.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, PeakWindowConfig, PointConfig, SimulationSettings,
    SinkConfig, SinkKind,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{CycleTimer, DurationStats, DurationSummary};
pub use time::{format_sim_datetime, parse_sim_datetime, TimeError, SIM_DATETIME_FORMAT};
