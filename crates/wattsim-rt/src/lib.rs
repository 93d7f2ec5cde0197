//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting the simulation clock."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Scheduling helpers for the WattSim runtime.

pub mod scheduling;

pub use scheduling::{BatchPacer, PaceOutcome, RateLimiter, StopSignal, StopToken};
