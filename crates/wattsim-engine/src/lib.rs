//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation engine module exports and shared types."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Reading generation and time-stepping engine.
//!
//! [`generator::generate`] turns a monitoring point, a simulated timestamp and
//! the run configuration into a single [`Reading`]. [`SimulationClock`] decides
//! which timestamps to feed it, either ticking in real time or fast-forwarding
//! through a historical range with batch pacing.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod point;
pub mod random;
pub mod reading;
pub mod sink;

pub use clock::{LocalClock, ManualClock, SimulationClock, TimeSource};
pub use config::{ClockMode, ClockPlan, PeakWindow, SimulationConfig};
pub use error::{ConfigError, SimError, SinkError};
pub use events::{ProgressReport, RunState, RunStatistics, RunStatus, SimulationEvent};
pub use generator::generate;
pub use point::{MonitoringPoint, PointRegistry, PointView, SharedPoint};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use reading::{Reading, ReadingStatus};
pub use sink::{JsonLinesSink, MemorySink, ReadingSink, TracingSink};
