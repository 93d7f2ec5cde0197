//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Run state snapshots and events emitted by the simulation clock."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::ClockMode;
use crate::reading::{Reading, ReadingStatus};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
}

/// Counters for one run. `active + inactive + error == total_sent`;
/// readings the sink rejected are only counted in `failed`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct RunStatistics {
    pub total_sent: u64,
    pub active: u64,
    pub inactive: u64,
    pub error: u64,
    pub failed: u64,
    pub cycles: u64,
}

impl RunStatistics {
    pub(crate) fn record_sent(&mut self, status: ReadingStatus) {
        self.total_sent += 1;
        match status {
            ReadingStatus::Active => self.active += 1,
            ReadingStatus::Inactive => self.inactive += 1,
            ReadingStatus::Error => self.error += 1,
        }
    }
}

/// Historical progress after one step.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressReport {
    /// Zero-based index of the step just processed.
    pub step_index: u64,
    pub total_steps: u64,
    pub percent_complete: f64,
    pub current_sim_time: NaiveDateTime,
}

impl ProgressReport {
    pub fn new(step_index: u64, total_steps: u64, current_sim_time: NaiveDateTime) -> Self {
        let percent = if total_steps == 0 {
            100.0
        } else {
            let raw = step_index as f64 / total_steps as f64 * 100.0;
            ((raw * 10.0).round() / 10.0).min(100.0)
        };
        Self {
            step_index,
            total_steps,
            percent_complete: percent,
            current_sim_time,
        }
    }
}

/// Snapshot of the clock's run state. Only the run task writes it, once per
/// cycle, so readers never observe a half-processed cycle.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct RunState {
    pub run_id: Option<String>,
    pub status: RunStatus,
    pub running: bool,
    pub mode: Option<ClockMode>,
    pub current_sim_time: Option<NaiveDateTime>,
    pub batch_index: u64,
    pub stats: RunStatistics,
    pub progress: Option<ProgressReport>,
    pub started_at: Option<NaiveDateTime>,
}

impl RunState {
    pub fn total_sent(&self) -> u64 {
        self.stats.total_sent
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationEvent {
    StatusChanged {
        run_id: String,
        status: RunStatus,
        mode: ClockMode,
    },
    CycleCompleted {
        run_id: String,
        step: u64,
        sim_time: NaiveDateTime,
        readings: Vec<Reading>,
        stats: RunStatistics,
    },
    PointFailed {
        run_id: String,
        point_id: String,
        sim_time: NaiveDateTime,
        error: String,
    },
    Progress {
        run_id: String,
        progress: ProgressReport,
    },
    Completed {
        run_id: String,
        stats: RunStatistics,
    },
}

impl SimulationEvent {
    pub fn run_id(&self) -> &str {
        match self {
            SimulationEvent::StatusChanged { run_id, .. }
            | SimulationEvent::CycleCompleted { run_id, .. }
            | SimulationEvent::PointFailed { run_id, .. }
            | SimulationEvent::Progress { run_id, .. }
            | SimulationEvent::Completed { run_id, .. } => run_id,
        }
    }
}
