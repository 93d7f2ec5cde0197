//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Reading records produced by the generator."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Active,
    Inactive,
    Error,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Active => "active",
            ReadingStatus::Inactive => "inactive",
            ReadingStatus::Error => "error",
        }
    }
}

/// One synthetic consumption sample for a monitoring point.
///
/// Inactive and error readings always carry `0.0` kWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub point_id: String,
    pub status: ReadingStatus,
    pub consumption_kwh: f64,
    pub timestamp: NaiveDateTime,
}

impl Reading {
    pub fn active(point_id: &str, consumption_kwh: f64, timestamp: NaiveDateTime) -> Self {
        Self {
            point_id: point_id.to_owned(),
            status: ReadingStatus::Active,
            consumption_kwh,
            timestamp,
        }
    }

    pub fn inactive(point_id: &str, timestamp: NaiveDateTime) -> Self {
        Self {
            point_id: point_id.to_owned(),
            status: ReadingStatus::Inactive,
            consumption_kwh: 0.0,
            timestamp,
        }
    }

    pub fn error(point_id: &str, timestamp: NaiveDateTime) -> Self {
        Self {
            point_id: point_id.to_owned(),
            status: ReadingStatus::Error,
            consumption_kwh: 0.0,
            timestamp,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReadingStatus::Active
    }
}
