//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Boundary timestamp parsing and duration helpers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Wire format for simulated timestamps at the configuration boundary.
pub const SIM_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("invalid date '{value}', expected YYYY-MM-DD HH:mm:ss: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parse a `YYYY-MM-DD HH:mm:ss` local timestamp.
pub fn parse_sim_datetime(value: &str) -> Result<NaiveDateTime, TimeError> {
    NaiveDateTime::parse_from_str(value.trim(), SIM_DATETIME_FORMAT).map_err(|source| {
        TimeError::InvalidDate {
            value: value.to_owned(),
            source,
        }
    })
}

pub fn format_sim_datetime(value: &NaiveDateTime) -> String {
    value.format(SIM_DATETIME_FORMAT).to_string()
}

/// Convert a duration into milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Number of `step`s needed to cover `span`, rounding up. Zero when either is empty.
///
/// Works at nanosecond resolution so sub-millisecond steps count exactly.
pub fn steps_to_cover(span: Duration, step: Duration) -> u64 {
    let span = span.as_nanos();
    let step = step.as_nanos();
    if span == 0 || step == 0 {
        return 0;
    }
    u64::try_from(span.div_ceil(step)).unwrap_or(u64::MAX)
}
