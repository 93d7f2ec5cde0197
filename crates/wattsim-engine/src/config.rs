//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Validated run configuration and clock plan resolution."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use wattsim_common::config::{PeakWindowConfig, SimulationSettings};
use wattsim_common::time::{duration_to_millis, format_sim_datetime, parse_sim_datetime, steps_to_cover};

use crate::error::ConfigError;

/// Named `[start_hour, end_hour)` window in local time.
///
/// A window whose start is after its end wraps midnight, so `[22, 6)` covers
/// 22:00–05:59.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl PeakWindow {
    pub fn new(name: impl Into<String>, start_hour: u32, end_hour: u32) -> Self {
        Self {
            name: name.into(),
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hour > 23 || self.end_hour > 24 || self.start_hour == self.end_hour {
            return Err(ConfigError::InvalidPeakWindow {
                name: self.name.clone(),
                start_hour: self.start_hour,
                end_hour: self.end_hour,
            });
        }
        Ok(())
    }
}

impl From<&PeakWindowConfig> for PeakWindow {
    fn from(value: &PeakWindowConfig) -> Self {
        Self::new(value.name.clone(), value.start_hour, value.end_hour)
    }
}

/// Immutable tunables for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub interval: Duration,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub step: Duration,
    pub simulate_peaks: bool,
    pub peak_windows: Vec<PeakWindow>,
    pub peak_factor: f64,
    pub weekend_factor: f64,
    pub consumption_variance: f64,
    pub error_probability: f64,
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for SimulationConfig {
    /// Real-time run with the file-level defaults.
    fn default() -> Self {
        Self::from_tunables(&SimulationSettings::default(), None, None)
    }
}

impl SimulationConfig {
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1_000);

    /// Build a validated config from file settings, parsing boundary date strings.
    pub fn from_settings(settings: &SimulationSettings) -> Result<Self, ConfigError> {
        let config = Self::from_tunables(
            settings,
            parse_optional_date(settings.start_date.as_deref())?,
            parse_optional_date(settings.end_date.as_deref())?,
        );
        config.validate()?;
        Ok(config)
    }

    fn from_tunables(
        settings: &SimulationSettings,
        start_date: Option<NaiveDateTime>,
        end_date: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            interval: settings.interval,
            start_date,
            end_date,
            step: settings.step,
            simulate_peaks: settings.simulate_peaks,
            peak_windows: settings.peak_windows.iter().map(PeakWindow::from).collect(),
            peak_factor: settings.peak_factor,
            weekend_factor: settings.weekend_factor,
            consumption_variance: settings.consumption_variance,
            error_probability: settings.error_probability,
            batch_size: settings.batch_size,
            batch_delay: settings.batch_delay,
        }
    }

    /// Configure a historical range. `end` of `None` means "catch up to now".
    pub fn with_range(mut self, start: NaiveDateTime, end: Option<NaiveDateTime>) -> Self {
        self.start_date = Some(start);
        self.end_date = end;
        self
    }

    pub fn mode(&self) -> ClockMode {
        if self.start_date.is_some() {
            ClockMode::Historical
        } else {
            ClockMode::RealTime
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval < Self::MIN_INTERVAL {
            return Err(ConfigError::IntervalTooShort {
                actual_ms: duration_to_millis(self.interval),
                minimum_ms: duration_to_millis(Self::MIN_INTERVAL),
            });
        }
        if self.step.is_zero() {
            return Err(ConfigError::ZeroStep);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        check_range("peak_factor", self.peak_factor, 1.0, f64::MAX, "[1, inf)")?;
        check_range("weekend_factor", self.weekend_factor, 0.0, 1.0, "[0, 1]")?;
        check_range(
            "consumption_variance",
            self.consumption_variance,
            0.0,
            1.0,
            "[0, 1]",
        )?;
        check_range("error_probability", self.error_probability, 0.0, 1.0, "[0, 1]")?;
        for window in &self.peak_windows {
            window.validate()?;
        }
        match (self.start_date, self.end_date) {
            (None, Some(_)) => Err(ConfigError::EndWithoutStart),
            (Some(start), Some(end)) if start >= end => Err(ConfigError::StartNotBeforeEnd {
                start: format_sim_datetime(&start),
                end: format_sim_datetime(&end),
            }),
            _ => Ok(()),
        }
    }

    /// Validate and resolve the clock plan. `now` closes open-ended historical ranges.
    pub fn plan(&self, now: NaiveDateTime) -> Result<ClockPlan, ConfigError> {
        self.validate()?;
        let Some(start) = self.start_date else {
            return Ok(ClockPlan::RealTime {
                interval: self.interval,
            });
        };
        let end = self.end_date.unwrap_or(now);
        if start >= end {
            return Err(ConfigError::StartNotBeforeEnd {
                start: format_sim_datetime(&start),
                end: format_sim_datetime(&end),
            });
        }
        let step = chrono::Duration::from_std(self.step)
            .map_err(|_| ConfigError::StepTooLarge(duration_to_millis(self.step)))?;
        Ok(ClockPlan::Historical { start, end, step })
    }
}

fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDateTime>, ConfigError> {
    match value.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Ok(Some(parse_sim_datetime(raw)?)),
        None => Ok(None),
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ClockMode {
    RealTime,
    Historical,
}

impl ClockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClockMode::RealTime => "real-time",
            ClockMode::Historical => "historical",
        }
    }
}

/// Clock strategy fixed at `start()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockPlan {
    RealTime {
        interval: Duration,
    },
    Historical {
        start: NaiveDateTime,
        end: NaiveDateTime,
        step: chrono::Duration,
    },
}

impl ClockPlan {
    pub fn mode(&self) -> ClockMode {
        match self {
            ClockPlan::RealTime { .. } => ClockMode::RealTime,
            ClockPlan::Historical { .. } => ClockMode::Historical,
        }
    }

    /// `ceil((end - start) / step)` for historical plans.
    ///
    /// The cursor visits `end` itself when it lands on it, so the number of
    /// cycles can be one more than this.
    pub fn total_steps(&self) -> Option<u64> {
        match self {
            ClockPlan::RealTime { .. } => None,
            ClockPlan::Historical { start, end, step } => {
                let span = (*end - *start).to_std().unwrap_or_default();
                let step = step.to_std().unwrap_or_default();
                Some(steps_to_cover(span, step))
            }
        }
    }

    pub fn initial_time(&self) -> Option<NaiveDateTime> {
        match self {
            ClockPlan::RealTime { .. } => None,
            ClockPlan::Historical { start, .. } => Some(*start),
        }
    }
}
