//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Configuration model and loading for the simulator daemon."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;
use crate::time::parse_sim_datetime;

fn default_interval() -> Duration {
    Duration::from_millis(5_000)
}

fn default_step() -> Duration {
    Duration::from_millis(3_600_000)
}

fn default_peak_factor() -> f64 {
    1.5
}

fn default_weekend_factor() -> f64 {
    0.6
}

fn default_consumption_variance() -> f64 {
    0.2
}

fn default_error_probability() -> f64 {
    0.01
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_delay() -> Duration {
    Duration::from_millis(1_000)
}

fn default_true() -> bool {
    true
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_peak_windows() -> Vec<PeakWindowConfig> {
    vec![
        PeakWindowConfig {
            name: "morning".to_owned(),
            start_hour: 8,
            end_hour: 12,
        },
        PeakWindowConfig {
            name: "afternoon".to_owned(),
            start_hour: 14,
            end_hour: 18,
        },
    ]
}

fn default_sink_path() -> PathBuf {
    PathBuf::from("target/readings/readings.jsonl")
}

/// Primary configuration object for the simulator daemon.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub points: IndexMap<String, PointConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "WATTSIM_CONFIG";

    /// Load configuration from the first existing candidate, or from the
    /// `WATTSIM_CONFIG` override when set, together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Retrieve a point configuration by identifier.
    pub fn point(&self, point_id: &str) -> Option<&PointConfig> {
        self.points.get(point_id)
    }

    /// Validate structural invariants that do not depend on the engine.
    pub fn validate(&self) -> Result<()> {
        if self.points.is_empty() {
            return Err(anyhow!("configuration must declare at least one point"));
        }
        for (point_id, point) in &self.points {
            point.validate(point_id)?;
        }
        self.simulation.validate_dates()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Raw simulation tunables as written in the configuration file.
///
/// Dates stay as `YYYY-MM-DD HH:mm:ss` strings here; the engine parses them
/// into timestamps when a run is planned.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_interval", rename = "interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_step", rename = "step_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub step: Duration,
    #[serde(default = "default_true")]
    pub simulate_peaks: bool,
    #[serde(default = "default_peak_windows")]
    pub peak_windows: Vec<PeakWindowConfig>,
    #[serde(default = "default_peak_factor")]
    pub peak_factor: f64,
    #[serde(default = "default_weekend_factor")]
    pub weekend_factor: f64,
    #[serde(default = "default_consumption_variance")]
    pub consumption_variance: f64,
    #[serde(default = "default_error_probability")]
    pub error_probability: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay", rename = "batch_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub batch_delay: Duration,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl SimulationSettings {
    /// True when a start date is configured, i.e. a historical run is requested.
    pub fn is_historical(&self) -> bool {
        self.start_date
            .as_deref()
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }

    fn validate_dates(&self) -> Result<()> {
        for (field, value) in [("start_date", &self.start_date), ("end_date", &self.end_date)] {
            if let Some(raw) = value.as_deref().filter(|raw| !raw.trim().is_empty()) {
                parse_sim_datetime(raw).with_context(|| format!("simulation.{field}"))?;
            }
        }
        Ok(())
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            start_date: None,
            end_date: None,
            step: default_step(),
            simulate_peaks: true,
            peak_windows: default_peak_windows(),
            peak_factor: default_peak_factor(),
            weekend_factor: default_weekend_factor(),
            consumption_variance: default_consumption_variance(),
            error_probability: default_error_probability(),
            batch_size: default_batch_size(),
            batch_delay: default_batch_delay(),
            random_seed: None,
        }
    }
}

/// Named `[start_hour, end_hour)` window in local time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeakWindowConfig {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Monitoring point as declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointConfig {
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub ubicacion: String,
    #[serde(default = "default_true")]
    pub activo: bool,
    pub consumo_base_kwh: f64,
    pub potencia_base_w: f64,
}

impl PointConfig {
    pub fn validate(&self, point_id: &str) -> Result<()> {
        check_point(point_id, self.consumo_base_kwh, self.potencia_base_w)
            .map_err(|reason| anyhow!("point '{}': {}", point_id, reason))
    }
}

/// Shared point invariants: a non-blank id and positive, finite baselines.
pub fn check_point(
    id: &str,
    consumo_base_kwh: f64,
    potencia_base_w: f64,
) -> std::result::Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err("identifier must not be empty");
    }
    if !(consumo_base_kwh.is_finite() && consumo_base_kwh > 0.0) {
        return Err("consumo_base_kwh must be positive");
    }
    if !(potencia_base_w.is_finite() && potencia_base_w > 0.0) {
        return Err("potencia_base_w must be positive");
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Destination for generated readings.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SinkKind {
    #[default]
    JsonLines,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
    #[serde(default = "default_sink_path")]
    pub path: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            path: default_sink_path(),
        }
    }
}
