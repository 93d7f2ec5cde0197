//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the WattSim daemon."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wattsim_common::config::{AppConfig, SinkConfig, SinkKind};
use wattsim_common::logging::{init_tracing, LogFormat};
use wattsim_engine::{
    JsonLinesSink, LocalClock, PointRegistry, ReadingSink, RunState, SimulationClock,
    SimulationConfig, SimulationEvent, TimeSource, TracingSink,
};

const SERVICE_NAME: &str = "wattsimd";

#[derive(Debug, Parser)]
#[command(author, version, about = "WattSim telemetry simulator daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Seed the random source for reproducible readings")]
    seed: Option<u64>,

    #[arg(
        long,
        value_name = "YYYY-MM-DD HH:MM:SS",
        help = "Replay history starting at this local time"
    )]
    start: Option<String>,

    #[arg(
        long,
        value_name = "YYYY-MM-DD HH:MM:SS",
        requires = "start",
        help = "End of the historical range (defaults to now)"
    )]
    end: Option<String>,

    #[arg(long, value_enum, help = "Override the stdout log format")]
    log_format: Option<CliLogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Json,
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => LogFormat::StructuredJson,
            CliLogFormat::Pretty => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Commands {
    #[command(about = "Run the simulation until it completes or ctrl-c is received")]
    Run,
    #[command(about = "Validate the configuration and print the resolved clock plan")]
    Validate,
    #[command(about = "List configured monitoring points")]
    Points,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/wattsim.toml"));
    candidates.push(PathBuf::from("configs/wattsim.example.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    apply_overrides(&cli, &mut config)?;
    init_tracing(SERVICE_NAME, &config.logging)?;
    info!(
        config_path = %loaded.source.display(),
        points = config.points.len(),
        historical = config.simulation.is_historical(),
        "configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_simulation(config).await?,
        Commands::Validate => {
            let simulation = SimulationConfig::from_settings(&config.simulation)?;
            let plan = simulation.plan(LocalClock.now())?;
            println!(
                "Configuration: {}\nMode: {}\nPoints: {}\nSteps: {}",
                loaded.source.display(),
                plan.mode().as_str(),
                config.points.len(),
                plan.total_steps()
                    .map(|steps| steps.to_string())
                    .unwrap_or_else(|| "unbounded".to_owned())
            );
        }
        Commands::Points => {
            let registry = PointRegistry::from_config(&config.points)?;
            println!("{}", serde_json::to_string_pretty(&registry.views())?);
        }
    }

    Ok(())
}

/// Fold command-line overrides into the loaded configuration.
fn apply_overrides(cli: &Cli, config: &mut AppConfig) -> Result<()> {
    if let Some(seed) = cli.seed {
        config.simulation.random_seed = Some(seed);
    }
    if let Some(start) = &cli.start {
        config.simulation.start_date = Some(start.clone());
        config.simulation.end_date = cli.end.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    config.validate().context("invalid configuration after overrides")
}

async fn open_sink(config: &SinkConfig) -> Result<Arc<dyn ReadingSink>> {
    let sink: Arc<dyn ReadingSink> = match config.kind {
        SinkKind::JsonLines => Arc::new(
            JsonLinesSink::open(&config.path)
                .await
                .with_context(|| format!("unable to open reading log {}", config.path.display()))?,
        ),
        SinkKind::Log => Arc::new(TracingSink),
    };
    Ok(sink)
}

async fn run_simulation(config: AppConfig) -> Result<()> {
    let simulation = SimulationConfig::from_settings(&config.simulation)?;
    let registry = PointRegistry::from_config(&config.points)?;
    let sink = open_sink(&config.sink).await?;

    let mut clock = SimulationClock::new(sink);
    if let Some(seed) = config.simulation.random_seed {
        info!(seed, "using seeded random source");
        clock = clock.with_seed(seed);
    }
    let logger = spawn_event_logger(clock.subscribe());

    let run_id = clock.start(registry.snapshot(), simulation).await?;
    info!(%run_id, "simulation running; waiting for completion or termination signal");

    let final_state = tokio::select! {
        state = clock.wait_until_idle() => state,
        result = signal::ctrl_c() => {
            result?;
            info!("ctrl-c received; stopping simulation");
            clock.stop().await;
            clock.snapshot()
        }
    };

    drop(clock);
    if let Err(err) = logger.await {
        warn!(error = %err, "event logger task failed");
    }
    render_summary(&final_state)?;
    Ok(())
}

fn spawn_event_logger(mut events: broadcast::Receiver<SimulationEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SimulationEvent::StatusChanged { run_id, status, mode }) => {
                    info!(%run_id, status = ?status, mode = mode.as_str(), "simulation status changed");
                }
                Ok(SimulationEvent::CycleCompleted { run_id, step, sim_time, readings, stats }) => {
                    debug!(%run_id, step, %sim_time, readings = readings.len(), total_sent = stats.total_sent, "cycle completed");
                }
                Ok(SimulationEvent::PointFailed { run_id, point_id, sim_time, error }) => {
                    warn!(%run_id, %point_id, %sim_time, %error, "reading not persisted");
                }
                Ok(SimulationEvent::Progress { run_id, progress }) => {
                    debug!(
                        %run_id,
                        step = progress.step_index,
                        total_steps = progress.total_steps,
                        percent = progress.percent_complete,
                        sim_time = %progress.current_sim_time,
                        "historical progress"
                    );
                }
                Ok(SimulationEvent::Completed { run_id, stats }) => {
                    info!(%run_id, total_sent = stats.total_sent, failed = stats.failed, "simulation completed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged behind simulation");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn render_summary(state: &RunState) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use wattsim_common::config::PointConfig;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.points.insert(
            "meter-01".into(),
            PointConfig {
                nombre: "Oficina".into(),
                descripcion: String::new(),
                ubicacion: String::new(),
                activo: true,
                consumo_base_kwh: 1.2,
                potencia_base_w: 1200.0,
            },
        );
        config
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn end_requires_start() {
        assert!(Cli::try_parse_from(["wattsimd", "--end", "2025-01-02 00:00:00"]).is_err());
        let cli = Cli::try_parse_from([
            "wattsimd",
            "--start",
            "2025-01-01 00:00:00",
            "--end",
            "2025-01-02 00:00:00",
            "validate",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Validate)));
    }

    #[test]
    fn overrides_are_applied_and_validated() {
        let cli = Cli::try_parse_from([
            "wattsimd",
            "--seed",
            "42",
            "--start",
            "2025-01-01 00:00:00",
            "--log-format",
            "pretty",
        ])
        .unwrap();
        let mut config = config();
        apply_overrides(&cli, &mut config).unwrap();
        assert_eq!(config.simulation.random_seed, Some(42));
        assert_eq!(config.simulation.start_date.as_deref(), Some("2025-01-01 00:00:00"));
        assert!(config.simulation.end_date.is_none());
        assert_eq!(config.logging.format, LogFormat::Pretty);

        let bad = Cli::try_parse_from(["wattsimd", "--start", "yesterday"]).unwrap();
        assert!(apply_overrides(&bad, &mut config).is_err());
    }

    #[tokio::test]
    async fn log_sink_needs_no_file() {
        let sink = open_sink(&SinkConfig {
            kind: SinkKind::Log,
            path: PathBuf::from("/nonexistent/readings.jsonl"),
        })
        .await
        .unwrap();
        sink.flush().await.unwrap();
    }
}
