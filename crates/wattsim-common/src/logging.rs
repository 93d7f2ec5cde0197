//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Tracing subscriber setup for stdout and rolling log files."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "WATTSIM_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Held for the process lifetime so buffered lines are flushed on exit.
struct WriterGuards {
    _stdout: WorkerGuard,
    _file: WorkerGuard,
}

static GUARDS: OnceCell<WriterGuards> = OnceCell::new();

/// Stdout rendering for the daemon. The history file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Install the global subscriber: a stdout layer in `config.format` plus a
/// daily-rolling JSON file under `config.directory` named after
/// `config.file_prefix` (or `service_name`).
///
/// The filter comes from `WATTSIM_LOG`, then `RUST_LOG`, then `info`. Readings
/// are logged at `debug`. A second call keeps the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("unable to create log directory {}", config.directory.display()))?;
    let file_name = format!("{}.log", config.file_prefix.as_deref().unwrap_or(service_name));

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, file_name));

    let directive = select_directive(env_directive(LOG_ENV), env_directive(EnvFilter::DEFAULT_ENV));
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(&directive))
        .with(stdout_layer(config.format, stdout_writer))
        .with(history_layer(file_writer))
        .try_init()
        .is_ok();
    if installed {
        let _ = GUARDS.set(WriterGuards {
            _stdout: stdout_guard,
            _file: file_guard,
        });
    }

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        %directive,
        "tracing initialised"
    );
    Ok(())
}

fn env_directive(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// An invalid `WATTSIM_LOG` falls back to the default rather than to `RUST_LOG`.
fn select_directive(custom: Option<String>, standard: Option<String>) -> String {
    match custom {
        Some(directive) => match EnvFilter::try_new(&directive) {
            Ok(_) => directive,
            Err(err) => {
                eprintln!("invalid {LOG_ENV} directive ({err}); using {DEFAULT_DIRECTIVE}");
                DEFAULT_DIRECTIVE.to_owned()
            }
        },
        None => standard
            .filter(|directive| EnvFilter::try_new(directive).is_ok())
            .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_owned()),
    }
}

fn stdout_layer<S>(format: LogFormat, writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = fmt::layer().with_timer(UtcTime::rfc_3339()).with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.with_target(true).boxed(),
    }
}

fn history_layer<S>(writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .json()
        .with_writer(writer)
        .boxed()
}
