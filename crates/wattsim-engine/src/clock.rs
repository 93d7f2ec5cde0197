//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation clock driving real-time and historical runs."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;
use wattsim_common::metrics::CycleTimer;
use wattsim_logging::{log_system_event, sim_warn, LogContext, SystemEventOutcome};
use wattsim_rt::{BatchPacer, PaceOutcome, RateLimiter, StopSignal, StopToken};

use crate::config::{ClockPlan, SimulationConfig};
use crate::error::SimError;
use crate::events::{ProgressReport, RunState, RunStatus, SimulationEvent};
use crate::generator::generate;
use crate::point::SharedPoint;
use crate::random::{RandomSource, SeededRandom};
use crate::sink::ReadingSink;

const EVENT_CAPACITY: usize = 1024;

/// Wall-clock used for real-time cycles and to close open-ended historical ranges.
pub trait TimeSource: Send + Sync + fmt::Debug {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl TimeSource for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Time source pinned to a fixed instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    now: NaiveDateTime,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

type RandomFactory = Arc<dyn Fn() -> Box<dyn RandomSource> + Send + Sync>;

#[derive(Debug)]
struct ActiveRun {
    run_id: String,
    stop: StopSignal,
    task: JoinHandle<()>,
}

/// Owns at most one simulation run at a time.
///
/// `start` validates and spawns the run task; the task is the only writer of
/// the [`RunState`] snapshot. Events are broadcast in cycle order.
pub struct SimulationClock {
    sink: Arc<dyn ReadingSink>,
    time: Arc<dyn TimeSource>,
    random: RandomFactory,
    events: broadcast::Sender<SimulationEvent>,
    state: Arc<watch::Sender<RunState>>,
    active: tokio::sync::Mutex<Option<ActiveRun>>,
}

impl fmt::Debug for SimulationClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationClock")
            .field("time", &self.time)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SimulationClock {
    pub fn new(sink: Arc<dyn ReadingSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(RunState::default());
        Self {
            sink,
            time: Arc::new(LocalClock),
            random: Arc::new(|| Box::new(SeededRandom::from_entropy()) as Box<dyn RandomSource>),
            events,
            state: Arc::new(state),
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Every run draws from `StdRng` seeded with `seed`.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_random_source(move || Box::new(SeededRandom::from_seed(seed)) as Box<dyn RandomSource>)
    }

    /// Build a fresh random source for each run.
    pub fn with_random_source<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn RandomSource> + Send + Sync + 'static,
    {
        self.random = Arc::new(factory);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Start a run over `points`. Fails without side effects when the
    /// configuration is invalid or a run is already active.
    pub async fn start(
        &self,
        points: Vec<SharedPoint>,
        config: SimulationConfig,
    ) -> Result<String, SimError> {
        let mut active = self.active.lock().await;
        if let Some(run) = active.as_ref() {
            if self.is_running() && !run.task.is_finished() {
                log_system_event(
                    Some(&LogContext::new().with_run(&run.run_id)),
                    "simulation.start_rejected",
                    "start requested while a run is active",
                    SystemEventOutcome::Fault,
                );
                return Err(SimError::AlreadyRunning {
                    run_id: run.run_id.clone(),
                });
            }
        }

        let started_at = self.time.now();
        let plan = config.plan(started_at)?;

        if let Some(previous) = active.take() {
            if let Err(err) = previous.task.await {
                error!(run_id = %previous.run_id, error = %err, "previous run task join error");
            }
        }

        let run_id = Uuid::new_v4().to_string();
        let mode = plan.mode();
        let total_steps = plan.total_steps();
        self.state.send_replace(RunState {
            run_id: Some(run_id.clone()),
            status: RunStatus::Running,
            running: true,
            mode: Some(mode),
            current_sim_time: plan.initial_time(),
            started_at: Some(started_at),
            ..RunState::default()
        });
        let _ = self.events.send(SimulationEvent::StatusChanged {
            run_id: run_id.clone(),
            status: RunStatus::Running,
            mode,
        });
        log_system_event(
            Some(
                &LogContext::new()
                    .with_run(&run_id)
                    .with_mode(mode.as_str()),
            ),
            "simulation.started",
            &format!(
                "run started with {} points{}",
                points.len(),
                total_steps
                    .map(|steps| format!(", {} steps", steps))
                    .unwrap_or_default()
            ),
            SystemEventOutcome::Success,
        );

        let (stop, token) = StopSignal::new();
        let run = RunTask {
            run_id: run_id.clone(),
            plan,
            config,
            points,
            sink: self.sink.clone(),
            time: self.time.clone(),
            random: (self.random)(),
            events: self.events.clone(),
            state: self.state.clone(),
            timer: CycleTimer::new(),
        };
        let task = tokio::spawn(run.run(token));
        *active = Some(ActiveRun {
            run_id: run_id.clone(),
            stop,
            task,
        });
        Ok(run_id)
    }

    /// Request a stop and wait for the run task to exit.
    ///
    /// A cycle already in progress finishes first. Returns `false` when no run
    /// was active. Once this returns, `total_sent` no longer changes.
    pub async fn stop(&self) -> bool {
        let mut active = self.active.lock().await;
        let Some(run) = active.take() else {
            return false;
        };
        let was_running = self.is_running();
        run.stop.trigger();
        if let Err(err) = run.task.await {
            error!(run_id = %run.run_id, error = %err, "run task join error");
            self.state.send_modify(|state| {
                state.running = false;
                state.status = RunStatus::Idle;
            });
        }
        was_running
    }

    /// Wait until no run is active and return the final snapshot.
    pub async fn wait_until_idle(&self) -> RunState {
        let mut rx = self.state.subscribe();
        let result = rx.wait_for(|state| !state.running).await.map(|state| state.clone());
        match result {
            Ok(state) => state,
            Err(_) => self.snapshot(),
        }
    }
}

enum RunOutcome {
    Stopped,
    Completed,
}

struct RunTask {
    run_id: String,
    plan: ClockPlan,
    config: SimulationConfig,
    points: Vec<SharedPoint>,
    sink: Arc<dyn ReadingSink>,
    time: Arc<dyn TimeSource>,
    random: Box<dyn RandomSource>,
    events: broadcast::Sender<SimulationEvent>,
    state: Arc<watch::Sender<RunState>>,
    timer: CycleTimer,
}

impl RunTask {
    async fn run(mut self, mut stop: StopToken) {
        let outcome = match self.plan.clone() {
            ClockPlan::RealTime { interval } => self.run_real_time(interval, &mut stop).await,
            ClockPlan::Historical { start, end, step } => {
                self.run_historical(start, end, step, &mut stop).await
            }
        };
        self.finish(outcome).await;
    }

    async fn run_real_time(&mut self, interval: Duration, stop: &mut StopToken) -> RunOutcome {
        let mut limiter = RateLimiter::new(interval);
        let mut cycle: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => return RunOutcome::Stopped,
                _ = limiter.tick() => {}
            }
            let now = self.time.now();
            self.run_cycle(now, cycle).await;
            cycle += 1;
        }
    }

    async fn run_historical(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        step: chrono::Duration,
        stop: &mut StopToken,
    ) -> RunOutcome {
        let total_steps = self.plan.total_steps().unwrap_or_default();
        let mut pacer = BatchPacer::new(self.config.batch_size, self.config.batch_delay);
        let mut cursor = start;
        let mut step_index: u64 = 0;
        loop {
            if stop.is_stopped() {
                return RunOutcome::Stopped;
            }
            if cursor > end {
                return RunOutcome::Completed;
            }

            self.run_cycle(cursor, step_index).await;
            let progress = ProgressReport::new(step_index, total_steps, cursor);
            self.state.send_modify(|state| state.progress = Some(progress.clone()));
            let _ = self.events.send(SimulationEvent::Progress {
                run_id: self.run_id.clone(),
                progress,
            });

            step_index += 1;
            cursor = match cursor.checked_add_signed(step) {
                Some(next) => next,
                None => return RunOutcome::Completed,
            };
            if cursor > end {
                continue;
            }
            match pacer.after_step(stop).await {
                PaceOutcome::Stopped => return RunOutcome::Stopped,
                PaceOutcome::Paused => {
                    let batches = pacer.batches();
                    debug!(run_id = %self.run_id, batch_index = batches, "batch pacing pause complete");
                    self.state.send_modify(|state| state.batch_index = batches);
                }
                PaceOutcome::Continue => {}
            }
            tokio::task::yield_now().await;
        }
    }

    /// Generate and persist one reading per point at `at`, in point order.
    async fn run_cycle(&mut self, at: NaiveDateTime, step: u64) {
        let _timing = self.timer.begin();
        let mut readings = Vec::with_capacity(self.points.len());
        let mut stats = self.state.borrow().stats;
        for point in &self.points {
            let reading = generate(point, at, &self.config, self.random.as_mut());
            match self.sink.persist(&reading).await {
                Ok(()) => stats.record_sent(reading.status),
                Err(err) => {
                    stats.failed += 1;
                    let ctx = LogContext::new()
                        .with_run(&self.run_id)
                        .with_point(point.id())
                        .with_step(step);
                    sim_warn!(context = ctx, "failed to persist reading: {}", err);
                    let _ = self.events.send(SimulationEvent::PointFailed {
                        run_id: self.run_id.clone(),
                        point_id: point.id().to_owned(),
                        sim_time: at,
                        error: err.to_string(),
                    });
                }
            }
            readings.push(reading);
        }
        stats.cycles += 1;

        self.state.send_modify(|state| {
            state.current_sim_time = Some(at);
            state.stats = stats;
        });
        debug!(run_id = %self.run_id, step, sim_time = %at, readings = readings.len(), total_sent = stats.total_sent, "cycle completed");
        let _ = self.events.send(SimulationEvent::CycleCompleted {
            run_id: self.run_id.clone(),
            step,
            sim_time: at,
            readings,
            stats,
        });
    }

    async fn finish(self, outcome: RunOutcome) {
        if let Err(err) = self.sink.flush().await {
            error!(run_id = %self.run_id, error = %err, "failed to flush reading sink");
        }
        if let Some(summary) = self.timer.stats().summary() {
            debug!(
                run_id = %self.run_id,
                samples = summary.samples,
                mean_ms = summary.mean_ms,
                std_dev_ms = summary.std_dev_ms,
                max_ms = summary.max_ms,
                "cycle timing summary"
            );
        }

        let mode = self.plan.mode();
        let status = match outcome {
            RunOutcome::Completed => RunStatus::Completed,
            RunOutcome::Stopped => RunStatus::Idle,
        };
        self.state.send_modify(|state| {
            state.status = status;
            state.running = false;
        });
        // Listeners reacting to the events below must already see the final state.
        let stats = self.state.borrow().stats;
        if matches!(outcome, RunOutcome::Completed) {
            let _ = self.events.send(SimulationEvent::Completed {
                run_id: self.run_id.clone(),
                stats,
            });
        }
        let _ = self.events.send(SimulationEvent::StatusChanged {
            run_id: self.run_id.clone(),
            status,
            mode,
        });
        log_system_event(
            Some(&LogContext::new().with_run(&self.run_id).with_mode(mode.as_str())),
            match outcome {
                RunOutcome::Completed => "simulation.completed",
                RunOutcome::Stopped => "simulation.stopped",
            },
            &format!(
                "{} readings sent ({} active, {} inactive, {} error), {} failed, {} cycles",
                stats.total_sent, stats.active, stats.inactive, stats.error, stats.failed, stats.cycles
            ),
            SystemEventOutcome::Success,
        );
        info!(run_id = %self.run_id, mode = mode.as_str(), status = ?status, total_sent = stats.total_sent, "simulation run finished");
    }
}
