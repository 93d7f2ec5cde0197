//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting the simulation clock."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Simple async rate limiter that ensures deterministic loop intervals.
///
/// The first tick completes immediately, later ticks every `period`.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

/// Owning side of a cooperative stop request.
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    pub fn new() -> (Self, StopToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, StopToken { rx })
    }

    /// Request a stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observer side of a [`StopSignal`]. A dropped signal counts as a stop.
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once a stop has been requested.
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Result of offering a completed step to the [`BatchPacer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceOutcome {
    /// Still inside the current batch.
    Continue,
    /// A batch boundary was reached and the pacing delay elapsed.
    Paused,
    /// A stop was requested while waiting at a batch boundary.
    Stopped,
}

/// Inserts a delay after every `batch_size` steps to bound downstream throughput.
#[derive(Debug)]
pub struct BatchPacer {
    batch_size: usize,
    delay: Duration,
    in_batch: usize,
    batches: u64,
}

impl BatchPacer {
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
            in_batch: 0,
            batches: 0,
        }
    }

    /// Number of completed batches (pacing pauses taken).
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Record one completed step and pause if it closed a batch.
    ///
    /// The pause races against `stop`, so a stop request during the delay
    /// returns [`PaceOutcome::Stopped`] without waiting out the delay.
    pub async fn after_step(&mut self, stop: &mut StopToken) -> PaceOutcome {
        self.in_batch += 1;
        if self.in_batch < self.batch_size {
            return PaceOutcome::Continue;
        }
        self.in_batch = 0;
        self.batches += 1;
        trace!(batch = self.batches, delay_ms = self.delay.as_millis() as u64, "batch boundary reached");
        if stop.is_stopped() {
            return PaceOutcome::Stopped;
        }
        if self.delay.is_zero() {
            return PaceOutcome::Paused;
        }
        tokio::select! {
            biased;
            _ = stop.stopped() => PaceOutcome::Stopped,
            _ = tokio::time::sleep(self.delay) => PaceOutcome::Paused,
        }
    }
}
