//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Cycle timing aggregates and summaries."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Running duration statistics in milliseconds.
///
/// Only the aggregates are kept (Welford's online mean/variance plus
/// extremes), so recording is O(1) in time and memory however long a
/// real-time run lasts.
#[derive(Debug, Default)]
pub struct DurationStats {
    inner: Mutex<Aggregate>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Aggregate {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Aggregate {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }
}

impl DurationStats {
    pub fn record(&self, duration: Duration) {
        self.inner.lock().push(duration.as_secs_f64() * 1_000.0);
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Sample standard deviation; zero for a single sample.
    pub fn summary(&self) -> Option<DurationSummary> {
        let agg = *self.inner.lock();
        if agg.count == 0 {
            return None;
        }
        let variance = if agg.count > 1 {
            agg.m2 / (agg.count - 1) as f64
        } else {
            0.0
        };
        Some(DurationSummary {
            mean_ms: agg.mean,
            std_dev_ms: variance.sqrt(),
            max_ms: agg.max,
            min_ms: agg.min,
            samples: agg.count,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationSummary {
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub max_ms: f64,
    pub min_ms: f64,
    pub samples: u64,
}

/// Measures how long each simulation cycle takes.
#[derive(Debug, Default)]
pub struct CycleTimer {
    stats: DurationStats,
}

impl CycleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing one cycle; the elapsed time is recorded when the guard drops.
    pub fn begin(&self) -> CycleGuard<'_> {
        CycleGuard {
            timer: self,
            started: Instant::now(),
        }
    }

    pub fn stats(&self) -> &DurationStats {
        &self.stats
    }
}

pub struct CycleGuard<'a> {
    timer: &'a CycleTimer,
    started: Instant,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.timer.stats.record(self.started.elapsed());
    }
}
