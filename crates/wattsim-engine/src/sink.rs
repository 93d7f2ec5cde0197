//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Persistence collaborators receiving generated readings."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::error::SinkError;
use crate::reading::Reading;

/// Destination for readings. The clock awaits each call before moving to the
/// next point; an error only affects that point in that cycle.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn persist(&self, reading: &Reading) -> Result<(), SinkError>;

    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps readings in memory; points can be marked as failing.
#[derive(Debug, Default)]
pub struct MemorySink {
    readings: Mutex<Vec<Reading>>,
    failing: Mutex<HashSet<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent reading for `point_id`.
    pub fn fail_point(&self, point_id: &str) {
        self.failing.lock().insert(point_id.to_owned());
    }

    pub fn recover_point(&self, point_id: &str) {
        self.failing.lock().remove(point_id);
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.readings.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.readings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.lock().is_empty()
    }
}

#[async_trait]
impl ReadingSink for MemorySink {
    async fn persist(&self, reading: &Reading) -> Result<(), SinkError> {
        if self.failing.lock().contains(&reading.point_id) {
            return Err(SinkError::Rejected(format!(
                "point {} is marked as failing",
                reading.point_id
            )));
        }
        self.readings.lock().push(reading.clone());
        Ok(())
    }
}

/// Appends one JSON document per reading to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: tokio::sync::Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub async fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        info!(path = %path.display(), "reading log opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: tokio::sync::Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReadingSink for JsonLinesSink {
    async fn persist(&self, reading: &Reading) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(reading)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        writer.get_mut().sync_data().await?;
        Ok(())
    }
}

/// Emits every reading as a structured `debug` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl ReadingSink for TracingSink {
    async fn persist(&self, reading: &Reading) -> Result<(), SinkError> {
        debug!(
            point_id = %reading.point_id,
            status = reading.status.as_str(),
            consumption_kwh = reading.consumption_kwh,
            timestamp = %reading.timestamp,
            "reading generated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reading(point_id: &str) -> Reading {
        let at = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Reading::active(point_id, 1.5, at)
    }

    #[tokio::test]
    async fn memory_sink_rejects_failing_points() {
        let sink = MemorySink::new();
        sink.persist(&reading("a")).await.unwrap();
        sink.fail_point("b");
        assert!(matches!(
            sink.persist(&reading("b")).await,
            Err(SinkError::Rejected(_))
        ));
        sink.recover_point("b");
        sink.persist(&reading("b")).await.unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("readings.jsonl");
        {
            let sink = JsonLinesSink::open(&path).await.unwrap();
            sink.persist(&reading("a")).await.unwrap();
            sink.flush().await.unwrap();
        }
        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.persist(&reading("b")).await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(sink.path(), path.as_path());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<Reading> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].point_id, "a");
        assert_eq!(parsed[1].point_id, "b");
    }

    #[tokio::test]
    async fn tracing_sink_accepts_everything() {
        TracingSink.persist(&reading("a")).await.unwrap();
        TracingSink.flush().await.unwrap();
    }
}
