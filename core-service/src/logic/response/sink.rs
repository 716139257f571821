//! Alert Sinks
//!
//! The external notification/storage collaborator behind the emitter.
//! Delivery is synchronous; retry policy belongs to the emitter.

use std::path::PathBuf;

use parking_lot::Mutex;

use super::types::AlertRecord;
use crate::logic::error::{EngineError, Result};
use crate::logic::telemetry::Recorder;

const ALERT_PREFIX: &str = "alerts";

pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    fn deliver(&self, alert: &AlertRecord) -> Result<()>;
}

// ============================================================================
// JSONL FILE SINK
// ============================================================================

/// Appends alerts to size-rotated JSONL files
pub struct JsonlAlertSink {
    recorder: Mutex<Recorder>,
}

impl JsonlAlertSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            recorder: Mutex::new(Recorder::new(dir, ALERT_PREFIX)?),
        })
    }

    /// Default location under the local data directory
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("presence-guard")
            .join("alerts")
    }

    pub fn current_file(&self) -> PathBuf {
        self.recorder.lock().current_file().to_path_buf()
    }
}

impl AlertSink for JsonlAlertSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn deliver(&self, alert: &AlertRecord) -> Result<()> {
        self.recorder
            .lock()
            .record(alert)
            .map_err(|e| EngineError::EmitFailure(format!("jsonl sink: {}", e)))
    }
}

// ============================================================================
// MEMORY SINK
// ============================================================================

/// Collects alerts in memory. Can be told to fail the next N deliveries.
#[derive(Default)]
pub struct MemorySink {
    alerts: Mutex<Vec<AlertRecord>>,
    failures_left: Mutex<u32>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        *self.failures_left.lock() = n;
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn deliver(&self, alert: &AlertRecord) -> Result<()> {
        {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(EngineError::EmitFailure("memory sink unavailable".to_string()));
            }
        }
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}
