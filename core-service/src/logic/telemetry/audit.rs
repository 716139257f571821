//! Decision Audit Trail
//!
//! Every decision (alert, suppression, de-escalation, no-alert) lands in a
//! bounded in-memory ring and, when a directory is configured, in a JSONL file.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::recorder::Recorder;
use crate::logic::anomaly::{AnomalyScore, ScoreBreakdown, StaticFlag};
use crate::logic::events::AnalysisEvent;
use crate::logic::policy::Decision;

const AUDIT_PREFIX: &str = "decisions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub recorded_at: DateTime<Utc>,
    pub decision: Decision,
    pub breakdown: Option<ScoreBreakdown>,
    pub flags: Vec<StaticFlag>,
    pub camera_id: Option<String>,
    pub area_id: Option<String>,
}

impl AuditEntry {
    pub fn for_event(decision: Decision, score: &AnomalyScore, event: &AnalysisEvent) -> Self {
        Self {
            recorded_at: Utc::now(),
            decision,
            breakdown: Some(score.breakdown.clone()),
            flags: score.flags.iter().map(|f| f.flag).collect(),
            camera_id: Some(event.camera_id.clone()),
            area_id: Some(event.area_id.clone()),
        }
    }

    /// Decisions with no triggering event (idle decay)
    pub fn standalone(decision: Decision) -> Self {
        Self {
            recorded_at: Utc::now(),
            decision,
            breakdown: None,
            flags: Vec::new(),
            camera_id: None,
            area_id: None,
        }
    }
}

pub struct AuditLog {
    memory: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    file: Option<Mutex<Recorder>>,
}

impl AuditLog {
    /// In-memory only
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            memory: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity: capacity.max(1),
            file: None,
        }
    }

    /// In-memory ring plus a JSONL file under `dir`
    pub fn with_dir(capacity: usize, dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let recorder = Recorder::new(dir, AUDIT_PREFIX)?;
        let mut log = Self::in_memory(capacity);
        log.file = Some(Mutex::new(recorder));
        Ok(log)
    }

    pub fn record(&self, entry: AuditEntry) {
        if let Some(file) = &self.file {
            if let Err(e) = file.lock().record(&entry) {
                log::error!("Failed to write audit entry: {}", e);
            }
        }

        let mut memory = self.memory.lock();
        while memory.len() >= self.capacity {
            memory.pop_front();
        }
        memory.push_back(entry);
    }

    /// Up to `limit` most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.memory.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.memory.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current_file(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|f| f.lock().current_file().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::degradation::DegradationLevel;
    use crate::logic::identity::IdentityKey;
    use crate::logic::policy::{Action, Severity, Transition};
    use crate::logic::telemetry::recorder::read_records;
    use tempfile::TempDir;

    fn decision(n: u32) -> Decision {
        Decision {
            identity: IdentityKey::employee(format!("E{}", n)),
            timestamp: Utc::now(),
            previous: Severity::None,
            severity: Severity::Low,
            transition: Transition::Escalated,
            action: Action::NoAlert,
            score: Some(0.4),
            confirmed: false,
            level: DegradationLevel::Normal,
            reasons: vec![],
        }
    }

    #[test]
    fn test_ring_is_bounded_newest_first() {
        let audit = AuditLog::in_memory(3);
        for n in 0..5 {
            audit.record(AuditEntry::standalone(decision(n)));
        }
        assert_eq!(audit.len(), 3);
        let recent = audit.recent(10);
        assert_eq!(recent[0].decision.identity, IdentityKey::employee("E4"));
        assert_eq!(recent[2].decision.identity, IdentityKey::employee("E2"));
    }

    #[test]
    fn test_file_audit() {
        let temp_dir = TempDir::new().unwrap();
        let audit = AuditLog::with_dir(10, temp_dir.path()).unwrap();
        audit.record(AuditEntry::standalone(decision(1)));
        audit.record(AuditEntry::standalone(decision(2)));

        let path = audit.current_file().unwrap();
        let entries: Vec<AuditEntry> = read_records(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].decision.severity, Severity::Low);
    }
}
