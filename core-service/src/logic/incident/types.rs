use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::events::event_clock;
use crate::logic::identity::IdentityKey;
use crate::logic::policy::Severity;

/// Per-identity severity state plus the hysteresis buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertState {
    pub identity: IdentityKey,
    pub severity: Severity,
    /// Episode id, assigned when leaving None and cleared on return to None
    pub incident_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// When the current severity was entered
    pub changed_at: DateTime<Utc>,
    /// Cooldown reference: last level change or qualifying anomaly
    pub quiet_since: DateTime<Utc>,
    pub last_emitted: Option<DateTime<Utc>>,
    pub last_emitted_severity: Severity,
    /// Most recent composite scores, newest last
    pub recent_scores: VecDeque<f32>,
    pub events: u64,
    pub suppressed: u64,
    /// Wall-clock time the last event was applied
    #[serde(default = "Utc::now")]
    pub last_processed: DateTime<Utc>,
}

impl AlertState {
    pub fn new(identity: IdentityKey, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            severity: Severity::None,
            incident_id: None,
            started_at: now,
            last_seen: now,
            changed_at: now,
            quiet_since: now,
            last_emitted: None,
            last_emitted_severity: Severity::None,
            recent_scores: VecDeque::new(),
            events: 0,
            suppressed: 0,
            last_processed: Utc::now(),
        }
    }

    pub fn push_score(&mut self, score: f32, history_len: usize) {
        while self.recent_scores.len() >= history_len.max(1) {
            self.recent_scores.pop_front();
        }
        self.recent_scores.push_back(score);
    }

    /// How many buffered scores reach `threshold`
    pub fn count_at_least(&self, threshold: f32) -> usize {
        self.recent_scores.iter().filter(|s| **s >= threshold).count()
    }

    /// Event time this state has reached at `wall_now`, used for idle decay
    pub fn clock(&self, wall_now: DateTime<Utc>) -> DateTime<Utc> {
        event_clock(self.last_seen, self.last_processed, wall_now)
    }

    /// Resting with nothing left to remember
    pub fn is_idle(&self) -> bool {
        self.severity == Severity::None
    }
}
