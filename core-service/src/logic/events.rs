//! Analysis Events
//!
//! One fused observation: a resolved identity plus the normalized signals
//! of a single frame. This is the unit the workers score and transition.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::identity::IdentityKey;
use crate::logic::signal::{NormalizedFrame, SignalKind, SignalResult};

/// Area assigned when neither the submission nor the camera map names one
pub const UNKNOWN_AREA: &str = "unknown";

/// Event-time estimate for wall-clock housekeeping: the newest event
/// timestamp advanced by the wall time elapsed since it was processed.
/// Lagging or replayed streams age at the rate they are fed.
pub fn event_clock(last_event: DateTime<Utc>, processed_at: DateTime<Utc>, wall_now: DateTime<Utc>) -> DateTime<Utc> {
    last_event + (wall_now - processed_at).max(Duration::zero())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub identity: IdentityKey,
    /// Ordered by kind, at most one per kind
    pub signals: Vec<SignalResult>,
    pub camera_id: String,
    pub area_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisEvent {
    pub fn from_frame(identity: IdentityKey, frame: NormalizedFrame, area_id: String) -> Self {
        Self {
            identity,
            signals: frame.signals,
            camera_id: frame.camera_id,
            area_id,
            timestamp: frame.timestamp,
        }
    }

    pub fn signal(&self, kind: SignalKind) -> Option<&SignalResult> {
        self.signals.iter().find(|s| s.kind == kind)
    }

    /// (timestamp millis, camera) pair used to detect replays
    pub fn dedup_key(&self) -> (i64, &str) {
        (self.timestamp.timestamp_millis(), self.camera_id.as_str())
    }
}
