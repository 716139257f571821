//! Alert Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::anomaly::{AnomalyScore, FlagHit, ScoreBreakdown};
use crate::logic::degradation::DegradationLevel;
use crate::logic::events::AnalysisEvent;
use crate::logic::identity::IdentityKey;
use crate::logic::policy::{Action, Decision, Severity};

/// Outbound alert: one per emitting severity transition (or cooldown reminder)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_id: Uuid,
    pub incident_id: Option<Uuid>,
    pub identity: IdentityKey,
    pub severity: Severity,
    pub previous: Severity,
    pub title: String,
    pub message: String,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    pub flags: Vec<FlagHit>,
    pub triggering_event: AnalysisEvent,
    /// Produced while the engine ran with reduced capability
    pub degraded: bool,
    pub level: DegradationLevel,
    pub reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(decision: &Decision, score: &AnomalyScore, event: &AnalysisEvent, incident_id: Option<Uuid>) -> Self {
        let title = format!("[{}] {} in {}", decision.severity.as_str().to_uppercase(), event.identity, event.area_id);
        let message = if decision.previous < decision.severity {
            format!(
                "Severity {} -> {} (score {:.2}) on camera {}",
                decision.previous, decision.severity, score.score, event.camera_id
            )
        } else {
            format!(
                "Still {} (score {:.2}) on camera {}",
                decision.severity, score.score, event.camera_id
            )
        };

        let mut reasons = decision.reasons.clone();
        reasons.extend(score.reasons.iter().cloned());

        Self {
            alert_id: Uuid::new_v4(),
            incident_id,
            identity: decision.identity.clone(),
            severity: decision.severity,
            previous: decision.previous,
            title,
            message,
            score: score.score,
            breakdown: score.breakdown.clone(),
            flags: score.flags.clone(),
            triggering_event: event.clone(),
            degraded: decision.action == Action::DegradedAlert,
            level: decision.level,
            reasons,
            timestamp: event.timestamp,
            created_at: Utc::now(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
