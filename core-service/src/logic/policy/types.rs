//! Policy Types
//!
//! Severity ladder and the decision produced by each state-machine step.
//! Data only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::degradation::DegradationLevel;
use crate::logic::identity::IdentityKey;

// ============================================================================
// SEVERITY LEVELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Initial and resting state
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::None,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// One level toward None
    pub fn step_down(self) -> Self {
        match self {
            Severity::None | Severity::Low => Severity::None,
            Severity::Medium => Severity::Low,
            Severity::High => Severity::Medium,
            Severity::Critical => Severity::High,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// DECISION TYPES
// ============================================================================

/// What happens downstream of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Recorded in the audit trail only
    NoAlert,
    /// Handed to the alert emitter
    Alert,
    /// Handed to the emitter, marked as produced under reduced capability
    DegradedAlert,
    /// Same-severity repeat inside the cooldown; counted, not emitted
    Suppressed,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NoAlert => "no_alert",
            Action::Alert => "alert",
            Action::DegradedAlert => "degraded_alert",
            Action::Suppressed => "suppressed",
        }
    }

    pub fn emits(&self) -> bool {
        matches!(self, Action::Alert | Action::DegradedAlert)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Unchanged,
    Escalated,
    DeEscalated,
}

/// Result of one state-machine step for one identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub identity: IdentityKey,
    pub timestamp: DateTime<Utc>,
    pub previous: Severity,
    pub severity: Severity,
    pub transition: Transition,
    pub action: Action,
    /// Composite score of the triggering event; None for idle decay
    pub score: Option<f32>,
    /// Escalation backed by a static floor or the k-of-n rule
    pub confirmed: bool,
    pub level: DegradationLevel,
    pub reasons: Vec<String>,
}

impl Decision {
    pub fn emits(&self) -> bool {
        self.action.emits()
    }
}
