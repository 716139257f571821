//! Signal Types
//!
//! Common record for every analyzer verdict (face, attire/PPE, badge, schedule).
//! KHÔNG chứa logic chuẩn hoá - chỉ data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SIGNAL KIND
// ============================================================================

/// Which analyzer produced the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Identity,
    Attire,
    Badge,
    Schedule,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Identity,
        SignalKind::Attire,
        SignalKind::Badge,
        SignalKind::Schedule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Identity => "identity",
            SignalKind::Attire => "attire",
            SignalKind::Badge => "badge",
            SignalKind::Schedule => "schedule",
        }
    }

    /// Map an analyzer name (as reported by the perception pipeline) to a kind
    pub fn from_analyzer(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "identity" | "face" => Some(SignalKind::Identity),
            "attire" | "attributes" | "ppe" => Some(SignalKind::Attire),
            "badge" => Some(SignalKind::Badge),
            "schedule" => Some(SignalKind::Schedule),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// VERDICT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Unknown,
}

impl Verdict {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" | "ok" | "compliant" | "valid" => Some(Verdict::Pass),
            "fail" | "violation" | "non_compliant" | "invalid" => Some(Verdict::Fail),
            "unknown" | "indeterminate" => Some(Verdict::Unknown),
            _ => None,
        }
    }
}

// ============================================================================
// DETAIL PAYLOADS
// ============================================================================

/// Kind-specific payload carried alongside the verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetail {
    Identity {
        employee_id: Option<String>,
    },
    Attire {
        missing_items: Vec<String>,
    },
    Badge {
        holder_id: Option<String>,
        badge_id: Option<String>,
    },
    Schedule {
        expected_status: Option<String>,
        minutes_off: Option<i64>,
    },
}

impl SignalDetail {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalDetail::Identity { .. } => SignalKind::Identity,
            SignalDetail::Attire { .. } => SignalKind::Attire,
            SignalDetail::Badge { .. } => SignalKind::Badge,
            SignalDetail::Schedule { .. } => SignalKind::Schedule,
        }
    }
}

// ============================================================================
// SIGNAL RESULT
// ============================================================================

/// One analyzer's verdict for one frame/identity pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub kind: SignalKind,
    /// Confidence in [0, 1] (clamped during normalization)
    pub confidence: f32,
    pub verdict: Verdict,
    pub detail: SignalDetail,
    pub timestamp: DateTime<Utc>,
    pub camera_id: String,
    /// Time the analyzer needed after frame capture, if reported
    pub latency_ms: Option<u64>,
    /// Raw confidence was outside [0, 1] and had to be clamped
    pub confidence_clamped: bool,
}

impl SignalResult {
    /// Verdict after the confidence invariant: no confidence means no evidence
    pub fn effective_verdict(&self) -> Verdict {
        if self.confidence > 0.0 {
            self.verdict
        } else {
            Verdict::Unknown
        }
    }

    /// Downgrade to Unknown when below the per-kind acceptance threshold
    pub fn gated(mut self, threshold: f32) -> Self {
        if self.confidence < threshold {
            self.verdict = Verdict::Unknown;
        }
        self
    }

    /// Treat the signal as not received (degradation, deadline)
    pub fn into_unknown(mut self) -> Self {
        self.verdict = Verdict::Unknown;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.effective_verdict() == Verdict::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.effective_verdict() == Verdict::Fail
    }

    /// Matched employee for Identity signals
    pub fn employee_id(&self) -> Option<&str> {
        match &self.detail {
            SignalDetail::Identity { employee_id } => employee_id.as_deref(),
            _ => None,
        }
    }

    /// Holder named on the badge for Badge signals
    pub fn badge_holder(&self) -> Option<&str> {
        match &self.detail {
            SignalDetail::Badge { holder_id, .. } => holder_id.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// INBOUND PAYLOADS
// ============================================================================

/// Raw analyzer output as received from the perception pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnalyzerOutput {
    pub analyzer: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub verdict: Option<String>,
    #[serde(default)]
    pub detail: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

/// SubmitAnalyzerResults payload: every analyzer result for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSubmission {
    pub camera_id: String,
    #[serde(default)]
    pub area_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub results: Vec<RawAnalyzerOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge(confidence: f32, verdict: Verdict) -> SignalResult {
        SignalResult {
            kind: SignalKind::Badge,
            confidence,
            verdict,
            detail: SignalDetail::Badge { holder_id: None, badge_id: None },
            timestamp: Utc::now(),
            camera_id: "cam-1".to_string(),
            latency_ms: None,
            confidence_clamped: false,
        }
    }

    #[test]
    fn test_zero_confidence_is_unknown() {
        assert_eq!(badge(0.0, Verdict::Fail).effective_verdict(), Verdict::Unknown);
        assert_eq!(badge(0.4, Verdict::Fail).effective_verdict(), Verdict::Fail);
    }

    #[test]
    fn test_gated_below_threshold() {
        let s = badge(0.3, Verdict::Pass).gated(0.5);
        assert_eq!(s.effective_verdict(), Verdict::Unknown);

        let s = badge(0.7, Verdict::Pass).gated(0.5);
        assert!(s.is_pass());
    }

    #[test]
    fn test_analyzer_aliases() {
        assert_eq!(SignalKind::from_analyzer("Face"), Some(SignalKind::Identity));
        assert_eq!(SignalKind::from_analyzer("ppe"), Some(SignalKind::Attire));
        assert_eq!(SignalKind::from_analyzer("gait"), None);
    }
}
