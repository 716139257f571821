//! Analyzer Result Normalizer
//!
//! Pure conversion from raw analyzer payloads to `SignalResult`.
//! Malformed input is rejected with `InvalidSignal`; nothing defaults to Pass.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::types::{
    AnalyzerSubmission, RawAnalyzerOutput, SignalDetail, SignalKind, SignalResult, Verdict,
};
use crate::logic::error::{EngineError, Result};

/// All signals of one frame, normalized and ordered by kind
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    pub camera_id: String,
    pub area_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub signals: Vec<SignalResult>,
}

impl NormalizedFrame {
    pub fn signal(&self, kind: SignalKind) -> Option<&SignalResult> {
        self.signals.iter().find(|s| s.kind == kind)
    }
}

/// Normalize one raw analyzer output captured by `camera_id` at `frame_ts`
pub fn normalize(raw: &RawAnalyzerOutput, camera_id: &str, frame_ts: DateTime<Utc>) -> Result<SignalResult> {
    let kind = SignalKind::from_analyzer(&raw.analyzer)
        .ok_or_else(|| EngineError::invalid_signal(&raw.analyzer, "unknown analyzer kind"))?;

    let verdict = match raw.verdict.as_deref() {
        Some(v) => Verdict::parse(v).ok_or_else(|| {
            EngineError::invalid_signal(&raw.analyzer, format!("unrecognized verdict '{}'", v))
        })?,
        None => return Err(EngineError::invalid_signal(&raw.analyzer, "missing verdict")),
    };

    let (confidence, confidence_clamped) = match raw.confidence {
        None => (0.0, false),
        Some(c) if !c.is_finite() => {
            return Err(EngineError::invalid_signal(&raw.analyzer, "confidence is not a finite number"));
        }
        Some(c) if !(0.0..=1.0).contains(&c) => {
            log::warn!(
                "Analyzer '{}' on {} reported confidence {} outside [0,1], clamping",
                raw.analyzer, camera_id, c
            );
            (c.clamp(0.0, 1.0) as f32, true)
        }
        Some(c) => (c as f32, false),
    };

    let detail = parse_detail(kind, &raw.analyzer, &raw.detail)?;

    if kind == SignalKind::Identity && verdict == Verdict::Pass {
        if let SignalDetail::Identity { employee_id: None } = detail {
            return Err(EngineError::invalid_signal(&raw.analyzer, "identity pass without employee_id"));
        }
    }

    Ok(SignalResult {
        kind,
        confidence,
        verdict,
        detail,
        timestamp: raw.timestamp.unwrap_or(frame_ts),
        camera_id: camera_id.to_string(),
        latency_ms: raw.latency_ms,
        confidence_clamped,
    })
}

/// Normalize a whole submission. Any malformed result rejects the submission.
///
/// Duplicate kinds collapse to the most confident result.
pub fn normalize_submission(submission: &AnalyzerSubmission) -> Result<NormalizedFrame> {
    let camera_id = submission.camera_id.trim();
    if camera_id.is_empty() {
        return Err(EngineError::invalid_signal("submission", "empty camera_id"));
    }

    let mut signals: Vec<SignalResult> = Vec::with_capacity(submission.results.len());
    for raw in &submission.results {
        let signal = normalize(raw, camera_id, submission.timestamp)?;
        match signals.iter_mut().find(|s| s.kind == signal.kind) {
            Some(existing) if existing.confidence < signal.confidence => *existing = signal,
            Some(_) => {}
            None => signals.push(signal),
        }
    }
    signals.sort_by_key(|s| s.kind);

    let area_id = submission
        .area_id
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    Ok(NormalizedFrame {
        camera_id: camera_id.to_string(),
        area_id,
        timestamp: submission.timestamp,
        signals,
    })
}

// ============================================================================
// DETAIL PARSING
// ============================================================================

fn parse_detail(kind: SignalKind, analyzer: &str, detail: &Value) -> Result<SignalDetail> {
    let empty = serde_json::Map::new();
    let obj = match detail {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return Err(EngineError::invalid_signal(analyzer, "detail must be an object")),
    };

    let detail = match kind {
        SignalKind::Identity => SignalDetail::Identity {
            employee_id: opt_string(obj, "employee_id", analyzer)?,
        },
        SignalKind::Attire => SignalDetail::Attire {
            missing_items: string_list(obj, "missing_items", analyzer)?,
        },
        SignalKind::Badge => SignalDetail::Badge {
            holder_id: opt_string(obj, "holder_id", analyzer)?,
            badge_id: opt_string(obj, "badge_id", analyzer)?,
        },
        SignalKind::Schedule => SignalDetail::Schedule {
            expected_status: opt_string(obj, "expected_status", analyzer)?,
            minutes_off: match obj.get("minutes_off") {
                None | Some(Value::Null) => None,
                Some(v) => Some(v.as_i64().ok_or_else(|| {
                    EngineError::invalid_signal(analyzer, "minutes_off must be an integer")
                })?),
            },
        },
    };
    Ok(detail)
}

fn opt_string(obj: &serde_json::Map<String, Value>, key: &str, analyzer: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(EngineError::invalid_signal(analyzer, format!("{} must be a string", key))),
    }
}

fn string_list(obj: &serde_json::Map<String, Value>, key: &str, analyzer: &str) -> Result<Vec<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| EngineError::invalid_signal(analyzer, format!("{} must contain strings", key)))
            })
            .collect(),
        Some(_) => Err(EngineError::invalid_signal(analyzer, format!("{} must be an array", key))),
    }
}

// ============================================================================
// TESTS
// ============================================================================
