//! Degradation Types
//!
//! The ladder itself plus the per-level profile consulted by the scorer
//! and the workers. Everything here is a pure function of the level.

use serde::{Deserialize, Serialize};

use crate::logic::config::{EngineConfig, LevelWeights, TermWeights};
use crate::logic::signal::SignalResult;

// ============================================================================
// LEVEL
// ============================================================================

/// Process-wide capability level, ordered by reduced capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DegradationLevel {
    /// All terms active, every analyzer consulted
    Normal,
    /// Temporal/spatial weights halved, slow non-mandatory analyzers skipped
    L1,
    /// Compliance + static policy only; non-mandatory analyzers treated as Unknown
    L2,
    /// Essential-only: static policy floor
    L3,
}

impl DegradationLevel {
    pub const ALL: [DegradationLevel; 4] = [
        DegradationLevel::Normal,
        DegradationLevel::L1,
        DegradationLevel::L2,
        DegradationLevel::L3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationLevel::Normal => "normal",
            DegradationLevel::L1 => "l1",
            DegradationLevel::L2 => "l2",
            DegradationLevel::L3 => "l3",
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => DegradationLevel::Normal,
            1 => DegradationLevel::L1,
            2 => DegradationLevel::L2,
            _ => DegradationLevel::L3,
        }
    }

    /// One step toward Normal
    pub fn step_down(self) -> Self {
        Self::from_u8(self.as_u8().saturating_sub(1))
    }

    pub fn weights(self, weights: &LevelWeights) -> TermWeights {
        match self {
            DegradationLevel::Normal => weights.normal,
            DegradationLevel::L1 => weights.l1,
            DegradationLevel::L2 => weights.l2,
            DegradationLevel::L3 => weights.l3,
        }
    }

    /// Is the weighted statistical sum evaluated at all?
    pub fn statistical_scoring(self) -> bool {
        self < DegradationLevel::L3
    }

    /// Are temporal/spatial terms consulted?
    pub fn behavioral_terms(self) -> bool {
        self < DegradationLevel::L2
    }
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DegradationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "l0" => Ok(DegradationLevel::Normal),
            "l1" => Ok(DegradationLevel::L1),
            "l2" => Ok(DegradationLevel::L2),
            "l3" => Ok(DegradationLevel::L3),
            other => Err(format!("unknown degradation level '{}'", other)),
        }
    }
}

// ============================================================================
// LOAD METRICS
// ============================================================================

/// External load/health signal. Each field is an independent pressure source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadMetrics {
    /// Inbound queue fill ratio in [0,1]
    pub queue_utilization: f32,
    /// Observed per-event processing latency
    pub processing_latency_ms: u64,
    /// Fraction of recent events that missed their deadline
    pub deadline_miss_rate: f32,
    /// Fraction of analyzers currently answering, in [0,1]
    pub analyzer_availability: f32,
}

impl Default for LoadMetrics {
    fn default() -> Self {
        Self {
            queue_utilization: 0.0,
            processing_latency_ms: 0,
            deadline_miss_rate: 0.0,
            analyzer_availability: 1.0,
        }
    }
}

impl LoadMetrics {
    /// Worst of all sources, in [0,1]
    pub fn pressure(&self, deadline_ms: u64) -> f32 {
        let latency = if deadline_ms > 0 {
            self.processing_latency_ms as f32 / deadline_ms as f32
        } else {
            0.0
        };
        [
            self.queue_utilization,
            latency,
            self.deadline_miss_rate,
            1.0 - self.analyzer_availability,
        ]
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max)
        .clamp(0.0, 1.0)
    }
}

// ============================================================================
// SIGNAL FILTERING
// ============================================================================

/// Apply the level's analyzer policy to one event's signals.
///
/// Skipped kinds stay in the list as `Unknown` so they carry no weight but
/// remain visible in the audit trail.
pub fn filter_signals(level: DegradationLevel, signals: Vec<SignalResult>, config: &EngineConfig) -> Vec<SignalResult> {
    signals
        .into_iter()
        .map(|signal| {
            if config.is_mandatory(signal.kind) {
                return signal;
            }
            let skip = match level {
                DegradationLevel::Normal => false,
                DegradationLevel::L1 => match (config.latency_budget(signal.kind), signal.latency_ms) {
                    (Some(budget), Some(latency)) => latency > budget,
                    _ => false,
                },
                DegradationLevel::L2 | DegradationLevel::L3 => true,
            };
            if skip {
                signal.into_unknown()
            } else {
                signal
            }
        })
        .collect()
}
