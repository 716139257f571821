//! Anomaly Types
//!
//! Output of scoring. Data only, no logic beyond small accessors.

use serde::{Deserialize, Serialize};

use crate::logic::config::TermWeights;
use crate::logic::degradation::DegradationLevel;

// ============================================================================
// STATIC POLICY FLAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticFlag {
    /// Badge required in this area but the badge check failed
    BadgeMissing,
    /// Restricted area entered by someone not on its clearance list
    RestrictedAreaWithoutClearance,
    /// Face match and badge holder disagree
    IdentityMismatch,
    /// Unidentified person seen repeatedly within the tracking TTL
    UnidentifiedLingering,
}

impl StaticFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaticFlag::BadgeMissing => "badge_missing",
            StaticFlag::RestrictedAreaWithoutClearance => "restricted_area_without_clearance",
            StaticFlag::IdentityMismatch => "identity_mismatch",
            StaticFlag::UnidentifiedLingering => "unidentified_lingering",
        }
    }

    /// Mandatory violations must raise at least Low severity at every degradation level
    pub fn is_mandatory(&self) -> bool {
        !matches!(self, StaticFlag::UnidentifiedLingering)
    }
}

impl std::fmt::Display for StaticFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagHit {
    pub flag: StaticFlag,
    /// Minimum composite score this flag forces
    pub floor: f32,
    pub reason: String,
}

// ============================================================================
// SCORE
// ============================================================================

/// Per-term contributions, each in [0,1] before weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub temporal: f32,
    /// Larger of area novelty and overstay
    pub spatial: f32,
    /// Overstay in the current area against the usual dwell time
    #[serde(default)]
    pub dwell: f32,
    pub compliance: f32,
    /// Highest floor among raised static flags, 0 when none
    pub static_floor: f32,
    pub weights: TermWeights,
    /// Weighted sum before the floor is applied
    pub weighted_sum: f32,
}

impl Default for ScoreBreakdown {
    fn default() -> Self {
        Self {
            temporal: 0.0,
            spatial: 0.0,
            dwell: 0.0,
            compliance: 0.0,
            static_floor: 0.0,
            weights: TermWeights { temporal: 0.0, spatial: 0.0, compliance: 0.0 },
            weighted_sum: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyScore {
    /// Composite in [0,1]: max(weighted sum, static floor)
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    pub flags: Vec<FlagHit>,
    /// True when any static flag set a floor
    pub floor_hit: bool,
    /// Durable identity without a usable baseline
    pub cold_start: bool,
    pub level: DegradationLevel,
    pub reasons: Vec<String>,
}

impl AnomalyScore {
    pub fn has_mandatory_violation(&self) -> bool {
        self.flags.iter().any(|f| f.flag.is_mandatory())
    }

    pub fn has_flag(&self, flag: StaticFlag) -> bool {
        self.flags.iter().any(|f| f.flag == flag)
    }
}
