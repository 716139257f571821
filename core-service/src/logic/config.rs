//! Engine Configuration
//!
//! Loaded once at startup (JSON file), reloadable at runtime.
//! A failed reload keeps the last-known-good configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};
use super::policy::Severity;
use super::signal::SignalKind;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "PRESENCE_GUARD_CONFIG";

// ============================================================================
// ROOT CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub identity: IdentityConfig,
    pub signals: SignalConfig,
    pub baseline: BaselineConfig,
    pub scoring: ScoringConfig,
    pub policy: StaticPolicyConfig,
    pub severity: SeverityConfig,
    pub degradation: DegradationConfig,
    pub runtime: RuntimeConfig,
    /// camera_id -> area_id, used when a submission omits the area
    pub camera_areas: BTreeMap<String, String>,
}

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Minimum Identity confidence to resolve to a durable employee id
    pub match_threshold: f32,
    /// Width of the (camera, time) bucket for ephemeral keys
    pub ephemeral_bucket_secs: u64,
    /// How long an ephemeral track is kept after its last sighting
    pub ephemeral_ttl_secs: u64,
    /// Sightings within the TTL before an unknown person counts as lingering
    pub lingering_sightings: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.6,
            ephemeral_bucket_secs: 300,
            ephemeral_ttl_secs: 900,
            lingering_sightings: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Per-kind acceptance threshold; below it the verdict becomes Unknown
    pub thresholds: BTreeMap<SignalKind, f32>,
    /// Kinds still required under L2/L3
    pub mandatory_kinds: Vec<SignalKind>,
    /// Kinds that feed the compliance term
    pub compliance_kinds: Vec<SignalKind>,
    /// Per-kind latency budget; over-budget non-mandatory kinds are skipped under L1
    pub latency_budget_ms: BTreeMap<SignalKind, u64>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            thresholds: BTreeMap::from([
                (SignalKind::Identity, 0.6),
                (SignalKind::Attire, 0.5),
                (SignalKind::Badge, 0.5),
                (SignalKind::Schedule, 0.5),
            ]),
            mandatory_kinds: vec![SignalKind::Identity, SignalKind::Badge],
            compliance_kinds: vec![SignalKind::Attire, SignalKind::Badge, SignalKind::Schedule],
            latency_budget_ms: BTreeMap::from([
                (SignalKind::Attire, 80),
                (SignalKind::Schedule, 50),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Trailing window; the forgetting rate is 3 / window
    pub window_days: f64,
    /// Observations needed before temporal/spatial terms are trusted
    pub min_observations: u64,
    /// Facility local time offset used for minutes-of-day
    pub utc_offset_minutes: i32,
    pub arrival_prior_minutes: f64,
    pub departure_prior_minutes: f64,
    pub prior_std_minutes: f64,
    /// Pseudo-observation weight of the prior
    pub prior_weight: f64,
    /// Remembered (timestamp, camera) pairs per identity for dedup
    pub dedup_capacity: usize,
    /// Number of lock partitions in the store
    pub partitions: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: 30.0,
            min_observations: 5,
            utc_offset_minutes: 0,
            arrival_prior_minutes: 9.0 * 60.0,
            departure_prior_minutes: 18.0 * 60.0,
            prior_std_minutes: 90.0,
            prior_weight: 0.25,
            dedup_capacity: 64,
            partitions: 64,
        }
    }
}

impl BaselineConfig {
    /// Exponential forgetting rate per day
    pub fn lambda_per_day(&self) -> f64 {
        3.0 / self.window_days
    }

    /// Half-life of an observation's weight, in days
    pub fn half_life_days(&self) -> f64 {
        std::f64::consts::LN_2 / self.lambda_per_day()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermWeights {
    pub temporal: f32,
    pub spatial: f32,
    pub compliance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelWeights {
    pub normal: TermWeights,
    pub l1: TermWeights,
    pub l2: TermWeights,
    pub l3: TermWeights,
}

impl Default for LevelWeights {
    fn default() -> Self {
        Self {
            normal: TermWeights { temporal: 0.35, spatial: 0.35, compliance: 0.30 },
            l1: TermWeights { temporal: 0.175, spatial: 0.175, compliance: 0.30 },
            l2: TermWeights { temporal: 0.0, spatial: 0.0, compliance: 0.60 },
            l3: TermWeights { temporal: 0.0, spatial: 0.0, compliance: 0.0 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: LevelWeights,
    /// z-scores up to this value contribute nothing
    pub z_free: f64,
    /// Saturation scale: term = tanh((z - z_free) / z_scale)
    pub z_scale: f64,
    /// Share of visits at which an area counts as fully familiar
    pub familiar_share: f64,
    /// Fixed spatial penalty for restricted areas, independent of history
    pub restricted_penalty: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: LevelWeights::default(),
            z_free: 1.0,
            z_scale: 2.0,
            familiar_share: 0.15,
            restricted_penalty: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticPolicyConfig {
    pub restricted_areas: BTreeSet<String>,
    /// area_id -> employees cleared for it
    pub clearances: BTreeMap<String, BTreeSet<String>>,
    pub badge_required: bool,
    pub badge_exempt_areas: BTreeSet<String>,
    /// Score floor for a failed mandatory badge check
    pub badge_floor: f32,
    pub restricted_floor: f32,
    pub mismatch_floor: f32,
    pub lingering_floor: f32,
}

impl Default for StaticPolicyConfig {
    fn default() -> Self {
        Self {
            restricted_areas: ["server_room", "management", "finance"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            clearances: BTreeMap::new(),
            badge_required: true,
            badge_exempt_areas: BTreeSet::new(),
            badge_floor: 0.35,
            restricted_floor: 0.55,
            mismatch_floor: 0.55,
            lingering_floor: 0.32,
        }
    }
}

impl StaticPolicyConfig {
    pub fn is_restricted(&self, area_id: &str) -> bool {
        self.restricted_areas.contains(area_id)
    }

    pub fn is_cleared(&self, area_id: &str, employee_id: &str) -> bool {
        self.clearances
            .get(area_id)
            .map(|ids| ids.contains(employee_id))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityConfig {
    pub low: f32,
    pub medium: f32,
    pub high: f32,
    pub critical: f32,
    /// Recent scores kept per identity (hysteresis buffer)
    pub history_len: usize,
    /// How many of them must exceed a threshold to confirm escalation
    pub confirmations: usize,
    /// Quiet time before dropping one level; also the re-emission interval
    pub cooldown_secs: u64,
    /// Lowest severity handed to the alert emitter
    pub min_alert_severity: Severity,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            low: 0.30,
            medium: 0.50,
            high: 0.70,
            critical: 0.85,
            history_len: 3,
            confirmations: 2,
            cooldown_secs: 600,
            min_alert_severity: Severity::Medium,
        }
    }
}

impl SeverityConfig {
    pub fn threshold(&self, severity: Severity) -> f32 {
        match severity {
            Severity::None => 0.0,
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    /// Highest severity whose threshold the score reaches
    pub fn level_for(&self, score: f32) -> Severity {
        if score >= self.critical {
            Severity::Critical
        } else if score >= self.high {
            Severity::High
        } else if score >= self.medium {
            Severity::Medium
        } else if score >= self.low {
            Severity::Low
        } else {
            Severity::None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    pub l1_pressure: f32,
    pub l2_pressure: f32,
    pub l3_pressure: f32,
    /// Pressure must stay below a level's threshold this long before stepping down
    pub recovery_secs: u64,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            l1_pressure: 0.60,
            l2_pressure: 0.80,
            l3_pressure: 0.95,
            recovery_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub deadline_ms: u64,
    pub alert_buffer: usize,
    pub critical_max_attempts: u32,
    pub retry_base_ms: u64,
    pub sweep_interval_secs: u64,
    /// Directory for the JSONL decision audit; None keeps audit in memory only
    pub audit_dir: Option<PathBuf>,
    pub audit_memory: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            deadline_ms: 200,
            alert_buffer: 256,
            critical_max_attempts: 6,
            retry_base_ms: 50,
            sweep_interval_secs: 30,
            audit_dir: None,
            audit_memory: 1000,
        }
    }
}

// ============================================================================
// LOADING & VALIDATION
// ============================================================================

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Config path from `PRESENCE_GUARD_CONFIG`, defaults when unset
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.severity;
        if !(0.0 < s.low && s.low < s.medium && s.medium < s.high && s.high < s.critical && s.critical <= 1.0) {
            return Err(EngineError::Config(
                "severity thresholds must satisfy 0 < low < medium < high < critical <= 1".to_string(),
            ));
        }
        if s.history_len == 0 || s.confirmations == 0 || s.confirmations > s.history_len {
            return Err(EngineError::Config(
                "severity confirmations must be in 1..=history_len".to_string(),
            ));
        }

        let w = &self.scoring.weights;
        for (name, tw) in [("normal", w.normal), ("l1", w.l1), ("l2", w.l2), ("l3", w.l3)] {
            for v in [tw.temporal, tw.spatial, tw.compliance] {
                if !(0.0..=1.0).contains(&v) {
                    return Err(EngineError::Config(format!("weights.{} must lie in [0,1]", name)));
                }
            }
        }
        if self.scoring.z_scale <= 0.0 || self.scoring.familiar_share <= 0.0 {
            return Err(EngineError::Config("scoring scales must be positive".to_string()));
        }

        // mandatory violations must always land at or above Low
        let p = &self.policy;
        for (name, floor) in [
            ("badge_floor", p.badge_floor),
            ("restricted_floor", p.restricted_floor),
            ("mismatch_floor", p.mismatch_floor),
        ] {
            if !(s.low..=1.0).contains(&floor) {
                return Err(EngineError::Config(format!("policy.{} must lie in [severity.low, 1]", name)));
            }
        }

        if self.baseline.window_days <= 0.0 || self.baseline.prior_std_minutes <= 0.0 {
            return Err(EngineError::Config("baseline window and prior std must be positive".to_string()));
        }
        if self.baseline.partitions == 0 {
            return Err(EngineError::Config("baseline.partitions must be > 0".to_string()));
        }

        if !(0.0..=1.0).contains(&self.identity.match_threshold) {
            return Err(EngineError::Config("identity.match_threshold must lie in [0,1]".to_string()));
        }
        if self.identity.ephemeral_bucket_secs == 0 {
            return Err(EngineError::Config("identity.ephemeral_bucket_secs must be > 0".to_string()));
        }

        let d = &self.degradation;
        if !(d.l1_pressure < d.l2_pressure && d.l2_pressure < d.l3_pressure) {
            return Err(EngineError::Config("degradation pressures must be increasing".to_string()));
        }

        let r = &self.runtime;
        if r.workers == 0 || r.queue_capacity == 0 || r.alert_buffer == 0 || r.deadline_ms == 0 {
            return Err(EngineError::Config("runtime sizes and deadline must be > 0".to_string()));
        }
        Ok(())
    }

    // --- Accessors ---

    pub fn threshold_for(&self, kind: SignalKind) -> f32 {
        self.signals.thresholds.get(&kind).copied().unwrap_or(0.5)
    }

    pub fn is_mandatory(&self, kind: SignalKind) -> bool {
        self.signals.mandatory_kinds.contains(&kind)
    }

    pub fn latency_budget(&self, kind: SignalKind) -> Option<u64> {
        self.signals.latency_budget_ms.get(&kind).copied()
    }

    pub fn area_for_camera(&self, camera_id: &str) -> Option<&str> {
        self.camera_areas.get(camera_id).map(String::as_str)
    }
}

// ============================================================================
// TESTS
// ============================================================================
