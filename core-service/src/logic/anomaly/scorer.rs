//! Anomaly Scorer
//!
//! Pure function: (event, baseline view, degradation level, config) -> score.
//! Composite = max(weighted sum of normalized terms, static policy floor).

use chrono::Duration;

use super::rules::evaluate_static;
use super::types::{AnomalyScore, ScoreBreakdown};
use crate::logic::baseline::types::{local_day_minute, VISIT_GAP_MINUTES};
use crate::logic::baseline::{BaselineView, BehaviorBaseline, Prior};
use crate::logic::config::{EngineConfig, ScoringConfig};
use crate::logic::degradation::DegradationLevel;
use crate::logic::events::AnalysisEvent;
use crate::logic::signal::{SignalKind, SignalResult, Verdict};

/// Lower bound on a distribution's spread, in minutes
const MIN_STD_MINUTES: f64 = 5.0;

/// Completed visits to an area before its dwell time is judged
const MIN_DWELL_VISITS: u64 = 3;

// ============================================================================
// MAIN SCORING FUNCTION
// ============================================================================

pub fn score(
    event: &AnalysisEvent,
    view: &BaselineView,
    level: DegradationLevel,
    config: &EngineConfig,
) -> AnomalyScore {
    let mut reasons = Vec::new();

    let flags = evaluate_static(event, view, config);
    let static_floor = flags.iter().map(|f| f.floor).fold(0.0f32, f32::max);
    for hit in &flags {
        reasons.push(hit.reason.clone());
    }

    let weights = level.weights(&config.scoring.weights);
    let mature = view
        .durable()
        .filter(|b| b.is_mature(&config.baseline));
    let cold_start = event.identity.is_durable() && mature.is_none();

    let (temporal, area, dwell, compliance) = if level.statistical_scoring() {
        let (temporal, area, dwell) = if level.behavioral_terms() {
            match mature {
                Some(baseline) => (
                    temporal_term(event, baseline, config),
                    spatial_term(event, baseline, config),
                    dwell_term(event, baseline, config),
                ),
                None => (0.0, ephemeral_spatial_term(event, view, config), 0.0),
            }
        } else {
            (0.0, 0.0, 0.0)
        };
        let compliance = compliance_term(&event.signals, &config.signals.compliance_kinds);
        (temporal, area, dwell, compliance)
    } else {
        reasons.push(format!("Essential-only mode ({}), statistical terms suspended", level));
        (0.0, 0.0, 0.0, 0.0)
    };
    let spatial = area.max(dwell);

    if temporal > 0.5 {
        reasons.push(format!("Unusual time of day (temporal {:.2})", temporal));
    }
    if area > 0.5 {
        reasons.push(format!("Unfamiliar area '{}' (spatial {:.2})", event.area_id, area));
    }
    if dwell > 0.5 {
        reasons.push(format!("Staying in '{}' longer than usual (dwell {:.2})", event.area_id, dwell));
    }
    if compliance > 0.0 {
        reasons.push(format!("Compliance shortfall {:.2}", compliance));
    }

    let weighted_sum = (weights.temporal * temporal + weights.spatial * spatial + weights.compliance * compliance)
        .clamp(0.0, 1.0);
    let score = weighted_sum.max(static_floor).clamp(0.0, 1.0);

    AnomalyScore {
        score,
        breakdown: ScoreBreakdown {
            temporal,
            spatial,
            dwell,
            compliance,
            static_floor,
            weights,
            weighted_sum,
        },
        floor_hit: !flags.is_empty(),
        flags,
        cold_start,
        level,
        reasons,
    }
}

// ============================================================================
// TERMS
// ============================================================================

/// Saturating map from a z-score to [0,1)
pub fn saturate(z: f64, scoring: &ScoringConfig) -> f32 {
    let excess = (z.abs() - scoring.z_free).max(0.0);
    (excess / scoring.z_scale).tanh() as f32
}

/// Deviation from the arrival/departure pattern.
///
/// The first sighting of a local day is compared with arrivals; later
/// sightings only count when they fall outside the usual arrival..departure span.
pub fn temporal_term(event: &AnalysisEvent, baseline: &BehaviorBaseline, config: &EngineConfig) -> f32 {
    let bc = &config.baseline;
    let lambda = bc.lambda_per_day();
    let (_, minute) = local_day_minute(event.timestamp, bc.utc_offset_minutes);

    let (arr_mean, arr_std) = baseline.arrival.blended(event.timestamp, lambda, &Prior::arrival(bc));
    let (dep_mean, dep_std) = baseline.departure.blended(event.timestamp, lambda, &Prior::departure(bc));
    let arr_std = arr_std.max(MIN_STD_MINUTES);
    let dep_std = dep_std.max(MIN_STD_MINUTES);

    let z = if baseline.is_first_of_day(event.timestamp, bc) {
        (minute - arr_mean) / arr_std
    } else if minute > dep_mean {
        (minute - dep_mean) / dep_std
    } else if minute < arr_mean {
        (arr_mean - minute) / arr_std
    } else {
        0.0
    };

    saturate(z, &config.scoring)
}

/// Inverse visit frequency plus a fixed penalty for restricted areas
pub fn spatial_term(event: &AnalysisEvent, baseline: &BehaviorBaseline, config: &EngineConfig) -> f32 {
    let scoring = &config.scoring;
    let share = baseline.visit_share(&event.area_id, event.timestamp, config.baseline.lambda_per_day());
    let novelty = 1.0 - (share / scoring.familiar_share).min(1.0);
    let penalty = if config.policy.is_restricted(&event.area_id) {
        scoring.restricted_penalty
    } else {
        0.0
    };
    (novelty as f32 + penalty).clamp(0.0, 1.0)
}

/// Overstay of the ongoing visit against the area's completed dwell times.
/// Only stays longer than the mean count.
pub fn dwell_term(event: &AnalysisEvent, baseline: &BehaviorBaseline, config: &EngineConfig) -> f32 {
    let visit = match &baseline.current_visit {
        Some(v) if v.area_id == event.area_id && event.timestamp - v.last_seen <= Duration::minutes(VISIT_GAP_MINUTES) => v,
        _ => return 0.0,
    };
    let stats = match baseline.locations.get(&event.area_id) {
        Some(loc) if loc.dwell_minutes.count >= MIN_DWELL_VISITS => &loc.dwell_minutes,
        _ => return 0.0,
    };

    let minutes = (event.timestamp - visit.entered_at).num_seconds().max(0) as f64 / 60.0;
    if minutes <= stats.mean {
        return 0.0;
    }
    let z = (minutes - stats.mean) / stats.std_dev().max(MIN_STD_MINUTES);
    saturate(z, &config.scoring)
}

/// Unknown persons have no history; only the restricted-area penalty applies.
/// Durable identities in cold start get nothing.
fn ephemeral_spatial_term(event: &AnalysisEvent, view: &BaselineView, config: &EngineConfig) -> f32 {
    match view {
        BaselineView::Ephemeral(_) if config.policy.is_restricted(&event.area_id) => {
            config.scoring.restricted_penalty.clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// 1 - confidence-weighted Pass-rate over decisive signals of the given kinds.
/// Unknown verdicts carry no weight; no decisive signal means 0.
pub fn compliance_term(signals: &[SignalResult], kinds: &[SignalKind]) -> f32 {
    let mut pass_weight = 0.0f32;
    let mut total_weight = 0.0f32;
    for signal in signals.iter().filter(|s| kinds.contains(&s.kind)) {
        match signal.effective_verdict() {
            Verdict::Pass => {
                pass_weight += signal.confidence;
                total_weight += signal.confidence;
            }
            Verdict::Fail => total_weight += signal.confidence,
            Verdict::Unknown => {}
        }
    }
    if total_weight <= 0.0 {
        return 0.0;
    }
    (1.0 - pass_weight / total_weight).clamp(0.0, 1.0)
}
