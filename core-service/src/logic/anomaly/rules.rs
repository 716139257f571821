//! Static Policy Rules
//!
//! Deterministic checks that force a score floor. Evaluated at every
//! degradation level and independent of any behavioral history.

use super::types::{FlagHit, StaticFlag};
use crate::logic::baseline::BaselineView;
use crate::logic::config::EngineConfig;
use crate::logic::events::AnalysisEvent;
use crate::logic::identity::IdentityKey;
use crate::logic::signal::{SignalKind, Verdict};

pub fn evaluate_static(event: &AnalysisEvent, view: &BaselineView, config: &EngineConfig) -> Vec<FlagHit> {
    let policy = &config.policy;
    let mut hits = Vec::new();

    // Badge
    if policy.badge_required && !policy.badge_exempt_areas.contains(&event.area_id) {
        if let Some(badge) = event.signal(SignalKind::Badge) {
            if badge.effective_verdict() == Verdict::Fail {
                hits.push(FlagHit {
                    flag: StaticFlag::BadgeMissing,
                    floor: policy.badge_floor,
                    reason: format!("Badge check failed in '{}' (confidence {:.2})", event.area_id, badge.confidence),
                });
            }
        }
    }

    // Restricted area
    if policy.is_restricted(&event.area_id) {
        let cleared = match &event.identity {
            IdentityKey::Employee(id) => policy.is_cleared(&event.area_id, id),
            IdentityKey::Ephemeral(_) => false,
        };
        if !cleared {
            hits.push(FlagHit {
                flag: StaticFlag::RestrictedAreaWithoutClearance,
                floor: policy.restricted_floor,
                reason: format!("{} in restricted area '{}' without clearance", event.identity, event.area_id),
            });
        }
    }

    // Face / badge consistency
    let face = event
        .signal(SignalKind::Identity)
        .filter(|s| s.effective_verdict() == Verdict::Pass)
        .and_then(|s| s.employee_id());
    let holder = event
        .signal(SignalKind::Badge)
        .filter(|s| s.effective_verdict() == Verdict::Pass)
        .and_then(|s| s.badge_holder());
    if let (Some(face), Some(holder)) = (face, holder) {
        if face != holder {
            hits.push(FlagHit {
                flag: StaticFlag::IdentityMismatch,
                floor: policy.mismatch_floor,
                reason: format!("Face matched {} but badge belongs to {}", face, holder),
            });
        }
    }

    // Lingering unknown person; the current sighting counts
    if let BaselineView::Ephemeral(track) = view {
        let sightings = track.sightings.saturating_add(1);
        if sightings >= config.identity.lingering_sightings {
            hits.push(FlagHit {
                flag: StaticFlag::UnidentifiedLingering,
                floor: policy.lingering_floor,
                reason: format!(
                    "Unidentified person seen {} times since {}",
                    sightings,
                    track.first_seen.format("%H:%M")
                ),
            });
        }
    }

    hits
}
