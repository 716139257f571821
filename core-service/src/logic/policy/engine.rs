//! Severity State Machine
//!
//! Pure transition logic: (AlertState, AnomalyScore, now, config) -> Decision.
//! The caller owns the state and serializes access per identity.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::types::{Action, Decision, Severity, Transition};
use crate::logic::anomaly::AnomalyScore;
use crate::logic::config::SeverityConfig;
use crate::logic::degradation::DegradationLevel;
use crate::logic::incident::AlertState;

// ============================================================================
// MAIN TRANSITION FUNCTION
// ============================================================================

/// Advance one identity's state with a newly scored event
pub fn step(state: &mut AlertState, score: &AnomalyScore, now: DateTime<Utc>, config: &SeverityConfig) -> Decision {
    let mut reasons = Vec::new();

    // Pending idle decay is applied before the event is judged
    if let Some(from) = apply_decay(state, now, config) {
        reasons.push(format!("Cooled down {} -> {} before scoring", from, state.severity));
    }

    let previous = state.severity;
    state.push_score(score.score, config.history_len);
    state.events += 1;
    state.last_seen = state.last_seen.max(now);

    let mut target = config.level_for(score.score);
    if score.has_mandatory_violation() && target < Severity::Low {
        target = Severity::Low;
        reasons.push("Mandatory violation holds severity at Low or above".to_string());
    }

    let (next, confirmed) = if target > previous {
        escalation_target(state, previous, target, score.floor_hit, config)
    } else {
        (previous, false)
    };

    let mut decision = Decision {
        identity: state.identity.clone(),
        timestamp: now,
        previous,
        severity: next,
        transition: Transition::Unchanged,
        action: Action::NoAlert,
        score: Some(score.score),
        confirmed,
        level: score.level,
        reasons,
    };

    if next > previous {
        enter(state, next, now);
        decision.transition = Transition::Escalated;
        if !confirmed {
            decision.reasons.push(format!(
                "Score {:.2} reaches {} but is unconfirmed, limited to {}",
                score.score, target, next
            ));
        }
        if next >= config.min_alert_severity {
            decision.action = alert_action(score.level);
            state.last_emitted = Some(now);
            state.last_emitted_severity = next;
        }
        return decision;
    }

    // No escalation: a score at or above the current threshold keeps the level warm
    let qualifying = previous > Severity::None && score.score >= config.threshold(previous);
    if qualifying {
        // out-of-order events never move the quiet period backwards
        state.quiet_since = state.quiet_since.max(now);
        if previous >= config.min_alert_severity {
            let cooldown = Duration::seconds(config.cooldown_secs as i64);
            let due = state.last_emitted.map_or(true, |t| now - t >= cooldown);
            if due {
                decision.action = alert_action(score.level);
                decision.reasons.push(format!("Reminder: still {} after cooldown", previous));
                state.last_emitted = Some(now);
                state.last_emitted_severity = previous;
            } else {
                decision.action = Action::Suppressed;
                state.suppressed += 1;
            }
        }
    }

    decision
}

/// Idle decay without a new event (driven by the sweeper).
/// Returns a de-escalation decision when a level was dropped.
pub fn decay(state: &mut AlertState, now: DateTime<Utc>, config: &SeverityConfig, level: DegradationLevel) -> Option<Decision> {
    let from = apply_decay(state, now, config)?;
    Some(Decision {
        identity: state.identity.clone(),
        timestamp: now,
        previous: from,
        severity: state.severity,
        transition: Transition::DeEscalated,
        action: Action::NoAlert,
        score: None,
        confirmed: false,
        level,
        reasons: vec![format!("No qualifying anomaly for {}s", config.cooldown_secs)],
    })
}

// ============================================================================
// HELPERS
// ============================================================================

/// Highest level in (current, target] the evidence supports.
///
/// A static floor confirms the full target. Otherwise a level is confirmed
/// when enough buffered scores reach its threshold. Without confirmation
/// the state may only leave None for Low.
fn escalation_target(
    state: &AlertState,
    current: Severity,
    target: Severity,
    floor_hit: bool,
    config: &SeverityConfig,
) -> (Severity, bool) {
    if floor_hit {
        return (target, true);
    }

    let confirmed = Severity::ALL
        .iter()
        .copied()
        .filter(|s| *s > current && *s <= target)
        .filter(|s| state.count_at_least(config.threshold(*s)) >= config.confirmations)
        .max();

    match confirmed {
        Some(level) => (level, true),
        None if current == Severity::None => (Severity::Low.min(target), false),
        None => (current, false),
    }
}

/// Drop one level if the quiet period has elapsed. Returns the level left.
fn apply_decay(state: &mut AlertState, now: DateTime<Utc>, config: &SeverityConfig) -> Option<Severity> {
    if state.severity == Severity::None {
        return None;
    }
    if now - state.quiet_since < Duration::seconds(config.cooldown_secs as i64) {
        return None;
    }
    let from = state.severity;
    enter(state, from.step_down(), now);
    Some(from)
}

fn enter(state: &mut AlertState, severity: Severity, now: DateTime<Utc>) {
    if state.severity == Severity::None && severity > Severity::None {
        state.incident_id = Some(Uuid::new_v4());
        state.started_at = now;
    }
    if severity == Severity::None {
        state.incident_id = None;
    }
    state.severity = severity;
    state.changed_at = now;
    state.quiet_since = state.quiet_since.max(now);
}

fn alert_action(level: DegradationLevel) -> Action {
    if level == DegradationLevel::Normal {
        Action::Alert
    } else {
        Action::DegradedAlert
    }
}

// ============================================================================
// TESTS
// ============================================================================
