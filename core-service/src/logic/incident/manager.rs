use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::types::AlertState;
use crate::logic::anomaly::AnomalyScore;
use crate::logic::config::SeverityConfig;
use crate::logic::degradation::DegradationLevel;
use crate::logic::identity::IdentityKey;
use crate::logic::policy::{self, Decision, Severity};

/// Per-identity alert states, partitioned by identity hash
pub struct IncidentManager {
    partitions: Vec<RwLock<HashMap<IdentityKey, AlertState>>>,
}

impl IncidentManager {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: (0..partitions.max(1)).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn partition(&self, identity: &IdentityKey) -> &RwLock<HashMap<IdentityKey, AlertState>> {
        &self.partitions[identity.partition(self.partitions.len())]
    }

    /// Run one state-machine step. State is created on the first anomaly
    /// and dropped again once it has decayed to None.
    pub fn evaluate(
        &self,
        identity: &IdentityKey,
        score: &AnomalyScore,
        now: DateTime<Utc>,
        config: &SeverityConfig,
    ) -> Decision {
        let mut part = self.partition(identity).write();
        let mut state = part
            .remove(identity)
            .unwrap_or_else(|| AlertState::new(identity.clone(), now));

        let decision = policy::step(&mut state, score, now, config);
        state.last_processed = Utc::now();

        if state.severity > Severity::None {
            part.insert(identity.clone(), state);
        }
        decision
    }

    pub fn get(&self, identity: &IdentityKey) -> Option<AlertState> {
        self.partition(identity).read().get(identity).cloned()
    }

    /// Data-retention hook
    pub fn purge(&self, identity: &IdentityKey) -> bool {
        self.partition(identity).write().remove(identity).is_some()
    }

    /// Apply idle decay to every tracked identity. Returns the de-escalations.
    ///
    /// `wall_now` is mapped onto each identity's event timeline, so decay and
    /// the event-driven steps compare timestamps from the same clock.
    pub fn decay_idle(&self, wall_now: DateTime<Utc>, config: &SeverityConfig, level: DegradationLevel) -> Vec<Decision> {
        let mut decisions = Vec::new();
        for lock in &self.partitions {
            let mut part = lock.write();
            for state in part.values_mut() {
                let now = state.clock(wall_now);
                if let Some(decision) = policy::decay(state, now, config, level) {
                    decisions.push(decision);
                }
            }
            part.retain(|_, state| !state.is_idle());
        }
        decisions
    }

    /// All identities currently above None, highest severity first
    pub fn active(&self) -> Vec<AlertState> {
        let mut list: Vec<AlertState> = self
            .partitions
            .iter()
            .flat_map(|p| p.read().values().cloned().collect::<Vec<_>>())
            .collect();
        list.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.changed_at.cmp(&a.changed_at)));
        list
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::anomaly::{FlagHit, ScoreBreakdown, StaticFlag};
    use crate::logic::policy::Action;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn anomaly(score: f32, flag: Option<StaticFlag>) -> AnomalyScore {
        AnomalyScore {
            score,
            breakdown: ScoreBreakdown::default(),
            flags: flag
                .map(|f| vec![FlagHit { flag: f, floor: score, reason: String::new() }])
                .unwrap_or_default(),
            floor_hit: flag.is_some(),
            cold_start: false,
            level: DegradationLevel::Normal,
            reasons: vec![],
        }
    }

    #[test]
    fn test_quiet_identity_leaves_no_state() {
        let mgr = IncidentManager::new(4);
        let e = IdentityKey::employee("E1");
        let d = mgr.evaluate(&e, &anomaly(0.1, None), t(0), &SeverityConfig::default());
        assert_eq!(d.severity, Severity::None);
        assert_eq!(d.action, Action::NoAlert);
        assert!(mgr.get(&e).is_none());
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_state_persists_between_events() {
        let mgr = IncidentManager::new(4);
        let config = SeverityConfig::default();
        let e = IdentityKey::employee("E1");

        mgr.evaluate(&e, &anomaly(0.6, None), t(0), &config);
        let d = mgr.evaluate(&e, &anomaly(0.6, None), t(1), &config);
        assert_eq!(d.severity, Severity::Medium);
        assert_eq!(mgr.get(&e).unwrap().recent_scores.len(), 2);

        // other identities are independent
        let other = IdentityKey::employee("E2");
        assert_eq!(mgr.evaluate(&other, &anomaly(0.6, None), t(1), &config).severity, Severity::Low);
    }

    #[test]
    fn test_decay_idle_and_cleanup() {
        let mgr = IncidentManager::new(4);
        let config = SeverityConfig::default();
        let cd = Duration::seconds(config.cooldown_secs as i64);
        let e = IdentityKey::employee("E1");

        mgr.evaluate(&e, &anomaly(0.6, Some(StaticFlag::BadgeMissing)), t(0), &config);
        let state = mgr.get(&e).unwrap();
        assert_eq!(state.severity, Severity::Medium);
        let wall = state.last_processed;

        // event time is years behind the wall clock; only elapsed wall time counts
        assert!(mgr.decay_idle(wall + cd - Duration::seconds(1), &config, DegradationLevel::Normal).is_empty());

        let d = mgr.decay_idle(wall + cd, &config, DegradationLevel::Normal);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].timestamp, t(0) + cd);
        assert_eq!(mgr.get(&e).unwrap().severity, Severity::Low);

        let d = mgr.decay_idle(wall + cd * 2, &config, DegradationLevel::Normal);
        assert_eq!(d[0].severity, Severity::None);
        assert!(mgr.get(&e).is_none());
    }

    #[test]
    fn test_purge() {
        let mgr = IncidentManager::new(4);
        let e = IdentityKey::employee("E1");
        mgr.evaluate(&e, &anomaly(0.6, Some(StaticFlag::BadgeMissing)), t(0), &SeverityConfig::default());
        assert!(mgr.purge(&e));
        assert!(!mgr.purge(&e));
    }
}
