//! Baseline Store
//!
//! Identity-partitioned storage. Each partition sits behind its own
//! `RwLock`: writers for one identity serialize on its partition, readers
//! get a cloned snapshot and never observe a half-applied update.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use super::types::{BaselineView, BehaviorBaseline, EphemeralTrack, UpdateOutcome};
use crate::logic::config::BaselineConfig;
use crate::logic::events::AnalysisEvent;
use crate::logic::identity::IdentityKey;

#[derive(Default)]
struct Partition {
    durable: HashMap<String, BehaviorBaseline>,
    ephemeral: HashMap<String, EphemeralTrack>,
}

pub struct BaselineStore {
    partitions: Vec<RwLock<Partition>>,
}

impl BaselineStore {
    pub fn new(partitions: usize) -> Self {
        let n = partitions.max(1);
        Self {
            partitions: (0..n).map(|_| RwLock::new(Partition::default())).collect(),
        }
    }

    fn partition(&self, identity: &IdentityKey) -> &RwLock<Partition> {
        &self.partitions[identity.partition(self.partitions.len())]
    }

    /// Snapshot-isolated view. Unknown durable identities yield `NoBaseline`,
    /// unknown or expired ephemeral keys an empty track.
    pub fn snapshot(&self, identity: &IdentityKey, now: DateTime<Utc>, ephemeral_ttl: Duration) -> BaselineView {
        let part = self.partition(identity).read();
        match identity {
            IdentityKey::Employee(id) => part
                .durable
                .get(id)
                .cloned()
                .map(BaselineView::Durable)
                .unwrap_or(BaselineView::NoBaseline),
            IdentityKey::Ephemeral(id) => {
                let track = part
                    .ephemeral
                    .get(id)
                    .filter(|t| !t.is_expired(now, ephemeral_ttl))
                    .cloned()
                    .unwrap_or_else(|| EphemeralTrack::new(id, now));
                BaselineView::Ephemeral(track)
            }
        }
    }

    /// Baseline for operational queries; `None` when nothing is stored
    pub fn get(&self, identity: &IdentityKey) -> Option<BaselineView> {
        let part = self.partition(identity).read();
        match identity {
            IdentityKey::Employee(id) => part.durable.get(id).cloned().map(BaselineView::Durable),
            IdentityKey::Ephemeral(id) => part.ephemeral.get(id).cloned().map(BaselineView::Ephemeral),
        }
    }

    /// Has this exact (timestamp, camera) pair already been applied?
    pub fn is_duplicate(&self, event: &AnalysisEvent) -> bool {
        let (ts, camera) = event.dedup_key();
        let part = self.partition(&event.identity).read();
        match &event.identity {
            IdentityKey::Employee(id) => part.durable.get(id).map_or(false, |b| b.recent.contains(ts, camera)),
            IdentityKey::Ephemeral(id) => part.ephemeral.get(id).map_or(false, |t| t.recent.contains(ts, camera)),
        }
    }

    /// Apply one event. Replays of an already applied (timestamp, camera)
    /// pair are ignored so they cannot double-count.
    pub fn update(&self, event: &AnalysisEvent, config: &BaselineConfig, ephemeral_ttl: Duration) -> UpdateOutcome {
        let (ts, camera) = event.dedup_key();
        let mut part = self.partition(&event.identity).write();

        match &event.identity {
            IdentityKey::Employee(id) => match part.durable.get_mut(id) {
                Some(baseline) => {
                    if baseline.recent.contains(ts, camera) {
                        return UpdateOutcome::Duplicate;
                    }
                    baseline.apply(event, config);
                    UpdateOutcome::Updated
                }
                None => {
                    let mut baseline = BehaviorBaseline::new(id, event.timestamp);
                    baseline.apply(event, config);
                    part.durable.insert(id.clone(), baseline);
                    log::debug!("Created baseline for employee {}", id);
                    UpdateOutcome::Created
                }
            },
            IdentityKey::Ephemeral(id) => {
                let track = part
                    .ephemeral
                    .entry(id.clone())
                    .or_insert_with(|| EphemeralTrack::new(id, event.timestamp));
                if track.is_expired(event.timestamp, ephemeral_ttl) {
                    *track = EphemeralTrack::new(id, event.timestamp);
                } else if track.recent.contains(ts, camera) {
                    return UpdateOutcome::Duplicate;
                }
                track.record(event, config.dedup_capacity);
                UpdateOutcome::Tracked
            }
        }
    }

    /// Data-retention hook. Returns whether anything was removed.
    pub fn purge(&self, identity: &IdentityKey) -> bool {
        let mut part = self.partition(identity).write();
        let removed = match identity {
            IdentityKey::Employee(id) => part.durable.remove(id).is_some(),
            IdentityKey::Ephemeral(id) => part.ephemeral.remove(id).is_some(),
        };
        if removed {
            log::info!("Purged baseline for {}", identity);
        }
        removed
    }

    /// Drop ephemeral tracks idle for longer than the TTL. Returns how many were dropped.
    /// `wall_now` is mapped onto each track's event timeline.
    pub fn expire_ephemeral(&self, wall_now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut expired = 0;
        for lock in &self.partitions {
            let mut part = lock.write();
            let before = part.ephemeral.len();
            part.ephemeral.retain(|_, t| !t.is_expired(t.clock(wall_now), ttl));
            expired += before - part.ephemeral.len();
        }
        if expired > 0 {
            log::debug!("Expired {} ephemeral tracks", expired);
        }
        expired
    }

    pub fn durable_count(&self) -> usize {
        self.partitions.iter().map(|p| p.read().durable.len()).sum()
    }

    pub fn ephemeral_count(&self) -> usize {
        self.partitions.iter().map(|p| p.read().ephemeral.len()).sum()
    }
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(BaselineConfig::default().partitions)
    }
}
