//! Analysis Loop - sharded worker pool
//!
//! Identities are hashed onto a fixed set of shards. Each shard owns one
//! bounded queue and one worker task, so all events for an identity are
//! processed by the same worker in arrival order without a global lock.
//!
//! Per event: dedup -> deadline -> gate/filter -> snapshot -> score ->
//! baseline update -> severity step -> audit -> emit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::logic::anomaly;
use crate::logic::baseline::BaselineStore;
use crate::logic::config::EngineConfig;
use crate::logic::degradation::{filter_signals, DegradationController};
use crate::logic::error::{EngineError, Result};
use crate::logic::events::AnalysisEvent;
use crate::logic::incident::IncidentManager;
use crate::logic::policy::{Action, Decision};
use crate::logic::response::{AlertEmitter, AlertRecord};
use crate::logic::signal::SignalKind;
use crate::logic::telemetry::{AuditEntry, AuditLog, Counter, Counters};

// ============================================================================
// PIPELINE (shared state)
// ============================================================================

/// Everything a worker needs. One instance shared by all shards.
pub struct Pipeline {
    config: RwLock<Arc<EngineConfig>>,
    pub baselines: BaselineStore,
    pub incidents: IncidentManager,
    pub degradation: Arc<DegradationController>,
    pub emitter: Arc<AlertEmitter>,
    pub audit: AuditLog,
    pub counters: Arc<Counters>,
}

impl Pipeline {
    pub fn new(
        config: Arc<EngineConfig>,
        degradation: Arc<DegradationController>,
        emitter: Arc<AlertEmitter>,
        audit: AuditLog,
        counters: Arc<Counters>,
    ) -> Self {
        let partitions = config.baseline.partitions;
        Self {
            config: RwLock::new(config),
            baselines: BaselineStore::new(partitions),
            incidents: IncidentManager::new(partitions),
            degradation,
            emitter,
            audit,
            counters,
        }
    }

    /// Config in effect for the next event
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: Arc<EngineConfig>) {
        self.degradation
            .set_config(config.degradation.clone(), config.runtime.deadline_ms);
        *self.config.write() = config;
    }

    /// Process one event end to end. `queued_for` is the time it spent
    /// waiting in its shard queue. Returns None for replays.
    pub fn process(&self, event: AnalysisEvent, queued_for: Duration) -> Option<Decision> {
        let started = Instant::now();
        let config = self.config();

        if self.baselines.is_duplicate(&event) {
            self.counters.incr(Counter::DuplicateEvents);
            log::debug!("Duplicate event for {} at {} from {}, skipped", event.identity, event.timestamp, event.camera_id);
            return None;
        }

        let mut event = event;
        let budget_ms = config.runtime.deadline_ms;
        let missing = apply_deadline(&mut event, budget_ms);
        let queued_ms = queued_for.as_millis() as u64;
        let mut missed = queued_ms > budget_ms || !missing.is_empty();

        let level = self.degradation.current_level();
        let signals = std::mem::take(&mut event.signals)
            .into_iter()
            .map(|s| {
                let threshold = config.threshold_for(s.kind);
                s.gated(threshold)
            })
            .collect();
        event.signals = filter_signals(level, signals, &config);

        let ttl = chrono::Duration::seconds(config.identity.ephemeral_ttl_secs as i64);
        let view = self.baselines.snapshot(&event.identity, event.timestamp, ttl);
        let score = anomaly::score(&event, &view, level, &config);

        self.baselines.update(&event, &config.baseline, ttl);

        let decision = self
            .incidents
            .evaluate(&event.identity, &score, event.timestamp, &config.severity);

        self.audit
            .record(AuditEntry::for_event(decision.clone(), &score, &event));

        match decision.action {
            Action::Suppressed => {
                self.counters.incr(Counter::AlertsSuppressed);
                log::debug!("{} alert for {} suppressed (cooldown)", decision.severity, decision.identity);
            }
            Action::Alert | Action::DegradedAlert => {
                let incident_id = self
                    .incidents
                    .get(&event.identity)
                    .and_then(|s| s.incident_id);
                let alert = AlertRecord::new(&decision, &score, &event, incident_id);
                self.emitter.enqueue(alert);
            }
            Action::NoAlert => {}
        }

        let elapsed_ms = queued_ms + started.elapsed().as_millis() as u64;
        missed |= elapsed_ms > budget_ms;
        if missed {
            self.counters.incr(Counter::DeadlineExceeded);
            let err = EngineError::DeadlineExceeded {
                elapsed_ms,
                budget_ms,
                missing,
            };
            log::warn!("{} ({}), scored partially", err, decision.identity);
        }
        self.degradation.note_event(missed, Utc::now());

        self.counters.incr(Counter::EventsProcessed);
        Some(decision)
    }

    /// Periodic maintenance: degradation recovery, idle severity decay,
    /// ephemeral track expiry
    ///
    /// `wall_now` drives the load controller directly. Severity decay and
    /// track expiry map it onto each identity's event timeline.
    pub fn sweep(&self, wall_now: DateTime<Utc>) {
        let config = self.config();
        let level = self.degradation.tick(wall_now);

        for decision in self.incidents.decay_idle(wall_now, &config.severity, level) {
            log::info!("{} decayed {} -> {}", decision.identity, decision.previous, decision.severity);
            self.audit.record(AuditEntry::standalone(decision));
        }

        let ttl = chrono::Duration::seconds(config.identity.ephemeral_ttl_secs as i64);
        let expired = self.baselines.expire_ephemeral(wall_now, ttl);
        if expired > 0 {
            self.counters.add(Counter::EphemeralExpired, expired as u64);
            log::debug!("Expired {} ephemeral tracks", expired);
        }
    }
}

/// Signals whose analyzer answered after the deadline count as not received
fn apply_deadline(event: &mut AnalysisEvent, budget_ms: u64) -> Vec<SignalKind> {
    let mut missing = Vec::new();
    for signal in event.signals.iter_mut() {
        if signal.latency_ms.map_or(false, |l| l > budget_ms) {
            missing.push(signal.kind);
            *signal = signal.clone().into_unknown();
        }
    }
    missing
}

// ============================================================================
// WORKER POOL
// ============================================================================

struct Job {
    event: AnalysisEvent,
    enqueued_at: Instant,
}

pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl WorkerPool {
    /// Spawn one worker per shard on the current tokio runtime
    pub fn spawn(pipeline: Arc<Pipeline>, shards: usize, capacity: usize) -> Self {
        let shards = shards.max(1);
        let capacity = capacity.max(1);
        let mut senders = Vec::with_capacity(shards);
        let mut handles = Vec::with_capacity(shards);

        for shard in 0..shards {
            let (tx, mut rx) = mpsc::channel::<Job>(capacity);
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                log::debug!("Worker {} started", shard);
                while let Some(job) = rx.recv().await {
                    pipeline.process(job.event, job.enqueued_at.elapsed());
                }
                log::debug!("Worker {} stopped", shard);
            }));
            senders.push(tx);
        }

        log::info!("Analysis workers started ({} shards, queue {})", shards, capacity);
        Self { senders, handles, capacity }
    }

    pub fn shards(&self) -> usize {
        self.senders.len()
    }

    /// Non-blocking hand-off to the identity's shard
    pub fn dispatch(&self, event: AnalysisEvent) -> Result<usize> {
        let shard = event.identity.partition(self.senders.len());
        let job = Job {
            event,
            enqueued_at: Instant::now(),
        };
        self.senders[shard]
            .try_send(job)
            .map_err(|_| EngineError::QueueFull { shard })?;
        Ok(shard)
    }

    /// Fill ratio of the fullest shard queue
    pub fn queue_utilization(&self) -> f32 {
        self.senders
            .iter()
            .map(|tx| 1.0 - tx.capacity() as f32 / self.capacity as f32)
            .fold(0.0f32, f32::max)
    }

    /// Close the queues and wait for the workers to drain them
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            if let Err(e) = handle.await {
                log::error!("Worker task failed: {}", e);
            }
        }
    }
}

// ============================================================================
// SWEEPER
// ============================================================================

pub fn spawn_sweeper(pipeline: Arc<Pipeline>, every: Duration, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = every.max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => pipeline.sweep(Utc::now()),
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        log::debug!("Sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::DegradationConfig;
    use crate::logic::identity::IdentityKey;
    use crate::logic::policy::{Severity, Transition};
    use crate::logic::response::{EmitterSettings, MemorySink};
    use crate::logic::signal::{SignalDetail, SignalResult, Verdict};
    use chrono::TimeZone;

    fn pipeline() -> (Arc<Pipeline>, Arc<MemorySink>) {
        pipeline_with(EngineConfig::default())
    }

    fn pipeline_with(config: EngineConfig) -> (Arc<Pipeline>, Arc<MemorySink>) {
        let config = Arc::new(config);
        let counters = Arc::new(Counters::new());
        let degradation = Arc::new(DegradationController::new(
            DegradationConfig::default(),
            config.runtime.deadline_ms,
        ));
        let sink = Arc::new(MemorySink::new());
        let emitter = Arc::new(AlertEmitter::new(
            EmitterSettings::from(&config.runtime),
            sink.clone(),
            counters.clone(),
            degradation.clone(),
        ));
        let pipeline = Pipeline::new(config, degradation, emitter, AuditLog::in_memory(100), counters);
        (Arc::new(pipeline), sink)
    }

    fn badge(verdict: Verdict, latency_ms: Option<u64>, at: DateTime<Utc>) -> SignalResult {
        SignalResult {
            kind: SignalKind::Badge,
            confidence: 0.95,
            verdict,
            detail: SignalDetail::Badge { holder_id: None, badge_id: None },
            timestamp: at,
            camera_id: "cam-1".to_string(),
            latency_ms,
            confidence_clamped: false,
        }
    }

    fn event(id: &str, minute: i64, signals: Vec<SignalResult>) -> AnalysisEvent {
        AnalysisEvent {
            identity: IdentityKey::employee(id),
            signals,
            camera_id: "cam-1".to_string(),
            area_id: "lobby".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap() + chrono::Duration::minutes(minute),
        }
    }

    #[test]
    fn test_replay_is_skipped() {
        let (p, _) = pipeline();
        let ev = event("E1", 0, vec![]);
        assert!(p.process(ev.clone(), Duration::ZERO).is_some());
        assert!(p.process(ev, Duration::ZERO).is_none());
        assert_eq!(p.counters.get(Counter::DuplicateEvents), 1);
        assert_eq!(p.counters.get(Counter::EventsProcessed), 1);
    }

    #[test]
    fn test_late_analyzer_treated_as_unknown() {
        let (p, _) = pipeline();
        let at = event("E1", 0, vec![]).timestamp;
        // a late Fail must not trip the missing-badge floor
        let ev = event("E1", 0, vec![badge(Verdict::Fail, Some(500), at)]);
        let decision = p.process(ev, Duration::ZERO).unwrap();
        assert_eq!(decision.severity, Severity::None);
        assert_eq!(p.counters.get(Counter::DeadlineExceeded), 1);
    }

    #[test]
    fn test_badge_fail_raises_and_audits() {
        let (p, _) = pipeline();
        let at = event("E1", 0, vec![]).timestamp;
        let decision = p
            .process(event("E1", 0, vec![badge(Verdict::Fail, Some(20), at)]), Duration::ZERO)
            .unwrap();
        assert!(decision.severity >= Severity::Low);
        assert_eq!(p.audit.len(), 1);
        assert!(p.incidents.get(&IdentityKey::employee("E1")).is_some());
    }

    #[test]
    fn test_queue_wait_counts_as_miss() {
        let (p, _) = pipeline();
        p.process(event("E1", 0, vec![]), Duration::from_millis(900));
        assert_eq!(p.counters.get(Counter::DeadlineExceeded), 1);
        assert!(p.degradation.pressure() > 0.0);
    }

    #[tokio::test]
    async fn test_pool_routes_by_identity_and_drains() {
        let (p, _) = pipeline();
        let pool = WorkerPool::spawn(p.clone(), 4, 16);
        let first = pool.dispatch(event("E7", 0, vec![])).unwrap();
        let second = pool.dispatch(event("E7", 5, vec![])).unwrap();
        assert_eq!(first, second);

        pool.shutdown().await;
        assert_eq!(p.counters.get(Counter::EventsProcessed), 2);
        assert!(p.baselines.get(&IdentityKey::employee("E7")).is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_shard_rejects() {
        let (p, _) = pipeline();
        let pool = WorkerPool::spawn(p, 1, 1);
        // the worker cannot run until we yield, so the second send finds the queue full
        pool.dispatch(event("E1", 0, vec![])).unwrap();
        let err = pool.dispatch(event("E1", 1, vec![])).unwrap_err();
        assert!(matches!(err, EngineError::QueueFull { shard: 0 }));
        assert!(pool.queue_utilization() > 0.99);
        pool.shutdown().await;
    }

    fn low_alerts() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.severity.min_alert_severity = Severity::Low;
        config
    }

    #[test]
    fn test_sweep_between_lagging_events_keeps_level() {
        let (p, _) = pipeline_with(low_alerts());
        let e1 = IdentityKey::employee("E1");

        // footage from 2024 is fed while the sweeper runs on today's clock
        let mut actions = Vec::new();
        for minute in 0..5 {
            let at = event("E1", minute, vec![]).timestamp;
            let d = p
                .process(event("E1", minute, vec![badge(Verdict::Fail, Some(20), at)]), Duration::ZERO)
                .unwrap();
            actions.push(d.action);
            p.sweep(Utc::now());
            assert_eq!(p.incidents.get(&e1).unwrap().severity, Severity::Low);
        }

        assert_eq!(actions.iter().filter(|a| a.emits()).count(), 1);
        assert_eq!(p.counters.get(Counter::AlertsSuppressed), 4);
        // only the event decisions were audited, no decay in between
        assert_eq!(p.audit.len(), 5);
    }

    #[test]
    fn test_sweep_decays_after_cooldown_and_audits() {
        let (p, _) = pipeline_with(low_alerts());
        let e1 = IdentityKey::employee("E1");
        let at = event("E1", 0, vec![]).timestamp;
        p.process(event("E1", 0, vec![badge(Verdict::Fail, Some(20), at)]), Duration::ZERO);

        let wall = p.incidents.get(&e1).unwrap().last_processed;
        let cooldown = chrono::Duration::seconds(p.config().severity.cooldown_secs as i64);

        p.sweep(wall + cooldown - chrono::Duration::seconds(1));
        assert_eq!(p.audit.len(), 1);

        p.sweep(wall + cooldown);
        assert!(p.incidents.get(&e1).is_none());
        assert_eq!(p.audit.len(), 2);

        let entry = &p.audit.recent(1)[0];
        assert_eq!(entry.decision.transition, Transition::DeEscalated);
        assert_eq!(entry.decision.severity, Severity::None);
        assert_eq!(entry.decision.timestamp, at + cooldown);
        assert!(entry.camera_id.is_none());
    }

    #[test]
    fn test_sweep_expires_ephemeral_tracks() {
        let (p, _) = pipeline();
        let mut ev = event("E1", 0, vec![]);
        ev.identity = IdentityKey::Ephemeral("3f2a9c01d4e5b6a7".to_string());
        p.process(ev, Duration::ZERO);
        assert_eq!(p.baselines.ephemeral_count(), 1);

        let ttl = chrono::Duration::seconds(p.config().identity.ephemeral_ttl_secs as i64);
        p.sweep(Utc::now());
        assert_eq!(p.counters.get(Counter::EphemeralExpired), 0);

        p.sweep(Utc::now() + ttl + chrono::Duration::seconds(1));
        assert_eq!(p.counters.get(Counter::EphemeralExpired), 1);
        assert_eq!(p.baselines.ephemeral_count(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_runs_until_stopped() {
        let mut config = EngineConfig::default();
        config.identity.ephemeral_ttl_secs = 0;
        let (p, _) = pipeline_with(config);
        let mut ev = event("E1", 0, vec![]);
        ev.identity = IdentityKey::Ephemeral("3f2a9c01d4e5b6a7".to_string());
        p.process(ev, Duration::ZERO);

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = spawn_sweeper(p.clone(), Duration::from_millis(20), stop_rx);

        let expired = tokio::time::timeout(Duration::from_secs(5), async {
            while p.counters.get(Counter::EphemeralExpired) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(expired.is_ok());
        assert_eq!(p.baselines.ephemeral_count(), 0);

        stop_tx.send(true).unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(5), handle).await.is_ok());
    }
}
