//! Alert Emitter
//!
//! Bounded outbound buffer between the workers and the alert sink.
//! `enqueue` never blocks: when the buffer is full the oldest non-critical
//! alert is dropped and counted. Critical alerts are never dropped; they may
//! overflow the buffer and push the degradation level up to at least L1.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::Notify;

use super::sink::AlertSink;
use super::types::AlertRecord;
use crate::logic::config::RuntimeConfig;
use crate::logic::degradation::{DegradationController, DegradationLevel};
use crate::logic::telemetry::{Counter, Counters};

#[derive(Debug, Clone)]
pub struct EmitterSettings {
    pub capacity: usize,
    /// Delivery attempts for Critical alerts; everything else gets one
    pub critical_max_attempts: u32,
    pub retry_base: Duration,
}

impl From<&RuntimeConfig> for EmitterSettings {
    fn from(r: &RuntimeConfig) -> Self {
        Self {
            capacity: r.alert_buffer.max(1),
            critical_max_attempts: r.critical_max_attempts.max(1),
            retry_base: Duration::from_millis(r.retry_base_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Buffer was full; the oldest non-critical alert made room
    DroppedOldest,
    /// Buffer was full of critical alerts; the incoming non-critical one was dropped
    DroppedIncoming,
    /// Critical alert queued beyond capacity
    Overflow,
}

pub struct AlertEmitter {
    buffer: Mutex<VecDeque<AlertRecord>>,
    settings: EmitterSettings,
    notify: Notify,
    closed: AtomicBool,
    sink: Arc<dyn AlertSink>,
    counters: Arc<Counters>,
    degradation: Arc<DegradationController>,
}

impl AlertEmitter {
    pub fn new(
        settings: EmitterSettings,
        sink: Arc<dyn AlertSink>,
        counters: Arc<Counters>,
        degradation: Arc<DegradationController>,
    ) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(settings.capacity)),
            settings,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            sink,
            counters,
            degradation,
        }
    }

    /// Non-blocking hand-off from a worker
    pub fn enqueue(&self, alert: AlertRecord) -> EnqueueOutcome {
        let outcome = {
            let mut buffer = self.buffer.lock();
            if buffer.len() < self.settings.capacity {
                buffer.push_back(alert);
                EnqueueOutcome::Queued
            } else if let Some(pos) = buffer.iter().position(|a| !a.is_critical()) {
                if let Some(dropped) = buffer.remove(pos) {
                    log::warn!(
                        "Alert buffer full, dropped {} alert for {}",
                        dropped.severity, dropped.identity
                    );
                }
                self.counters.incr(Counter::AlertsDropped);
                buffer.push_back(alert);
                EnqueueOutcome::DroppedOldest
            } else if alert.is_critical() {
                buffer.push_back(alert);
                EnqueueOutcome::Overflow
            } else {
                log::warn!("Alert buffer full of critical alerts, dropped {} alert for {}", alert.severity, alert.identity);
                self.counters.incr(Counter::AlertsDropped);
                EnqueueOutcome::DroppedIncoming
            }
        };

        if outcome == EnqueueOutcome::Overflow {
            log::warn!("Critical alert overflowed the buffer, requesting degradation");
            self.degradation.escalate_at_least(DegradationLevel::L1);
        }
        if outcome != EnqueueOutcome::DroppedIncoming {
            self.notify.notify_one();
        }
        outcome
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Stop accepting wake-ups; `run` drains what is queued and returns
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Delivery loop; spawn once per emitter
    pub async fn run(self: Arc<Self>) {
        log::info!("Alert emitter started (sink: {})", self.sink.name());
        loop {
            let next = self.buffer.lock().pop_front();
            match next {
                Some(alert) => self.deliver(alert).await,
                None => {
                    if self.closed.load(Ordering::Acquire) {
                        break;
                    }
                    self.notify.notified().await;
                }
            }
        }
        log::info!("Alert emitter stopped");
    }

    async fn deliver(&self, alert: AlertRecord) {
        let attempts = if alert.is_critical() {
            self.settings.critical_max_attempts
        } else {
            1
        };

        for attempt in 1..=attempts {
            match self.sink.deliver(&alert) {
                Ok(()) => {
                    self.counters.incr(Counter::AlertsEmitted);
                    log::info!("Alert {} emitted: {}", alert.alert_id, alert.title);
                    return;
                }
                Err(e) if attempt < attempts => {
                    self.counters.incr(Counter::EmitRetries);
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "Critical alert {} delivery failed (attempt {}/{}): {}, retrying in {:?}",
                        alert.alert_id, attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.counters.incr(Counter::EmitFailures);
                    if alert.is_critical() {
                        log::error!("Critical alert {} lost after {} attempts: {}", alert.alert_id, attempts, e);
                    } else {
                        self.counters.incr(Counter::AlertsDropped);
                        log::warn!("{} alert {} dropped: {}", alert.severity, alert.alert_id, e);
                    }
                }
            }
        }
    }

    /// Exponential backoff with up to 50% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.settings.retry_base.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << (attempt - 1).min(16));
        let jitter = if base > 1 {
            rand::thread_rng().gen_range(0..=base / 2)
        } else {
            0
        };
        Duration::from_millis(exp + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::anomaly::{AnomalyScore, ScoreBreakdown};
    use crate::logic::config::DegradationConfig;
    use crate::logic::events::AnalysisEvent;
    use crate::logic::identity::IdentityKey;
    use crate::logic::policy::{Action, Decision, Severity, Transition};
    use crate::logic::response::sink::MemorySink;
    use chrono::Utc;

    fn alert(id: &str, severity: Severity) -> AlertRecord {
        let identity = IdentityKey::employee(id);
        let event = AnalysisEvent {
            identity: identity.clone(),
            signals: vec![],
            camera_id: "cam-1".to_string(),
            area_id: "lobby".to_string(),
            timestamp: Utc::now(),
        };
        let score = AnomalyScore {
            score: 0.9,
            breakdown: ScoreBreakdown::default(),
            flags: vec![],
            floor_hit: true,
            cold_start: false,
            level: DegradationLevel::Normal,
            reasons: vec![],
        };
        let decision = Decision {
            identity,
            timestamp: event.timestamp,
            previous: Severity::None,
            severity,
            transition: Transition::Escalated,
            action: Action::Alert,
            score: Some(0.9),
            confirmed: true,
            level: DegradationLevel::Normal,
            reasons: vec![],
        };
        AlertRecord::new(&decision, &score, &event, None)
    }

    fn emitter(capacity: usize, sink: Arc<MemorySink>) -> (Arc<AlertEmitter>, Arc<Counters>, Arc<DegradationController>) {
        let counters = Arc::new(Counters::new());
        let degradation = Arc::new(DegradationController::new(DegradationConfig::default(), 200));
        let settings = EmitterSettings {
            capacity,
            critical_max_attempts: 4,
            retry_base: Duration::from_millis(1),
        };
        let emitter = Arc::new(AlertEmitter::new(settings, sink, counters.clone(), degradation.clone()));
        (emitter, counters, degradation)
    }

    #[test]
    fn test_full_buffer_drops_oldest_non_critical() {
        let (em, counters, _) = emitter(2, Arc::new(MemorySink::new()));
        em.enqueue(alert("A", Severity::Medium));
        em.enqueue(alert("B", Severity::Critical));
        assert_eq!(em.enqueue(alert("C", Severity::High)), EnqueueOutcome::DroppedOldest);
        assert_eq!(em.pending(), 2);
        assert_eq!(counters.get(Counter::AlertsDropped), 1);

        let ids: Vec<IdentityKey> = em.buffer.lock().iter().map(|a| a.identity.clone()).collect();
        assert_eq!(ids, vec![IdentityKey::employee("B"), IdentityKey::employee("C")]);
    }

    #[test]
    fn test_critical_never_dropped() {
        let (em, counters, degradation) = emitter(1, Arc::new(MemorySink::new()));
        em.enqueue(alert("A", Severity::Critical));
        assert_eq!(em.enqueue(alert("B", Severity::Critical)), EnqueueOutcome::Overflow);
        assert_eq!(em.pending(), 2);
        assert!(degradation.current_level() >= DegradationLevel::L1);

        assert_eq!(em.enqueue(alert("C", Severity::Medium)), EnqueueOutcome::DroppedIncoming);
        assert_eq!(counters.get(Counter::AlertsDropped), 1);
    }

    #[tokio::test]
    async fn test_run_delivers_and_drains_on_close() {
        let sink = Arc::new(MemorySink::new());
        let (em, counters, _) = emitter(8, sink.clone());
        em.enqueue(alert("A", Severity::Medium));
        em.enqueue(alert("B", Severity::High));
        em.close();

        em.clone().run().await;
        assert_eq!(sink.len(), 2);
        assert_eq!(counters.get(Counter::AlertsEmitted), 2);
    }

    #[tokio::test]
    async fn test_critical_retried_with_backoff() {
        let sink = Arc::new(MemorySink::new());
        sink.fail_next(2);
        let (em, counters, _) = emitter(8, sink.clone());
        em.enqueue(alert("A", Severity::Critical));
        em.close();

        em.clone().run().await;
        assert_eq!(sink.len(), 1);
        assert_eq!(counters.get(Counter::EmitRetries), 2);
        assert_eq!(counters.get(Counter::EmitFailures), 0);
    }

    #[tokio::test]
    async fn test_non_critical_is_best_effort() {
        let sink = Arc::new(MemorySink::new());
        sink.fail_next(1);
        let (em, counters, _) = emitter(8, sink.clone());
        em.enqueue(alert("A", Severity::High));
        em.close();

        em.clone().run().await;
        assert!(sink.is_empty());
        assert_eq!(counters.get(Counter::EmitFailures), 1);
        assert_eq!(counters.get(Counter::AlertsDropped), 1);
    }
}
