//! Named counters
//!
//! Every drop, suppression or rejection increments one of these, so no
//! data loss is silent.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    EventsSubmitted,
    EventsProcessed,
    InvalidSignals,
    DeadlineExceeded,
    DuplicateEvents,
    QueueRejected,
    AlertsEmitted,
    AlertsSuppressed,
    AlertsDropped,
    EmitFailures,
    EmitRetries,
    BaselinesPurged,
    EphemeralExpired,
    ConfigReloads,
    ConfigReloadFailures,
}

#[derive(Debug, Default)]
pub struct Counters {
    events_submitted: AtomicU64,
    events_processed: AtomicU64,
    invalid_signals: AtomicU64,
    deadline_exceeded: AtomicU64,
    duplicate_events: AtomicU64,
    queue_rejected: AtomicU64,
    alerts_emitted: AtomicU64,
    alerts_suppressed: AtomicU64,
    alerts_dropped: AtomicU64,
    emit_failures: AtomicU64,
    emit_retries: AtomicU64,
    baselines_purged: AtomicU64,
    ephemeral_expired: AtomicU64,
    config_reloads: AtomicU64,
    config_reload_failures: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::EventsSubmitted => &self.events_submitted,
            Counter::EventsProcessed => &self.events_processed,
            Counter::InvalidSignals => &self.invalid_signals,
            Counter::DeadlineExceeded => &self.deadline_exceeded,
            Counter::DuplicateEvents => &self.duplicate_events,
            Counter::QueueRejected => &self.queue_rejected,
            Counter::AlertsEmitted => &self.alerts_emitted,
            Counter::AlertsSuppressed => &self.alerts_suppressed,
            Counter::AlertsDropped => &self.alerts_dropped,
            Counter::EmitFailures => &self.emit_failures,
            Counter::EmitRetries => &self.emit_retries,
            Counter::BaselinesPurged => &self.baselines_purged,
            Counter::EphemeralExpired => &self.ephemeral_expired,
            Counter::ConfigReloads => &self.config_reloads,
            Counter::ConfigReloadFailures => &self.config_reload_failures,
        }
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.slot(counter).fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            events_submitted: self.get(Counter::EventsSubmitted),
            events_processed: self.get(Counter::EventsProcessed),
            invalid_signals: self.get(Counter::InvalidSignals),
            deadline_exceeded: self.get(Counter::DeadlineExceeded),
            duplicate_events: self.get(Counter::DuplicateEvents),
            queue_rejected: self.get(Counter::QueueRejected),
            alerts_emitted: self.get(Counter::AlertsEmitted),
            alerts_suppressed: self.get(Counter::AlertsSuppressed),
            alerts_dropped: self.get(Counter::AlertsDropped),
            emit_failures: self.get(Counter::EmitFailures),
            emit_retries: self.get(Counter::EmitRetries),
            baselines_purged: self.get(Counter::BaselinesPurged),
            ephemeral_expired: self.get(Counter::EphemeralExpired),
            config_reloads: self.get(Counter::ConfigReloads),
            config_reload_failures: self.get(Counter::ConfigReloadFailures),
        }
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub events_submitted: u64,
    pub events_processed: u64,
    pub invalid_signals: u64,
    pub deadline_exceeded: u64,
    pub duplicate_events: u64,
    pub queue_rejected: u64,
    pub alerts_emitted: u64,
    pub alerts_suppressed: u64,
    pub alerts_dropped: u64,
    pub emit_failures: u64,
    pub emit_retries: u64,
    pub baselines_purged: u64,
    pub ephemeral_expired: u64,
    pub config_reloads: u64,
    pub config_reload_failures: u64,
}
