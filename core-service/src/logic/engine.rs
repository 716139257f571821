//! Engine - public handle
//!
//! Wires normalizer, resolver, worker pool, emitter and sweeper together and
//! exposes the inbound interface (`submit`, `report_load`) plus the
//! operational queries used by the command protocol.
//!
//! ## Usage
//! ```ignore
//! let engine = Engine::start(EngineConfig::from_env()?, Arc::new(MemorySink::new()))?;
//! let identity = engine.submit(submission)?;
//! engine.flush(Duration::from_secs(1)).await;
//! let state = engine.get_alert_state(&identity);
//! engine.shutdown().await;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::logic::analysis_loop::{spawn_sweeper, Pipeline, WorkerPool};
use crate::logic::baseline::BaselineView;
use crate::logic::config::EngineConfig;
use crate::logic::degradation::{DegradationController, DegradationLevel, LoadMetrics};
use crate::logic::error::{EngineError, Result};
use crate::logic::events::{AnalysisEvent, UNKNOWN_AREA};
use crate::logic::identity::{EntityResolver, FrameContext, IdentityKey};
use crate::logic::incident::AlertState;
use crate::logic::response::{AlertEmitter, AlertSink, EmitterSettings};
use crate::logic::signal::{normalize_submission, AnalyzerSubmission, SignalKind};
use crate::logic::telemetry::{AuditEntry, AuditLog, Counter, CounterSnapshot, Counters};

/// Operational snapshot returned by `stats`
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub counters: CounterSnapshot,
    pub level: DegradationLevel,
    pub pressure: f32,
    pub queue_utilization: f32,
    pub active_alerts: usize,
    pub durable_baselines: usize,
    pub ephemeral_tracks: usize,
    pub pending_alerts: usize,
}

pub struct Engine {
    pipeline: Arc<Pipeline>,
    resolver: RwLock<EntityResolver>,
    pool: RwLock<Option<WorkerPool>>,
    emitter_task: Mutex<Option<JoinHandle<()>>>,
    sweeper_task: Mutex<Option<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
    watcher: Mutex<Option<notify::RecommendedWatcher>>,
}

impl Engine {
    /// Start workers, emitter and sweeper on the current tokio runtime
    pub fn start(config: EngineConfig, sink: Arc<dyn AlertSink>) -> Result<Arc<Self>> {
        config.validate()?;
        let config = Arc::new(config);
        let runtime = &config.runtime;

        let counters = Arc::new(Counters::new());
        let degradation = Arc::new(DegradationController::new(
            config.degradation.clone(),
            runtime.deadline_ms,
        ));
        let emitter = Arc::new(AlertEmitter::new(
            EmitterSettings::from(runtime),
            sink,
            counters.clone(),
            degradation.clone(),
        ));
        let audit = match &runtime.audit_dir {
            Some(dir) => AuditLog::with_dir(runtime.audit_memory, dir)?,
            None => AuditLog::in_memory(runtime.audit_memory),
        };

        let resolver = EntityResolver::from_config(&config.identity);
        let pipeline = Arc::new(Pipeline::new(
            config.clone(),
            degradation,
            emitter.clone(),
            audit,
            counters,
        ));

        let pool = WorkerPool::spawn(pipeline.clone(), runtime.workers, runtime.queue_capacity);
        let emitter_task = tokio::spawn(emitter.run());
        let (stop, stop_rx) = watch::channel(false);
        let sweeper_task = spawn_sweeper(
            pipeline.clone(),
            Duration::from_secs(runtime.sweep_interval_secs),
            stop_rx,
        );

        log::info!(
            "Engine started: {} workers, deadline {}ms, cooldown {}s",
            runtime.workers, runtime.deadline_ms, config.severity.cooldown_secs
        );

        Ok(Arc::new(Self {
            pipeline,
            resolver: RwLock::new(resolver),
            pool: RwLock::new(Some(pool)),
            emitter_task: Mutex::new(Some(emitter_task)),
            sweeper_task: Mutex::new(Some(sweeper_task)),
            stop,
            watcher: Mutex::new(None),
        }))
    }

    // ========================================================================
    // INBOUND
    // ========================================================================

    /// SubmitAnalyzerResults: normalize, resolve, and queue on the identity's shard
    pub fn submit(&self, submission: AnalyzerSubmission) -> Result<IdentityKey> {
        let counters = &self.pipeline.counters;
        let frame = match normalize_submission(&submission) {
            Ok(frame) => frame,
            Err(e) => {
                counters.incr(Counter::InvalidSignals);
                log::warn!("Rejected submission from {}: {}", submission.camera_id, e);
                return Err(e);
            }
        };

        let config = self.pipeline.config();
        let ctx = FrameContext {
            camera_id: frame.camera_id.clone(),
            timestamp: frame.timestamp,
        };
        let identity = self
            .resolver
            .read()
            .resolve(&ctx, frame.signal(SignalKind::Identity));

        let area_id = frame
            .area_id
            .clone()
            .or_else(|| config.area_for_camera(&frame.camera_id).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_AREA.to_string());
        let event = AnalysisEvent::from_frame(identity.clone(), frame, area_id);

        let pool = self.pool.read();
        let pool = pool.as_ref().ok_or(EngineError::QueueFull { shard: 0 })?;
        match pool.dispatch(event) {
            Ok(_) => {
                counters.incr(Counter::EventsSubmitted);
                Ok(identity)
            }
            Err(e) => {
                counters.incr(Counter::QueueRejected);
                log::warn!("{} ({})", e, identity);
                Err(e)
            }
        }
    }

    /// External load/health signal; own queue fill is folded in
    pub fn report_load(&self, metrics: LoadMetrics) -> DegradationLevel {
        let mut metrics = metrics;
        metrics.queue_utilization = metrics.queue_utilization.max(self.queue_utilization());
        self.pipeline.degradation.report(&metrics)
    }

    /// Wait until every accepted event has been processed (or skipped as a replay)
    pub async fn flush(&self, timeout: Duration) -> bool {
        let counters = &self.pipeline.counters;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let done = counters.get(Counter::EventsProcessed) + counters.get(Counter::DuplicateEvents);
            if done >= counters.get(Counter::EventsSubmitted) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn get_baseline(&self, identity: &IdentityKey) -> Option<BaselineView> {
        self.pipeline.baselines.get(identity)
    }

    pub fn get_alert_state(&self, identity: &IdentityKey) -> Option<AlertState> {
        self.pipeline.incidents.get(identity)
    }

    pub fn active_alerts(&self) -> Vec<AlertState> {
        self.pipeline.incidents.active()
    }

    /// Data-retention hook: forget everything held for an identity
    pub fn purge_identity(&self, identity: &IdentityKey) -> bool {
        let baseline = self.pipeline.baselines.purge(identity);
        let state = self.pipeline.incidents.purge(identity);
        if baseline {
            self.pipeline.counters.incr(Counter::BaselinesPurged);
        }
        if baseline || state {
            log::info!("Purged {}", identity);
        }
        baseline || state
    }

    pub fn current_level(&self) -> DegradationLevel {
        self.pipeline.degradation.current_level()
    }

    /// Pin the degradation level; `None` returns to automatic control
    pub fn force_level(&self, level: Option<DegradationLevel>) {
        match level {
            Some(l) => log::warn!("Degradation level forced to {}", l),
            None => log::info!("Degradation level back to automatic"),
        }
        self.pipeline.degradation.force(level);
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.pipeline.counters.snapshot()
    }

    pub fn recent_decisions(&self, limit: usize) -> Vec<AuditEntry> {
        self.pipeline.audit.recent(limit)
    }

    pub fn config(&self) -> Arc<EngineConfig> {
        self.pipeline.config()
    }

    pub fn stats(&self) -> EngineStats {
        let p = &self.pipeline;
        EngineStats {
            counters: p.counters.snapshot(),
            level: p.degradation.current_level(),
            pressure: p.degradation.pressure(),
            queue_utilization: self.queue_utilization(),
            active_alerts: p.incidents.len(),
            durable_baselines: p.baselines.durable_count(),
            ephemeral_tracks: p.baselines.ephemeral_count(),
            pending_alerts: p.emitter.pending(),
        }
    }

    fn queue_utilization(&self) -> f32 {
        self.pool
            .read()
            .as_ref()
            .map(WorkerPool::queue_utilization)
            .unwrap_or(0.0)
    }

    // ========================================================================
    // CONFIG RELOAD
    // ========================================================================

    /// Reload from `path`. On failure the last-known-good config stays active.
    pub fn reload_config(&self, path: &Path) -> Result<()> {
        let counters = &self.pipeline.counters;
        let config = match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                counters.incr(Counter::ConfigReloadFailures);
                log::warn!("Config reload failed, keeping previous config: {}", e);
                return Err(e);
            }
        };

        let current = self.pipeline.config();
        if current.runtime.workers != config.runtime.workers
            || current.runtime.queue_capacity != config.runtime.queue_capacity
            || current.baseline.partitions != config.baseline.partitions
        {
            log::warn!("Worker, queue and partition sizes only change on restart");
        }

        *self.resolver.write() = EntityResolver::from_config(&config.identity);
        self.pipeline.set_config(Arc::new(config));
        counters.incr(Counter::ConfigReloads);
        log::info!("Config reloaded from {}", path.display());
        Ok(())
    }

    /// Reload automatically whenever `path` changes on disk
    pub fn watch_config(self: &Arc<Self>, path: impl Into<PathBuf>) -> Result<()> {
        use notify::{RecursiveMode, Watcher};

        let path: PathBuf = path.into();
        let file_name = path.file_name().map(|n| n.to_os_string());
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let relevant = matches!(event.kind, notify::EventKind::Create(_) | notify::EventKind::Modify(_))
                        && event.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        let _ = tx.send(());
                    }
                }
                Err(e) => log::warn!("Config watcher error: {}", e),
            }
        })
        .map_err(|e| EngineError::Config(format!("cannot create watcher: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| EngineError::Config(format!("cannot watch {}: {}", dir.display(), e)))?;

        let engine: Weak<Self> = Arc::downgrade(self);
        let mut stop = self.stop.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = rx.recv() => {
                        if changed.is_none() {
                            break;
                        }
                        // editors often write in several steps
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        while rx.try_recv().is_ok() {}
                        match engine.upgrade() {
                            Some(engine) => {
                                let _ = engine.reload_config(&path);
                            }
                            None => break,
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
        });

        *self.watcher.lock() = Some(watcher);
        log::info!("Watching config file for changes");
        Ok(())
    }

    // ========================================================================
    // SHUTDOWN
    // ========================================================================

    /// Drain queued events and alerts, then stop all tasks. Idempotent.
    pub async fn shutdown(&self) {
        self.watcher.lock().take();
        let _ = self.stop.send(true);

        let sweeper = self.sweeper_task.lock().take();
        if let Some(task) = sweeper {
            let _ = task.await;
        }

        let pool = self.pool.write().take();
        if let Some(pool) = pool {
            pool.shutdown().await;
        }

        self.pipeline.emitter.close();
        let emitter = self.emitter_task.lock().take();
        if let Some(task) = emitter {
            if let Err(e) = task.await {
                log::error!("Alert emitter task failed: {}", e);
            }
        }
        log::info!("Engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::policy::{Severity, Transition};
    use crate::logic::response::MemorySink;
    use crate::logic::signal::RawAnalyzerOutput;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.runtime.sweep_interval_secs = 3600;
        config.runtime.workers = 2;
        config
    }

    fn start() -> (Arc<Engine>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let engine = Engine::start(test_config(), sink.clone()).unwrap();
        (engine, sink)
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
    }

    fn raw(analyzer: &str, confidence: f64, verdict: &str, detail: serde_json::Value) -> RawAnalyzerOutput {
        RawAnalyzerOutput {
            analyzer: analyzer.to_string(),
            confidence: Some(confidence),
            verdict: Some(verdict.to_string()),
            detail,
            timestamp: None,
            latency_ms: Some(20),
        }
    }

    fn face(employee: &str) -> RawAnalyzerOutput {
        raw("face", 0.95, "pass", json!({"employee_id": employee}))
    }

    fn badge(holder: &str) -> RawAnalyzerOutput {
        raw("badge", 0.95, "pass", json!({"holder_id": holder}))
    }

    fn submission(area: &str, ts: DateTime<Utc>, results: Vec<RawAnalyzerOutput>) -> AnalyzerSubmission {
        AnalyzerSubmission {
            camera_id: format!("cam-{}", area),
            area_id: Some(area.to_string()),
            timestamp: ts,
            results,
        }
    }

    async fn wait_for_alerts(sink: &MemorySink, n: usize) {
        for _ in 0..500 {
            if sink.len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// One 08:55 lobby arrival per day for `days` days, starting March 1st
    async fn train(engine: &Engine, employee: &str, days: u32) {
        for day in 1..=days {
            engine
                .submit(submission("lobby", at(day, 8, 55), vec![face(employee), badge(employee)]))
                .unwrap();
        }
        assert!(engine.flush(WAIT).await);
    }

    #[tokio::test]
    async fn test_known_employee_badge_fail_without_baseline() {
        let (engine, sink) = start();
        let identity = engine
            .submit(submission(
                "lobby",
                at(1, 9, 0),
                vec![face("E1"), raw("badge", 0.9, "fail", json!({}))],
            ))
            .unwrap();
        assert_eq!(identity, IdentityKey::employee("E1"));
        assert!(engine.flush(WAIT).await);

        let state = engine.get_alert_state(&identity).unwrap();
        assert_eq!(state.severity, Severity::Low);

        let entry = &engine.recent_decisions(1)[0];
        let breakdown = entry.breakdown.as_ref().unwrap();
        assert_eq!(breakdown.temporal, 0.0);
        assert_eq!(breakdown.spatial, 0.0);
        assert!((breakdown.compliance - 1.0).abs() < 1e-6);

        // Low is below the emission threshold
        engine.shutdown().await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_person_in_restricted_area() {
        let (engine, sink) = start();
        let identity = engine
            .submit(submission(
                "server_room",
                at(1, 14, 0),
                vec![raw("face", 0.3, "unknown", json!({}))],
            ))
            .unwrap();
        assert!(!identity.is_durable());
        assert!(engine.flush(WAIT).await);

        match engine.get_baseline(&identity) {
            Some(BaselineView::Ephemeral(track)) => assert_eq!(track.sightings, 1),
            other => panic!("expected ephemeral track, got {:?}", other),
        }
        assert_eq!(engine.stats().durable_baselines, 0);

        let state = engine.get_alert_state(&identity).unwrap();
        assert_eq!(state.severity, Severity::Medium);
        wait_for_alerts(&sink, 1).await;
        assert_eq!(sink.alerts()[0].identity, identity);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_night_visit_to_server_room_escalates() {
        let (engine, sink) = start();
        train(&engine, "E5", 30).await;

        for minute in [40, 45, 50] {
            engine
                .submit(submission(
                    "server_room",
                    at(31, 23, minute),
                    vec![face("E5"), badge("E5"), raw("attire", 0.9, "fail", json!({"missing_items": ["helmet"]}))],
                ))
                .unwrap();
        }
        assert!(engine.flush(WAIT).await);

        let identity = IdentityKey::employee("E5");
        let state = engine.get_alert_state(&identity).unwrap();
        assert!(state.severity >= Severity::High, "severity {}", state.severity);
        assert!(state.incident_id.is_some());

        let oldest = engine.recent_decisions(3).pop().unwrap();
        let breakdown = oldest.breakdown.unwrap();
        assert!(breakdown.temporal > 0.9);
        assert!(breakdown.spatial > 0.9);

        wait_for_alerts(&sink, 1).await;
        assert!(sink.alerts()[0].severity >= Severity::High);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_forced_l2_keeps_elevated_severity() {
        let (engine, sink) = start();
        train(&engine, "E9", 6).await;
        let identity = IdentityKey::employee("E9");

        // face/badge mismatch at night: Medium via static floor
        engine
            .submit(submission("lobby", at(7, 23, 40), vec![face("E9"), badge("E4")]))
            .unwrap();
        assert!(engine.flush(WAIT).await);
        assert_eq!(engine.get_alert_state(&identity).unwrap().severity, Severity::Medium);
        let before = engine.recent_decisions(1)[0].breakdown.clone().unwrap();
        assert!(before.temporal > 0.5);

        engine.force_level(Some(DegradationLevel::L2));
        engine
            .submit(submission("lobby", at(7, 23, 45), vec![face("E9"), badge("E9")]))
            .unwrap();
        assert!(engine.flush(WAIT).await);

        let entry = &engine.recent_decisions(1)[0];
        let after = entry.breakdown.as_ref().unwrap();
        assert_eq!(after.temporal, 0.0);
        assert_eq!(after.spatial, 0.0);
        assert_eq!(entry.decision.level, DegradationLevel::L2);
        assert_eq!(entry.decision.transition, Transition::Unchanged);
        assert_eq!(engine.get_alert_state(&identity).unwrap().severity, Severity::Medium);

        wait_for_alerts(&sink, 1).await;
        engine.shutdown().await;
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_mandatory_violation_under_l3() {
        let (engine, _) = start();
        engine.force_level(Some(DegradationLevel::L3));
        let identity = engine
            .submit(submission(
                "lobby",
                at(2, 10, 0),
                vec![
                    face("E2"),
                    raw("badge", 0.9, "fail", json!({})),
                    raw("attire", 0.9, "fail", json!({"missing_items": ["vest"]})),
                ],
            ))
            .unwrap();
        assert!(engine.flush(WAIT).await);
        assert!(engine.get_alert_state(&identity).unwrap().severity >= Severity::Low);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_replayed_submission_counted_once() {
        let (engine, _) = start();
        let sub = submission("lobby", at(3, 9, 0), vec![face("E3"), badge("E3")]);
        engine.submit(sub.clone()).unwrap();
        engine.submit(sub).unwrap();
        assert!(engine.flush(WAIT).await);

        let stats = engine.counters();
        assert_eq!(stats.events_processed, 1);
        assert_eq!(stats.duplicate_events, 1);
        match engine.get_baseline(&IdentityKey::employee("E3")) {
            Some(BaselineView::Durable(b)) => assert_eq!(b.observations, 1),
            other => panic!("expected durable baseline, got {:?}", other),
        }
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_submission_rejected() {
        let (engine, _) = start();
        let err = engine
            .submit(submission("lobby", at(1, 9, 0), vec![raw("sonar", 0.9, "pass", json!({}))]))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_signal");
        assert_eq!(engine.counters().invalid_signals, 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_area_from_camera_map() {
        let mut config = test_config();
        config.camera_areas.insert("cam-7".to_string(), "finance".to_string());
        let engine = Engine::start(config, Arc::new(MemorySink::new())).unwrap();

        let mut sub = submission("ignored", at(1, 9, 0), vec![face("E8"), badge("E8")]);
        sub.camera_id = "cam-7".to_string();
        sub.area_id = None;
        engine.submit(sub).unwrap();
        assert!(engine.flush(WAIT).await);

        let entry = &engine.recent_decisions(1)[0];
        assert_eq!(entry.area_id.as_deref(), Some("finance"));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_purge_identity() {
        let (engine, _) = start();
        let identity = engine
            .submit(submission("server_room", at(1, 9, 0), vec![face("E6"), badge("E6")]))
            .unwrap();
        assert!(engine.flush(WAIT).await);
        assert!(engine.get_alert_state(&identity).is_some());

        assert!(engine.purge_identity(&identity));
        assert!(engine.get_baseline(&identity).is_none());
        assert!(engine.get_alert_state(&identity).is_none());
        assert_eq!(engine.counters().baselines_purged, 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_keeps_last_known_good() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        let (engine, _) = start();

        let mut updated = test_config();
        updated.severity.cooldown_secs = 120;
        updated.save(&path).unwrap();
        engine.reload_config(&path).unwrap();
        assert_eq!(engine.config().severity.cooldown_secs, 120);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(engine.reload_config(&path).is_err());
        assert_eq!(engine.config().severity.cooldown_secs, 120);

        let stats = engine.counters();
        assert_eq!(stats.config_reloads, 1);
        assert_eq!(stats.config_reload_failures, 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_updates_load_deadline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        let (engine, _) = start();

        let mut updated = test_config();
        updated.runtime.deadline_ms = 400;
        updated.save(&path).unwrap();
        engine.reload_config(&path).unwrap();
        assert_eq!(engine.pipeline.degradation.deadline_ms(), 400);

        // 180ms against a 400ms budget is no longer pressure
        let level = engine.report_load(LoadMetrics { processing_latency_ms: 180, ..Default::default() });
        assert_eq!(level, DegradationLevel::Normal);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_watch_config_reloads_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        test_config().save(&path).unwrap();

        let (engine, _) = start();
        engine.watch_config(path.clone()).unwrap();

        // write elsewhere and rename so the watcher never sees a partial file
        let mut updated = test_config();
        updated.severity.cooldown_secs = 45;
        let staged = dir.path().join("engine.json.new");
        updated.save(&staged).unwrap();
        std::fs::rename(&staged, &path).unwrap();

        let reloaded = tokio::time::timeout(WAIT, async {
            while engine.config().severity.cooldown_secs != 45 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(reloaded.is_ok());
        assert!(engine.counters().config_reloads >= 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let (engine, _) = start();
        engine.shutdown().await;
        let err = engine
            .submit(submission("lobby", at(1, 9, 0), vec![face("E1")]))
            .unwrap_err();
        assert_eq!(err.kind(), "queue_full");
    }
}
