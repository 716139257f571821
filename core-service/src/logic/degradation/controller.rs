//! Degradation Controller
//!
//! Escalates immediately when pressure crosses a level threshold and
//! recovers one level at a time after pressure has stayed below the
//! current level for the whole recovery window.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};

use super::types::{DegradationLevel, LoadMetrics};
use crate::logic::config::DegradationConfig;

/// Smoothing factor for the internal deadline-miss rate
const MISS_ALPHA: f32 = 0.1;

#[derive(Debug, Default)]
struct ControllerState {
    /// Last externally reported pressure
    reported: f32,
    /// EWMA of deadline misses observed by the workers
    miss_rate: f32,
    /// Time of the last miss-rate sample or decay
    miss_updated: Option<DateTime<Utc>>,
    /// Start of the current below-threshold stretch
    calm_since: Option<DateTime<Utc>>,
    /// Operator pin; automatic transitions are suspended while set
    forced: Option<DegradationLevel>,
}

pub struct DegradationController {
    level: AtomicU8,
    state: Mutex<ControllerState>,
    config: RwLock<DegradationConfig>,
    /// Latency budget that reported processing latency is measured against
    deadline_ms: AtomicU64,
}

impl DegradationController {
    pub fn new(config: DegradationConfig, deadline_ms: u64) -> Self {
        Self {
            level: AtomicU8::new(DegradationLevel::Normal.as_u8()),
            state: Mutex::new(ControllerState::default()),
            config: RwLock::new(config),
            deadline_ms: AtomicU64::new(deadline_ms),
        }
    }

    pub fn current_level(&self) -> DegradationLevel {
        DegradationLevel::from_u8(self.level.load(Ordering::Acquire))
    }

    /// Current combined pressure in [0,1]
    pub fn pressure(&self) -> f32 {
        let state = self.state.lock();
        state.reported.max(state.miss_rate)
    }

    pub fn set_config(&self, config: DegradationConfig, deadline_ms: u64) {
        *self.config.write() = config;
        self.deadline_ms.store(deadline_ms, Ordering::Release);
    }

    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms.load(Ordering::Acquire)
    }

    /// External load/health signal
    pub fn report(&self, metrics: &LoadMetrics) -> DegradationLevel {
        self.report_at(metrics, Utc::now())
    }

    pub fn report_at(&self, metrics: &LoadMetrics, now: DateTime<Utc>) -> DegradationLevel {
        let mut state = self.state.lock();
        state.reported = metrics.pressure(self.deadline_ms());
        self.evaluate(&mut state, now)
    }

    /// Feed one processed event's deadline outcome into the miss rate
    pub fn note_event(&self, deadline_missed: bool, now: DateTime<Utc>) -> DegradationLevel {
        let mut state = self.state.lock();
        let sample = if deadline_missed { 1.0 } else { 0.0 };
        state.miss_rate = state.miss_rate * (1.0 - MISS_ALPHA) + sample * MISS_ALPHA;
        state.miss_updated = Some(now);
        self.evaluate(&mut state, now)
    }

    /// Re-evaluate recovery without new input (driven by the sweeper).
    /// Idle time counts as on-time samples, one per second, so the miss
    /// rate fades once events stop arriving.
    pub fn tick(&self, now: DateTime<Utc>) -> DegradationLevel {
        let mut state = self.state.lock();
        if let Some(last) = state.miss_updated {
            let idle = (now - last).num_seconds();
            if idle > 0 {
                let samples = idle.min(i32::MAX as i64) as i32;
                state.miss_rate *= (1.0 - MISS_ALPHA).powi(samples);
                state.miss_updated = Some(now);
            }
        }
        self.evaluate(&mut state, now)
    }

    /// Pin the level (operator override). `None` returns to automatic control.
    pub fn force(&self, level: Option<DegradationLevel>) {
        let mut state = self.state.lock();
        state.forced = level;
        state.calm_since = None;
        if let Some(level) = level {
            self.set_level(level, "forced");
        }
    }

    /// Raise to at least `level`; never lowers. Used when a Critical alert overflows.
    pub fn escalate_at_least(&self, level: DegradationLevel) {
        let mut state = self.state.lock();
        if state.forced.is_none() && self.current_level() < level {
            state.calm_since = None;
            self.set_level(level, "escalation request");
        }
    }

    fn evaluate(&self, state: &mut ControllerState, now: DateTime<Utc>) -> DegradationLevel {
        let current = self.current_level();
        if state.forced.is_some() {
            return current;
        }

        let config = self.config.read();
        let pressure = state.reported.max(state.miss_rate);
        let target = target_level(pressure, &config);

        if target > current {
            state.calm_since = None;
            self.set_level(target, "pressure");
            return target;
        }

        if target == current {
            state.calm_since = None;
            return current;
        }

        match state.calm_since {
            None => {
                state.calm_since = Some(now);
                current
            }
            Some(since) if now - since >= Duration::seconds(config.recovery_secs as i64) => {
                let next = current.step_down();
                // next step needs its own full window
                state.calm_since = if next > target { Some(now) } else { None };
                self.set_level(next, "recovery");
                next
            }
            Some(_) => current,
        }
    }

    fn set_level(&self, level: DegradationLevel, reason: &str) {
        let prev = DegradationLevel::from_u8(self.level.swap(level.as_u8(), Ordering::AcqRel));
        if prev != level {
            log::info!("Degradation level {} -> {} ({})", prev, level, reason);
        }
    }
}

/// Highest level whose pressure threshold is reached
pub fn target_level(pressure: f32, config: &DegradationConfig) -> DegradationLevel {
    if pressure >= config.l3_pressure {
        DegradationLevel::L3
    } else if pressure >= config.l2_pressure {
        DegradationLevel::L2
    } else if pressure >= config.l1_pressure {
        DegradationLevel::L1
    } else {
        DegradationLevel::Normal
    }
}
