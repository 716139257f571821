use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::config::BaselineConfig;
use crate::logic::events::{event_clock, AnalysisEvent};
use crate::logic::signal::{SignalKind, Verdict};

/// A gap longer than this between two sightings in the same area starts a new visit
pub const VISIT_GAP_MINUTES: i64 = 30;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Weight multiplier for the time elapsed between `from` and `to`.
/// Out-of-order (negative) gaps do not decay.
pub fn decay_factor(lambda_per_day: f64, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let dt_days = ((to - from).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0);
    (-lambda_per_day * dt_days).exp()
}

// ============================================================================
// DECAYING STATISTICS
// ============================================================================

/// Exponentially forgotten mean/variance (weighted Welford).
///
/// Before each observation the accumulated weight and M2 are multiplied by
/// `exp(-λ·Δt)`, so old observations lose influence smoothly instead of
/// dropping out of a hard window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayingStats {
    pub mean: f64,
    pub m2: f64,
    /// Effective (decayed) number of observations at `last_update`
    pub weight: f64,
    /// Raw observation count, never decayed
    pub count: u64,
    pub last_update: Option<DateTime<Utc>>,
}

impl DecayingStats {
    pub fn observe(&mut self, x: f64, at: DateTime<Utc>, lambda_per_day: f64) {
        if let Some(prev) = self.last_update {
            let f = decay_factor(lambda_per_day, prev, at);
            self.weight *= f;
            self.m2 *= f;
        }
        self.weight += 1.0;
        self.count += 1;

        let delta = x - self.mean;
        self.mean += delta / self.weight;
        self.m2 += delta * (x - self.mean);

        self.last_update = Some(self.last_update.map_or(at, |prev| prev.max(at)));
    }

    pub fn variance(&self) -> f64 {
        if self.weight > 0.0 {
            (self.m2 / self.weight).max(0.0)
        } else {
            0.0
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Decayed weight as seen from `now`
    pub fn weight_at(&self, now: DateTime<Utc>, lambda_per_day: f64) -> f64 {
        match self.last_update {
            Some(prev) => self.weight * decay_factor(lambda_per_day, prev, now),
            None => 0.0,
        }
    }

    /// Mean and standard deviation blended with a prior pseudo-observation.
    /// The less recent evidence there is, the closer the result sits to the prior.
    pub fn blended(&self, now: DateTime<Utc>, lambda_per_day: f64, prior: &Prior) -> (f64, f64) {
        let w = self.weight_at(now, lambda_per_day);
        let pw = prior.weight.max(0.0);
        let total = w + pw;
        if total <= 0.0 {
            return (prior.mean, prior.std_dev);
        }

        let mean = (w * self.mean + pw * prior.mean) / total;
        let var = (w * (self.variance() + (self.mean - mean).powi(2))
            + pw * (prior.std_dev.powi(2) + (prior.mean - mean).powi(2)))
            / total;
        (mean, var.max(0.0).sqrt())
    }
}

/// Window-wide prior that unobserved statistics decay toward
#[derive(Debug, Clone, Copy)]
pub struct Prior {
    pub mean: f64,
    pub std_dev: f64,
    pub weight: f64,
}

impl Prior {
    pub fn arrival(config: &BaselineConfig) -> Self {
        Self {
            mean: config.arrival_prior_minutes,
            std_dev: config.prior_std_minutes,
            weight: config.prior_weight,
        }
    }

    pub fn departure(config: &BaselineConfig) -> Self {
        Self {
            mean: config.departure_prior_minutes,
            std_dev: config.prior_std_minutes,
            weight: config.prior_weight,
        }
    }
}

/// Exponentially forgotten event count
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayingCount {
    pub weight: f64,
    pub last_update: Option<DateTime<Utc>>,
}

impl DecayingCount {
    pub fn add(&mut self, amount: f64, at: DateTime<Utc>, lambda_per_day: f64) {
        if let Some(prev) = self.last_update {
            self.weight *= decay_factor(lambda_per_day, prev, at);
        }
        self.weight += amount;
        self.last_update = Some(self.last_update.map_or(at, |prev| prev.max(at)));
    }

    pub fn value_at(&self, now: DateTime<Utc>, lambda_per_day: f64) -> f64 {
        match self.last_update {
            Some(prev) => self.weight * decay_factor(lambda_per_day, prev, now),
            None => 0.0,
        }
    }
}

/// Exponentially forgotten Pass-rate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayingRate {
    pub passes: f64,
    pub total: f64,
    pub last_update: Option<DateTime<Utc>>,
}

impl DecayingRate {
    pub fn observe(&mut self, passed: bool, at: DateTime<Utc>, lambda_per_day: f64) {
        if let Some(prev) = self.last_update {
            let f = decay_factor(lambda_per_day, prev, at);
            self.passes *= f;
            self.total *= f;
        }
        self.total += 1.0;
        if passed {
            self.passes += 1.0;
        }
        self.last_update = Some(self.last_update.map_or(at, |prev| prev.max(at)));
    }

    /// Pass-rate in [0,1]; `None` before any decisive observation
    pub fn rate(&self) -> Option<f64> {
        if self.total > 0.0 {
            Some((self.passes / self.total).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

// ============================================================================
// LOCATIONS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationStats {
    pub visits: DecayingCount,
    pub visit_count: u64,
    pub last_seen: Option<DateTime<Utc>>,
    /// Completed dwell durations in minutes
    pub dwell_minutes: DecayingStats,
}

/// Area the identity is currently in, and since when
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentVisit {
    pub area_id: String,
    pub entered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

// ============================================================================
// REPLAY DETECTION
// ============================================================================

/// Bounded memory of recently applied (timestamp, camera) pairs
#[derive(Debug, Clone, Default)]
pub struct RecentEvents {
    items: VecDeque<(i64, String)>,
}

impl RecentEvents {
    pub fn contains(&self, ts_millis: i64, camera_id: &str) -> bool {
        self.items.iter().any(|(ts, cam)| *ts == ts_millis && cam == camera_id)
    }

    pub fn push(&mut self, ts_millis: i64, camera_id: &str, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.items.len() >= capacity {
            self.items.pop_front();
        }
        self.items.push_back((ts_millis, camera_id.to_string()));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// BEHAVIOR BASELINE (durable identities)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorBaseline {
    pub id: String,
    pub employee_id: String,
    /// Local minutes-of-day of the first sighting per day
    pub arrival: DecayingStats,
    /// Local minutes-of-day of the last sighting per completed day
    pub departure: DecayingStats,
    pub locations: BTreeMap<String, LocationStats>,
    /// Decayed total of visits across all areas
    pub total_visits: DecayingCount,
    pub compliance_rates: BTreeMap<SignalKind, DecayingRate>,
    pub observations: u64,
    pub current_day: Option<NaiveDate>,
    /// Local minute of the latest sighting on `current_day`
    pub day_last_minute: f64,
    pub current_visit: Option<CurrentVisit>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(skip)]
    pub recent: RecentEvents,
}

impl BehaviorBaseline {
    pub fn new(employee_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            arrival: DecayingStats::default(),
            departure: DecayingStats::default(),
            locations: BTreeMap::new(),
            total_visits: DecayingCount::default(),
            compliance_rates: BTreeMap::new(),
            observations: 0,
            current_day: None,
            day_last_minute: 0.0,
            current_visit: None,
            created_at,
            last_updated: created_at,
            recent: RecentEvents::default(),
        }
    }

    /// Enough history for temporal/spatial deviation to be meaningful
    pub fn is_mature(&self, config: &BaselineConfig) -> bool {
        self.observations >= config.min_observations
    }

    /// True when `at` falls on a local day not yet seen (the event would be an arrival)
    pub fn is_first_of_day(&self, at: DateTime<Utc>, config: &BaselineConfig) -> bool {
        let (date, _) = local_day_minute(at, config.utc_offset_minutes);
        self.current_day.map_or(true, |day| date > day)
    }

    /// Decayed share of visits that went to `area_id`, in [0,1]
    pub fn visit_share(&self, area_id: &str, now: DateTime<Utc>, lambda_per_day: f64) -> f64 {
        let total = self.total_visits.value_at(now, lambda_per_day);
        if total <= 0.0 {
            return 0.0;
        }
        self.locations
            .get(area_id)
            .map(|loc| (loc.visits.value_at(now, lambda_per_day) / total).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    /// O(1) incremental update (amortized over the fixed-size area map)
    pub fn apply(&mut self, event: &AnalysisEvent, config: &BaselineConfig) {
        let lambda = config.lambda_per_day();
        let at = event.timestamp;
        let (date, minute) = local_day_minute(at, config.utc_offset_minutes);

        match self.current_day {
            None => {
                self.arrival.observe(minute, at, lambda);
                self.current_day = Some(date);
                self.day_last_minute = minute;
            }
            Some(day) if date > day => {
                // Previous day is complete: its last sighting is the departure
                let day_end = self.last_updated;
                self.departure.observe(self.day_last_minute, day_end, lambda);
                self.arrival.observe(minute, at, lambda);
                self.current_day = Some(date);
                self.day_last_minute = minute;
            }
            Some(day) if date == day => {
                self.day_last_minute = self.day_last_minute.max(minute);
            }
            // Late event from an already completed day
            Some(_) => {}
        }

        self.apply_location(&event.area_id, at, lambda);

        for signal in &event.signals {
            if signal.kind == SignalKind::Identity {
                continue;
            }
            match signal.effective_verdict() {
                Verdict::Pass => self.compliance_rates.entry(signal.kind).or_default().observe(true, at, lambda),
                Verdict::Fail => self.compliance_rates.entry(signal.kind).or_default().observe(false, at, lambda),
                Verdict::Unknown => {}
            }
        }

        self.recent.push(at.timestamp_millis(), &event.camera_id, config.dedup_capacity);
        self.observations += 1;
        self.last_updated = self.last_updated.max(at);
    }

    fn apply_location(&mut self, area_id: &str, at: DateTime<Utc>, lambda: f64) {
        let continuing = match &self.current_visit {
            Some(visit) => {
                visit.area_id == area_id && at - visit.last_seen <= Duration::minutes(VISIT_GAP_MINUTES)
            }
            None => false,
        };

        if continuing {
            if let Some(visit) = self.current_visit.as_mut() {
                visit.last_seen = visit.last_seen.max(at);
            }
        } else {
            if let Some(prev) = self.current_visit.take() {
                let dwell = (prev.last_seen - prev.entered_at).num_seconds().max(0) as f64 / 60.0;
                if let Some(loc) = self.locations.get_mut(&prev.area_id) {
                    loc.dwell_minutes.observe(dwell, prev.last_seen, lambda);
                }
            }
            let loc = self.locations.entry(area_id.to_string()).or_default();
            loc.visits.add(1.0, at, lambda);
            loc.visit_count += 1;
            self.total_visits.add(1.0, at, lambda);
            self.current_visit = Some(CurrentVisit {
                area_id: area_id.to_string(),
                entered_at: at,
                last_seen: at,
            });
        }

        let loc = self.locations.entry(area_id.to_string()).or_default();
        loc.last_seen = Some(loc.last_seen.map_or(at, |prev| prev.max(at)));
    }
}

/// Local calendar day and minute-of-day for a UTC timestamp
pub fn local_day_minute(at: DateTime<Utc>, utc_offset_minutes: i32) -> (NaiveDate, f64) {
    let local = at.naive_utc() + Duration::minutes(utc_offset_minutes as i64);
    let minute = local.hour() as f64 * 60.0 + local.minute() as f64 + local.second() as f64 / 60.0;
    (local.date(), minute)
}

// ============================================================================
// EPHEMERAL TRACK (unidentified persons)
// ============================================================================

/// Short-lived sighting track. Expires after the configured TTL, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemeralTrack {
    pub cluster_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub sightings: u32,
    pub areas: BTreeSet<String>,
    #[serde(skip)]
    pub recent: RecentEvents,
    /// Wall-clock time of the last recorded sighting
    #[serde(skip, default = "Utc::now")]
    pub last_processed: DateTime<Utc>,
}

impl EphemeralTrack {
    pub fn new(cluster_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            first_seen: at,
            last_seen: at,
            sightings: 0,
            areas: BTreeSet::new(),
            recent: RecentEvents::default(),
            last_processed: Utc::now(),
        }
    }

    /// `now` is event time
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_seen > ttl
    }

    /// Event time this track has reached at `wall_now`
    pub fn clock(&self, wall_now: DateTime<Utc>) -> DateTime<Utc> {
        event_clock(self.last_seen, self.last_processed, wall_now)
    }

    pub fn record(&mut self, event: &AnalysisEvent, dedup_capacity: usize) {
        self.sightings = self.sightings.saturating_add(1);
        self.first_seen = self.first_seen.min(event.timestamp);
        self.last_seen = self.last_seen.max(event.timestamp);
        self.areas.insert(event.area_id.clone());
        self.recent.push(event.timestamp.timestamp_millis(), &event.camera_id, dedup_capacity);
        self.last_processed = Utc::now();
    }
}

// ============================================================================
// SNAPSHOT VIEW
// ============================================================================

/// Consistent copy of an identity's history, taken under the partition read lock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BaselineView {
    /// Cold start: no durable history yet
    NoBaseline,
    Durable(BehaviorBaseline),
    Ephemeral(EphemeralTrack),
}

impl BaselineView {
    pub fn durable(&self) -> Option<&BehaviorBaseline> {
        match self {
            BaselineView::Durable(b) => Some(b),
            _ => None,
        }
    }

    pub fn ephemeral(&self) -> Option<&EphemeralTrack> {
        match self {
            BaselineView::Ephemeral(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_cold(&self) -> bool {
        matches!(self, BaselineView::NoBaseline)
    }
}

/// What `BaselineStore::update` did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Created,
    Updated,
    Tracked,
    Duplicate,
}
