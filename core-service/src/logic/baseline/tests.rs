use chrono::{DateTime, Duration, TimeZone, Utc};

use super::store::BaselineStore;
use super::types::{local_day_minute, DecayingStats, Prior, UpdateOutcome};
use super::BaselineView;
use crate::logic::config::BaselineConfig;
use crate::logic::events::AnalysisEvent;
use crate::logic::identity::IdentityKey;
use crate::logic::signal::{SignalDetail, SignalKind, SignalResult, Verdict};

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
}

fn badge(verdict: Verdict, confidence: f32, ts: DateTime<Utc>) -> SignalResult {
    SignalResult {
        kind: SignalKind::Badge,
        confidence,
        verdict,
        detail: SignalDetail::Badge { holder_id: None, badge_id: None },
        timestamp: ts,
        camera_id: "cam-1".to_string(),
        latency_ms: None,
        confidence_clamped: false,
    }
}

fn event(identity: IdentityKey, area: &str, ts: DateTime<Utc>) -> AnalysisEvent {
    AnalysisEvent {
        identity,
        signals: vec![badge(Verdict::Pass, 0.9, ts)],
        camera_id: "cam-1".to_string(),
        area_id: area.to_string(),
        timestamp: ts,
    }
}

fn ttl() -> Duration {
    Duration::minutes(15)
}

#[test]
fn test_welford_without_decay() {
    let mut stats = DecayingStats::default();
    let t = at(1, 9, 0);
    for x in [1.0, 2.0, 3.0] {
        stats.observe(x, t, 0.1);
    }
    assert!((stats.mean - 2.0).abs() < 1e-9);
    assert!((stats.variance() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.count, 3);
}

#[test]
fn test_old_observations_lose_influence() {
    let lambda = BaselineConfig::default().lambda_per_day();
    let mut stats = DecayingStats::default();
    stats.observe(100.0, at(1, 9, 0), lambda);
    stats.observe(200.0, at(31, 9, 0), lambda);

    // first observation is down to ~e^-3 of its weight
    assert!(stats.mean > 190.0, "mean = {}", stats.mean);
    assert!((stats.weight - (1.0 + (-3.0f64).exp())).abs() < 1e-6);
}

#[test]
fn test_half_life_matches_window() {
    let config = BaselineConfig::default();
    assert!((config.half_life_days() - 30.0 * std::f64::consts::LN_2 / 3.0).abs() < 1e-9);
}

#[test]
fn test_blend_falls_back_to_prior() {
    let config = BaselineConfig::default();
    let prior = Prior::arrival(&config);
    let empty = DecayingStats::default();
    let (mean, std) = empty.blended(at(1, 9, 0), config.lambda_per_day(), &prior);
    assert_eq!(mean, config.arrival_prior_minutes);
    assert_eq!(std, config.prior_std_minutes);

    // A single very old observation barely moves the prior
    let mut stale = DecayingStats::default();
    stale.observe(300.0, at(1, 5, 0), config.lambda_per_day());
    let fresh = stale.blended(at(1, 5, 0), config.lambda_per_day(), &prior);
    let later = stale.blended(at(1, 5, 0) + Duration::days(120), config.lambda_per_day(), &prior);
    assert!((later.0 - prior.mean).abs() < (fresh.0 - prior.mean).abs());
}

#[test]
fn test_local_minutes_use_offset() {
    let (date, minute) = local_day_minute(at(1, 23, 30), 60);
    assert_eq!(minute, 30.0);
    assert_eq!(date, at(2, 0, 0).date_naive());
}

#[test]
fn test_cold_start_snapshot() {
    let store = BaselineStore::new(8);
    let view = store.snapshot(&IdentityKey::employee("E1"), at(1, 9, 0), ttl());
    assert!(view.is_cold());
    assert!(store.get(&IdentityKey::employee("E1")).is_none());
}

#[test]
fn test_arrival_and_departure_tracking() {
    let store = BaselineStore::new(8);
    let config = BaselineConfig::default();
    let e = IdentityKey::employee("E1");

    assert_eq!(store.update(&event(e.clone(), "lobby", at(1, 9, 0)), &config, ttl()), UpdateOutcome::Created);
    store.update(&event(e.clone(), "office", at(1, 12, 0)), &config, ttl());
    store.update(&event(e.clone(), "lobby", at(1, 17, 0)), &config, ttl());
    store.update(&event(e.clone(), "lobby", at(2, 9, 10)), &config, ttl());

    let view = store.snapshot(&e, at(2, 9, 10), ttl());
    let baseline = view.durable().unwrap();
    assert_eq!(baseline.arrival.count, 2);
    assert_eq!(baseline.departure.count, 1);
    assert!((baseline.departure.mean - 17.0 * 60.0).abs() < 1e-9);
    assert!((baseline.arrival.mean - 545.0).abs() < 1.0);
    assert_eq!(baseline.observations, 4);
    assert!(!baseline.is_first_of_day(at(2, 10, 0), &config));
    assert!(baseline.is_first_of_day(at(3, 8, 0), &config));
}

#[test]
fn test_visit_share_and_dwell() {
    let store = BaselineStore::new(8);
    let config = BaselineConfig::default();
    let e = IdentityKey::employee("E2");

    store.update(&event(e.clone(), "office", at(1, 9, 0)), &config, ttl());
    store.update(&event(e.clone(), "office", at(1, 9, 20)), &config, ttl());
    store.update(&event(e.clone(), "canteen", at(1, 12, 0)), &config, ttl());

    let view = store.snapshot(&e, at(1, 12, 0), ttl());
    let baseline = view.durable().unwrap();
    let lambda = config.lambda_per_day();

    // continuous presence in office is one visit
    assert_eq!(baseline.locations["office"].visit_count, 1);
    assert!((baseline.visit_share("office", at(1, 12, 0), lambda) - 0.5).abs() < 0.01);
    assert_eq!(baseline.visit_share("server_room", at(1, 12, 0), lambda), 0.0);
    assert_eq!(baseline.locations["office"].dwell_minutes.count, 1);
    assert!((baseline.locations["office"].dwell_minutes.mean - 20.0).abs() < 1e-9);
}

#[test]
fn test_compliance_rate_ignores_unknown() {
    let store = BaselineStore::new(8);
    let config = BaselineConfig::default();
    let e = IdentityKey::employee("E3");

    let mut ev = event(e.clone(), "lobby", at(1, 9, 0));
    store.update(&ev, &config, ttl());

    ev.timestamp = at(1, 9, 5);
    ev.signals = vec![badge(Verdict::Fail, 0.9, ev.timestamp)];
    store.update(&ev, &config, ttl());

    ev.timestamp = at(1, 9, 6);
    ev.signals = vec![badge(Verdict::Fail, 0.0, ev.timestamp)];
    store.update(&ev, &config, ttl());

    let view = store.snapshot(&e, at(1, 9, 6), ttl());
    let rate = view.durable().unwrap().compliance_rates[&SignalKind::Badge].rate().unwrap();
    assert!((rate - 0.5).abs() < 1e-3);
}

#[test]
fn test_replay_is_not_double_counted() {
    let store = BaselineStore::new(8);
    let config = BaselineConfig::default();
    let ev = event(IdentityKey::employee("E4"), "lobby", at(1, 9, 0));

    store.update(&ev, &config, ttl());
    assert!(store.is_duplicate(&ev));
    assert_eq!(store.update(&ev, &config, ttl()), UpdateOutcome::Duplicate);

    let view = store.snapshot(&ev.identity, at(1, 9, 0), ttl());
    assert_eq!(view.durable().unwrap().observations, 1);

    // same time from another camera is a distinct sighting
    let mut other = ev.clone();
    other.camera_id = "cam-2".to_string();
    assert!(!store.is_duplicate(&other));
}

#[test]
fn test_purge() {
    let store = BaselineStore::new(8);
    let config = BaselineConfig::default();
    let e = IdentityKey::employee("E5");
    store.update(&event(e.clone(), "lobby", at(1, 9, 0)), &config, ttl());
    assert_eq!(store.durable_count(), 1);

    assert!(store.purge(&e));
    assert!(!store.purge(&e));
    assert!(store.snapshot(&e, at(1, 10, 0), ttl()).is_cold());
}

#[test]
fn test_ephemeral_never_builds_durable_profile() {
    let store = BaselineStore::new(8);
    let config = BaselineConfig::default();
    let key = IdentityKey::Ephemeral("abc".to_string());

    for m in 0..3 {
        let outcome = store.update(&event(key.clone(), "server_room", at(1, 22, m)), &config, ttl());
        assert_eq!(outcome, UpdateOutcome::Tracked);
    }
    assert_eq!(store.durable_count(), 0);

    match store.snapshot(&key, at(1, 22, 3), ttl()) {
        BaselineView::Ephemeral(track) => {
            assert_eq!(track.sightings, 3);
            assert!(track.areas.contains("server_room"));
        }
        other => panic!("unexpected view {:?}", other),
    }

    // after the TTL the track is gone and a new one starts from zero
    let later = at(1, 23, 0);
    assert_eq!(store.snapshot(&key, later, ttl()).ephemeral().unwrap().sightings, 0);
    // expiry maps the wall clock onto the track's own timeline, so an old
    // recording is not dropped just because its timestamps are in the past
    assert_eq!(store.expire_ephemeral(Utc::now(), ttl()), 0);
    assert_eq!(store.expire_ephemeral(Utc::now() + ttl() + Duration::seconds(1), ttl()), 1);
    assert_eq!(store.ephemeral_count(), 0);
}
