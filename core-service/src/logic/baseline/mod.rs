//! Baseline Module - Behavioral Baseline Store
//!
//! Per-identity behavioral history used by the anomaly scorer.
//!
//! # Architecture
//! - `types.rs`: decaying statistics, `BehaviorBaseline`, `EphemeralTrack`, `BaselineView`
//! - `store.rs`: partitioned store (update / snapshot / purge / dedup / TTL expiry)
//!
//! # Decay
//! Exponential forgetting with rate `λ = 3 / window_days` per day: an
//! observation at the window edge keeps ~5% of its weight, half-life is
//! `window·ln2/3` (~6.9 days for 30 days). Arrival/departure statistics are
//! blended with a configured prior, so an unobserved dimension drifts back
//! toward it as its own evidence decays.
//!
//! # Cold start
//! `snapshot` of an unknown employee returns `BaselineView::NoBaseline`.
//! Ephemeral keys only get a short-TTL track, never a durable profile.

pub mod types;
pub mod store;
#[cfg(test)]
mod tests;

pub use types::{
    BaselineView,
    BehaviorBaseline,
    DecayingCount,
    DecayingRate,
    DecayingStats,
    EphemeralTrack,
    LocationStats,
    Prior,
    UpdateOutcome,
};
pub use store::BaselineStore;
