//! Anomaly Module
//!
//! Scores one `AnalysisEvent` against the identity's baseline view.
//!
//! ## Structure
//! - `types`: AnomalyScore, ScoreBreakdown, StaticFlag, FlagHit
//! - `rules`: static policy flags (badge, restricted area, mismatch, lingering)
//! - `scorer`: temporal / spatial / compliance terms and the composite
//!
//! ## Usage
//! ```ignore
//! use crate::logic::anomaly::score;
//!
//! let view = store.snapshot(&event.identity, event.timestamp, ttl);
//! let result = score(&event, &view, controller.current_level(), &config);
//! if result.floor_hit { /* mandatory or lingering violation */ }
//! ```

pub mod types;
pub mod rules;
pub mod scorer;

pub use types::{AnomalyScore, FlagHit, ScoreBreakdown, StaticFlag};
pub use rules::evaluate_static;
pub use scorer::{compliance_term, dwell_term, score};
