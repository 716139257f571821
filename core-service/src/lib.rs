//! Presence Guard - Integration & Behavioral Anomaly Engine
//!
//! Fuses per-frame analyzer results (identity, attire, badge, schedule)
//! into per-person anomaly scores and debounced severity alerts.

pub mod api;
pub mod logic;

pub use logic::config::EngineConfig;
pub use logic::engine::{Engine, EngineStats};
pub use logic::error::{EngineError, Result};
