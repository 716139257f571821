//! Incident Module
//!
//! Owns the per-identity `AlertState` map. Transitions themselves live in
//! `policy::engine`; this module only stores, partitions and ages state.

pub mod types;
pub mod manager;

pub use types::AlertState;
pub use manager::IncidentManager;
