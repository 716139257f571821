//! Degradation Module
//!
//! Graceful-degradation ladder Normal -> L1 -> L2 -> L3.
//!
//! ## Structure
//! - `types`: `DegradationLevel`, `LoadMetrics`, per-level signal filtering
//! - `controller`: hysteresis state machine fed by load reports and deadline misses
//!
//! Mandatory checks (static policy flags) are evaluated at every level.

pub mod types;
pub mod controller;

pub use types::{filter_signals, DegradationLevel, LoadMetrics};
pub use controller::{target_level, DegradationController};
