//! Policy Module
//!
//! Decision Engine: per-identity severity state machine
//! None -> Low -> Medium -> High -> Critical with hysteresis.
//!
//! ## Structure
//! - `types`: Severity, Action, Transition, Decision
//! - `engine`: pure transition logic (`step`, `decay`)
//!
//! ## Rules
//! - Escalation needs the score to reach the level's threshold AND either a
//!   static floor or k-of-n recent scores at that threshold.
//! - Unconfirmed escalation may only move None -> Low.
//! - De-escalation drops one level per cooldown without a qualifying anomaly.
//! - Entering a level >= `min_alert_severity` emits once; repeats inside the
//!   cooldown are suppressed and counted.

pub mod types;
pub mod engine;

pub use types::{Action, Decision, Severity, Transition};

pub use engine::{decay, step};
