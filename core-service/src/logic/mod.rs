//! Logic Module - Integration & Behavioral Anomaly Engine
//!
//! ## Pipeline
//! - `signal/` - analyzer result normalization
//! - `identity/` - entity resolution (employee or ephemeral key)
//! - `baseline/` - decaying per-identity behavior statistics
//! - `anomaly/` - composite anomaly score + static policy floors
//! - `policy/` - severity state machine (pure transition function)
//! - `incident/` - per-identity alert state partitions
//! - `degradation/` - load-driven capability levels
//! - `response/` - alert emitter and sinks
//!
//! ## Runtime
//! - `analysis_loop` - sharded workers, deadlines, sweeper
//! - `engine` - public handle
//! - `telemetry/` - counters and decision audit

// Pipeline stages
pub mod signal;
pub mod identity;
pub mod events;
pub mod baseline;
pub mod anomaly;
pub mod policy;
pub mod incident;
pub mod degradation;
pub mod response;

// Runtime
pub mod analysis_loop;
pub mod engine;
pub mod telemetry;
pub mod config;
pub mod error;
