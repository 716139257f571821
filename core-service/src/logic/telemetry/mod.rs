//! Telemetry Module
//!
//! Operators see drops and suppressions only through this module, so
//! every one of them is counted or recorded here.
//!
//! ## Structure
//! - `counters.rs` - named atomic counters + serializable snapshot
//! - `recorder.rs` - append-only, size-rotated JSONL writer
//! - `audit.rs` - decision audit trail (memory ring + optional JSONL file)

pub mod counters;
pub mod recorder;
pub mod audit;

pub use counters::{Counter, CounterSnapshot, Counters};
pub use recorder::{list_log_files, read_records, Recorder};
pub use audit::{AuditEntry, AuditLog};
