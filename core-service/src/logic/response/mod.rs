//! Response Module - Alert emission
//!
//! Workers hand finished alerts to the emitter without blocking; the
//! emitter delivers them to a pluggable sink.
//!
//! ## Structure
//! - `types.rs` - `AlertRecord`, the outbound payload
//! - `sink.rs` - `AlertSink` trait, JSONL file sink, in-memory sink
//! - `emitter.rs` - bounded buffer, drop policy, critical retry

pub mod types;
pub mod sink;
pub mod emitter;

pub use types::AlertRecord;
pub use sink::{AlertSink, JsonlAlertSink, MemorySink};
pub use emitter::{AlertEmitter, EmitterSettings, EnqueueOutcome};
