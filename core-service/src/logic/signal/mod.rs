//! Signal Module
//!
//! Analyzer Result Normalizer: turns heterogeneous analyzer outputs
//! (face, attire/PPE, badge OCR, schedule) into one tagged `SignalResult`.
//!
//! ## Structure
//! - `types`: SignalKind, Verdict, SignalDetail, SignalResult, inbound payloads
//! - `normalize`: pure conversion + validation

pub mod types;
pub mod normalize;

pub use types::{
    AnalyzerSubmission,
    RawAnalyzerOutput,
    SignalDetail,
    SignalKind,
    SignalResult,
    Verdict,
};

pub use normalize::{normalize, normalize_submission, NormalizedFrame};
