//! Engine Errors
//!
//! Error taxonomy for the integration engine. Cold start is not an error:
//! a missing baseline is a scoring mode (`baseline::BaselineView::NoBaseline`).

use thiserror::Error;

use super::signal::SignalKind;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed analyzer payload, rejected at the boundary
    #[error("Invalid signal from {analyzer}: {reason}")]
    InvalidSignal { analyzer: String, reason: String },

    /// Per-event processing budget exceeded
    #[error("Deadline exceeded after {elapsed_ms}ms (budget {budget_ms}ms), missing {missing:?}")]
    DeadlineExceeded {
        elapsed_ms: u64,
        budget_ms: u64,
        missing: Vec<SignalKind>,
    },

    /// Outbound alert channel unavailable
    #[error("Alert emission failed: {0}")]
    EmitFailure(String),

    /// Shard queue is full or closed
    #[error("Event queue unavailable for shard {shard}")]
    QueueFull { shard: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_signal(analyzer: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidSignal {
            analyzer: analyzer.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag, used in command responses and logs
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidSignal { .. } => "invalid_signal",
            EngineError::DeadlineExceeded { .. } => "deadline_exceeded",
            EngineError::EmitFailure(_) => "emit_failure",
            EngineError::QueueFull { .. } => "queue_full",
            EngineError::Config(_) => "config",
            EngineError::Io(_) => "io",
            EngineError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
