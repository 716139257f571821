//! Commands - JSON-lines protocol
//!
//! ```text
//! {"cmd":"submit","camera_id":"cam-3","area_id":"lobby","timestamp":"2024-03-04T08:55:00Z","results":[...]}
//! {"cmd":"load","queue_utilization":0.7}
//! {"cmd":"baseline","identity":"employee:E100"}
//! {"cmd":"alert_state","identity":"E100"}
//! {"cmd":"purge","identity":"ephemeral:3f2a9c01d4e5b6a7"}
//! {"cmd":"level","force":"l2"}
//! {"cmd":"decisions","limit":20}
//! {"cmd":"stats"}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::logic::degradation::{DegradationLevel, LoadMetrics};
use crate::logic::engine::Engine;
use crate::logic::error::EngineError;
use crate::logic::identity::IdentityKey;
use crate::logic::signal::AnalyzerSubmission;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Submit(AnalyzerSubmission),
    Load(LoadMetrics),
    Baseline { identity: String },
    AlertState { identity: String },
    Purge { identity: String },
    /// Without `force` only reports; `"auto"` releases a pin
    Level {
        #[serde(default)]
        force: Option<String>,
    },
    Decisions {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Reload { path: PathBuf },
    Stats,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl Response {
    fn ok(data: Value) -> Self {
        Self { ok: true, data: Some(data), error: None, error_kind: None }
    }

    fn err(kind: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
            error_kind: Some(kind.to_string()),
        }
    }

    fn from_error(e: &EngineError) -> Self {
        Self::err(e.kind(), e.to_string())
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"ok\":false,\"error\":\"{}\"}}", e))
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Parse and execute one command line
pub fn handle_line(engine: &Engine, line: &str) -> Response {
    match serde_json::from_str::<Command>(line) {
        Ok(command) => handle(engine, command),
        Err(e) => Response::err("bad_command", e.to_string()),
    }
}

pub fn handle(engine: &Engine, command: Command) -> Response {
    match command {
        Command::Submit(submission) => match engine.submit(submission) {
            Ok(identity) => Response::ok(json!({ "identity": identity.to_string() })),
            Err(e) => Response::from_error(&e),
        },

        Command::Load(metrics) => {
            let level = engine.report_load(metrics);
            Response::ok(json!({ "level": level.as_str() }))
        }

        Command::Baseline { identity } => with_identity(&identity, |key| {
            to_value(engine.get_baseline(&key))
        }),

        Command::AlertState { identity } => with_identity(&identity, |key| {
            to_value(engine.get_alert_state(&key))
        }),

        Command::Purge { identity } => with_identity(&identity, |key| {
            Response::ok(json!({ "purged": engine.purge_identity(&key) }))
        }),

        Command::Level { force } => {
            match force.as_deref().map(str::trim) {
                None => {}
                Some("auto") => engine.force_level(None),
                Some(raw) => match raw.parse::<DegradationLevel>() {
                    Ok(level) => engine.force_level(Some(level)),
                    Err(e) => return Response::err("bad_command", e),
                },
            }
            Response::ok(json!({ "level": engine.current_level().as_str() }))
        }

        Command::Decisions { limit } => to_value(engine.recent_decisions(limit)),

        Command::Reload { path } => match engine.reload_config(&path) {
            Ok(()) => Response::ok(json!({ "reloaded": path.display().to_string() })),
            Err(e) => Response::from_error(&e),
        },

        Command::Stats => to_value(engine.stats()),
    }
}

fn with_identity(raw: &str, f: impl FnOnce(IdentityKey) -> Response) -> Response {
    match raw.parse::<IdentityKey>() {
        Ok(key) => f(key),
        Err(e) => Response::err("bad_command", e),
    }
}

fn to_value<T: Serialize>(value: T) -> Response {
    match serde_json::to_value(value) {
        Ok(v) => Response::ok(v),
        Err(e) => Response::err("serialization", e.to_string()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
