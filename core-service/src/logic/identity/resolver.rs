//! Entity Resolver
//!
//! Maps a frame-level detection to an `IdentityKey`:
//! a confident face match gives the employee id, anything else falls back
//! to an ephemeral cluster key derived from (camera, coarse time bucket).
//! Ephemeral keys are never promoted retroactively.

use sha2::{Digest, Sha256};

use super::types::{FrameContext, IdentityKey};
use crate::logic::config::IdentityConfig;
use crate::logic::signal::{SignalKind, SignalResult};

#[derive(Debug, Clone)]
pub struct EntityResolver {
    match_threshold: f32,
    bucket_secs: i64,
}

impl EntityResolver {
    pub fn new(match_threshold: f32, bucket_secs: u64) -> Self {
        Self {
            match_threshold,
            bucket_secs: bucket_secs.max(1) as i64,
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(config.match_threshold, config.ephemeral_bucket_secs)
    }

    pub fn resolve(&self, ctx: &FrameContext, identity_signal: Option<&SignalResult>) -> IdentityKey {
        if let Some(signal) = identity_signal.filter(|s| s.kind == SignalKind::Identity) {
            if signal.is_pass() && signal.confidence >= self.match_threshold {
                if let Some(employee_id) = signal.employee_id() {
                    return IdentityKey::Employee(employee_id.to_string());
                }
            }
        }

        let bucket = ctx.timestamp.timestamp().div_euclid(self.bucket_secs);
        IdentityKey::Ephemeral(ephemeral_id(&ctx.camera_id, bucket))
    }
}

/// Opaque cluster id: first 16 hex chars of sha256("camera|bucket")
fn ephemeral_id(camera_id: &str, bucket: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}", camera_id, bucket).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
