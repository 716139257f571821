//! Identity Types

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable correlation key for an observed person
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum IdentityKey {
    /// Known employee, builds a durable baseline
    Employee(String),
    /// Unresolved (camera, time-bucket) cluster, short-lived tracking only
    Ephemeral(String),
}

impl IdentityKey {
    pub fn employee(id: impl Into<String>) -> Self {
        IdentityKey::Employee(id.into())
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, IdentityKey::Employee(_))
    }

    pub fn id(&self) -> &str {
        match self {
            IdentityKey::Employee(id) | IdentityKey::Ephemeral(id) => id,
        }
    }

    pub fn employee_id(&self) -> Option<&str> {
        match self {
            IdentityKey::Employee(id) => Some(id),
            IdentityKey::Ephemeral(_) => None,
        }
    }

    /// Partition index in `0..n`; all state for one identity lives in one partition
    pub fn partition(&self, n: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        (hasher.finish() % n.max(1) as u64) as usize
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityKey::Employee(id) => write!(f, "employee:{}", id),
            IdentityKey::Ephemeral(id) => write!(f, "ephemeral:{}", id),
        }
    }
}

impl std::str::FromStr for IdentityKey {
    type Err = String;

    /// Accepts `employee:<id>`, `ephemeral:<id>` or a bare employee id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty identity".to_string());
        }
        match s.split_once(':') {
            Some(("employee", id)) if !id.is_empty() => Ok(IdentityKey::Employee(id.to_string())),
            Some(("ephemeral", id)) if !id.is_empty() => Ok(IdentityKey::Ephemeral(id.to_string())),
            Some((prefix, _)) if prefix == "employee" || prefix == "ephemeral" => {
                Err(format!("missing id in '{}'", s))
            }
            _ => Ok(IdentityKey::Employee(s.to_string())),
        }
    }
}

/// Frame-level context the resolver needs when no face match is available
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
}
