// Shared types for the vsnap workspace: endpoints, inventory records and the error type.

use std::fmt::{self, Display};

use chrono::{DateTime, Duration, Utc};
pub use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VsnapError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("No complete vCenter credentials found (expected VCENTER1_HOST, VCENTER1_USER, VCENTER1_PASSWORD)")]
    NoCredentials,

    #[error("No vCenter connections established")]
    NoSessions,

    #[error("Endpoint {host}: {message}")]
    Endpoint { host: String, message: String },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl VsnapError {
    pub fn endpoint(endpoint: &Endpoint, err: impl Display) -> Self {
        Self::Endpoint {
            host: endpoint.host.clone(),
            message: err.to_string(),
        }
    }
}

// Define the primary Result type for vsnap operations
pub type Result<T> = std::result::Result<T, VsnapError>;

/// One `VCENTER{N}_*` credential tuple.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointCredential {
    pub index: u32,
    pub host: String,
    pub username: String,
    password: String,
}

impl EndpointCredential {
    pub fn new(
        index: u32,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            index,
            host: host.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            index: self.index,
            host: self.host.clone(),
        }
    }
}

impl fmt::Debug for EndpointCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCredential")
            .field("index", &self.index)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identifies a vCenter server for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub index: u32,
    pub host: String,
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    /// Managed object id, e.g. `vm-42`.
    pub id: String,
    pub name: String,
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Managed object id of the snapshot, e.g. `snapshot-7`.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// 0 for root snapshots, increasing towards the leaves.
    pub depth: usize,
    pub vm: VmRecord,
}

impl SnapshotRecord {
    pub fn endpoint(&self) -> &Endpoint {
        &self.vm.endpoint
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Whole days elapsed, never negative even for clock-skewed timestamps.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        self.age(now).num_days().max(0)
    }
}

impl Display for SnapshotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' on VM '{}' ({})",
            self.name, self.vm.name, self.vm.endpoint
        )
    }
}
