//! Credential discovery from `VCENTER{N}_HOST` / `_USER` / `_PASSWORD`.
//!
//! Indices are scanned from 1 upwards. An index with none of the three keys set
//! ends the scan; an index with only some of them is skipped with a warning and
//! does not affect any other index.

use std::path::Path;

use tracing::{debug, warn};
use vsnap_common::{EndpointCredential, Result, VsnapError};

/// Upper bound on the `N` in `VCENTER{N}_*` unless configured otherwise.
pub const DEFAULT_MAX_ENDPOINTS: u32 = 32;

const HOST: &str = "HOST";
const USER: &str = "USER";
const PASSWORD: &str = "PASSWORD";

pub fn env_key(index: u32, field: &str) -> String {
    format!("VCENTER{index}_{field}")
}

/// An index that had some, but not all, of its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteCredential {
    pub index: u32,
    pub missing: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ResolvedCredentials {
    pub credentials: Vec<EndpointCredential>,
    pub incomplete: Vec<IncompleteCredential>,
}

impl ResolvedCredentials {
    /// Fails when nothing usable was found; the run cannot do anything without an endpoint.
    pub fn require_any(self) -> Result<Vec<EndpointCredential>> {
        if self.credentials.is_empty() {
            return Err(VsnapError::NoCredentials);
        }
        Ok(self.credentials)
    }
}

/// Scan `VCENTER1_*` .. `VCENTER{max}_*` through `lookup`.
///
/// Empty values count as unset.
pub fn resolve_credentials<F>(lookup: F, max_endpoints: u32) -> ResolvedCredentials
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: String| lookup(&key).filter(|value| !value.is_empty());
    let mut resolved = ResolvedCredentials::default();

    for index in 1..=max_endpoints {
        let host = get(env_key(index, HOST));
        let user = get(env_key(index, USER));
        let password = get(env_key(index, PASSWORD));

        match (host, user, password) {
            (None, None, None) => {
                debug!("No VCENTER{} variables set, stopping credential scan", index);
                break;
            }
            (Some(host), Some(user), Some(password)) => {
                resolved
                    .credentials
                    .push(EndpointCredential::new(index, host, user, password));
            }
            (host, user, password) => {
                let missing: Vec<String> = [(HOST, host), (USER, user), (PASSWORD, password)]
                    .into_iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(field, _)| env_key(index, field))
                    .collect();
                warn!(
                    "Incomplete vCenter{} credentials (missing {}). Skipping.",
                    index,
                    missing.join(", ")
                );
                resolved
                    .incomplete
                    .push(IncompleteCredential { index, missing });
            }
        }
    }

    resolved
}

/// [`resolve_credentials`] over the process environment.
pub fn resolve_from_env(max_endpoints: u32) -> ResolvedCredentials {
    resolve_credentials(|key| std::env::var(key).ok(), max_endpoints)
}

/// Load an explicit env file. Variables already present in the process win.
pub fn load_env_file(path: &Path) -> Result<()> {
    dotenvy::from_path(path).map_err(|e| {
        VsnapError::Config(format!("failed to load env file {}: {}", path.display(), e))
    })
}
