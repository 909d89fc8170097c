use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};
use vsnap_common::{Endpoint, EndpointCredential, Result, VsnapError};
use vsnap_sdk::{TaskPolling, VsphereClient};

pub use vsnap_sdk::DEFAULT_API_RELEASE;

use crate::inventory::{Inventory, VsphereSession};

/// Opens an authenticated session for one credential tuple.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credential: &EndpointCredential) -> Result<Box<dyn Inventory>>;
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub timeout: Duration,
    pub api_release: String,
    pub polling: TaskPolling,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: Duration::from_secs(60),
            api_release: DEFAULT_API_RELEASE.to_string(),
            polling: TaskPolling::default(),
        }
    }
}

pub struct VsphereConnector {
    options: ConnectOptions,
}

impl VsphereConnector {
    pub fn new(options: ConnectOptions) -> Self {
        if options.insecure {
            warn!("TLS certificate verification is disabled for all vCenter connections");
        }
        Self { options }
    }
}

#[async_trait]
impl Connector for VsphereConnector {
    async fn connect(&self, credential: &EndpointCredential) -> Result<Box<dyn Inventory>> {
        let endpoint = credential.endpoint();
        let mut client = VsphereClient::builder(credential.host.clone())
            .release(self.options.api_release.clone())
            .timeout(self.options.timeout)
            .accept_invalid_certs(self.options.insecure)
            .task_polling(self.options.polling)
            .build()
            .map_err(|e| VsnapError::endpoint(&endpoint, e))?;

        client
            .login(&credential.username, credential.password())
            .await
            .map_err(|e| VsnapError::endpoint(&endpoint, e))?;

        Ok(Box::new(VsphereSession::new(endpoint, client)))
    }
}

/// An open session together with the endpoint it belongs to.
pub struct EndpointSession {
    pub endpoint: Endpoint,
    pub inventory: Box<dyn Inventory>,
}

impl EndpointSession {
    pub async fn logout(mut self) {
        match self.inventory.logout().await {
            Ok(()) => info!("Disconnected from {}", self.endpoint),
            Err(e) => warn!("Logout from {} failed: {}", self.endpoint, e),
        }
    }
}

/// Open sessions keyed by endpoint index, in credential order.
#[derive(Default)]
pub struct Sessions {
    sessions: Vec<EndpointSession>,
}

impl Sessions {
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&EndpointSession> {
        self.sessions.iter().find(|s| s.endpoint.index == index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointSession> {
        self.sessions.iter()
    }

    /// Fails when no endpoint could be reached.
    pub fn require_any(self) -> Result<Self> {
        if self.sessions.is_empty() {
            error!("No vCenter connections established. Exiting.");
            return Err(VsnapError::NoSessions);
        }
        Ok(self)
    }

    pub async fn logout_all(self) {
        for session in self.sessions {
            session.logout().await;
        }
    }
}

impl IntoIterator for Sessions {
    type Item = EndpointSession;
    type IntoIter = std::vec::IntoIter<EndpointSession>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions.into_iter()
    }
}

/// Connect to every endpoint in order; failures are logged and skipped.
///
/// A host listed under several indices is connected once, under its first index.
pub async fn connect_all(
    connector: &dyn Connector,
    credentials: &[EndpointCredential],
) -> Sessions {
    let mut sessions = Vec::with_capacity(credentials.len());
    let mut hosts = HashSet::new();
    for credential in credentials {
        if !hosts.insert(credential.host.to_ascii_lowercase()) {
            warn!(
                "vCenter{} duplicates host {}. Skipping.",
                credential.index, credential.host
            );
            continue;
        }
        match connector.connect(credential).await {
            Ok(inventory) => {
                info!("Successfully connected to vCenter: {}", credential.host);
                sessions.push(EndpointSession {
                    endpoint: credential.endpoint(),
                    inventory,
                });
            }
            Err(e) => {
                error!("Error connecting to vCenter {}: {}", credential.host, e);
            }
        }
    }
    Sessions { sessions }
}
