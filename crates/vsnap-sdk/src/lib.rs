//! # vSphere JSON API client
//!
//! A small async client for the vSphere Web Services JSON API (`/sdk/vim25/{release}`),
//! covering what snapshot housekeeping needs: session login/logout, enumerating
//! virtual machines, reading snapshot trees and removing snapshots.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vsnap_sdk::VsphereClient;
//!
//! # async fn example() -> Result<(), vsnap_sdk::SdkError> {
//! let mut client = VsphereClient::builder("vcenter.example.com").build()?;
//! client.login("administrator@vsphere.local", "secret").await?;
//!
//! for vm in client.list_virtual_machines().await? {
//!     let name = client.vm_name(&vm).await?;
//!     if let Some(info) = client.snapshot_info(&vm).await? {
//!         for (depth, snapshot) in info.walk() {
//!             println!("{name}: {}{}", "  ".repeat(depth), snapshot.name);
//!         }
//!     }
//! }
//!
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## TLS
//!
//! Certificates are verified unless the builder is told otherwise with
//! [`VsphereClientBuilder::accept_invalid_certs`]. Many lab vCenters run with
//! self-signed certificates; production deployments should install a trusted one.

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub mod types;

pub use types::{
    ManagedObjectReference, ServiceContent, SnapshotInfo, SnapshotTree, SnapshotWalk, TaskInfo,
    TaskState, UserSession,
};
use types::{CreateContainerViewRequest, LoginRequest, RemoveSnapshotRequest};

/// Header carrying the session token on every authenticated request.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// vim25 JSON API release used when none is configured.
pub const DEFAULT_API_RELEASE: &str = "8.0.2.0";

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Not logged in")]
    MissingSession,
    #[error("Server did not return a vmware-api-session-id header")]
    MissingSessionHeader,
    #[error("Task failed: {0}")]
    TaskFailed(String),
    #[error("Timeout occurred")]
    Timeout,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;

/// Backoff schedule for waiting on vSphere tasks.
#[derive(Debug, Clone, Copy)]
pub struct TaskPolling {
    pub initial: Duration,
    pub max: Duration,
    pub deadline: Duration,
}

impl Default for TaskPolling {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            deadline: Duration::from_secs(30 * 60),
        }
    }
}

impl TaskPolling {
    /// Next sleep interval: doubled, capped at `max`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

pub struct VsphereClientBuilder {
    host: String,
    release: String,
    timeout: Duration,
    accept_invalid_certs: bool,
    polling: TaskPolling,
}

impl VsphereClientBuilder {
    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.release = release.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS certificate verification. Only for endpoints with self-signed certificates.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn task_polling(mut self, polling: TaskPolling) -> Self {
        self.polling = polling;
        self
    }

    pub fn build(self) -> Result<VsphereClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        Ok(VsphereClient {
            client,
            base_url: api_base_url(&self.host, &self.release)?,
            session_id: None,
            content: None,
            polling: self.polling,
        })
    }
}

/// Resolve `host` to the vim25 JSON API root.
///
/// A bare host name gets `https://`; a value that already has a scheme is kept,
/// which is how tests point the client at a local mock server.
pub fn api_base_url(host: &str, release: &str) -> Result<Url> {
    let raw = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    let mut url = Url::parse(&raw).map_err(|e| SdkError::InvalidUrl(format!("{raw}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| SdkError::InvalidUrl(raw.clone()))?
        .pop_if_empty()
        .extend(["sdk", "vim25", release]);
    Ok(url)
}

/// Client for one vCenter endpoint. Holds at most one session at a time.
pub struct VsphereClient {
    client: Client,
    base_url: Url,
    session_id: Option<String>,
    content: Option<ServiceContent>,
    polling: TaskPolling,
}

impl VsphereClient {
    pub fn builder(host: impl Into<String>) -> VsphereClientBuilder {
        VsphereClientBuilder {
            host: host.into(),
            release: DEFAULT_API_RELEASE.to_string(),
            timeout: Duration::from_secs(60),
            accept_invalid_certs: false,
            polling: TaskPolling::default(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session_id.is_some()
    }

    /// Fetch (and cache) the `ServiceInstance` content. Does not require a session.
    pub async fn service_content(&mut self) -> Result<ServiceContent> {
        if let Some(content) = &self.content {
            return Ok(content.clone());
        }
        let url = self.url(&["ServiceInstance", "ServiceInstance", "content"])?;
        let content: ServiceContent = self.get_json(url).await?;
        self.content = Some(content.clone());
        Ok(content)
    }

    /// Authenticate and keep the returned session token for later requests.
    pub async fn login(&mut self, user_name: &str, password: &str) -> Result<UserSession> {
        let content = self.service_content().await?;
        let session_manager = content
            .session_manager
            .ok_or_else(|| SdkError::Api {
                status: 0,
                message: "service content has no sessionManager".to_string(),
            })?;

        let url = self.url(&["SessionManager", &session_manager.value, "Login"])?;
        let response = self
            .client
            .post(url)
            .json(&LoginRequest { user_name, password })
            .send()
            .await?;
        let response = check(response).await?;

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(SdkError::MissingSessionHeader)?;

        let session: UserSession = response.json().await?;
        debug!(user = %session.user_name, "vSphere session established");
        self.session_id = Some(session_id);
        Ok(session)
    }

    /// Terminate the session. A no-op when not logged in.
    pub async fn logout(&mut self) -> Result<()> {
        let Some(session_id) = self.session_id.take() else {
            return Ok(());
        };
        let session_manager = self
            .content
            .as_ref()
            .and_then(|content| content.session_manager.clone())
            .ok_or(SdkError::MissingSession)?;

        let url = self.url(&["SessionManager", &session_manager.value, "Logout"])?;
        let response = self
            .client
            .post(url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Every `VirtualMachine` below the root folder, via a temporary container view.
    pub async fn list_virtual_machines(&self) -> Result<Vec<ManagedObjectReference>> {
        let content = self.content.as_ref().ok_or(SdkError::MissingSession)?;
        let view_manager = content.view_manager.as_ref().ok_or_else(|| SdkError::Api {
            status: 0,
            message: "service content has no viewManager".to_string(),
        })?;

        let url = self.url(&["ViewManager", &view_manager.value, "CreateContainerView"])?;
        let view: ManagedObjectReference = self
            .post_json(
                url,
                &CreateContainerViewRequest {
                    container: &content.root_folder,
                    kinds: vec!["VirtualMachine"],
                    recursive: true,
                },
            )
            .await?;

        let url = self.url(&["ContainerView", &view.value, "view"])?;
        let listed: Result<Vec<ManagedObjectReference>> = self.get_json(url).await;

        // Views hold server-side resources until the session ends; release eagerly.
        let destroy = self.url(&["ContainerView", &view.value, "DestroyView"])?;
        if let Err(e) = self.post_empty(destroy).await {
            debug!("Failed to destroy container view {}: {}", view, e);
        }

        listed
    }

    pub async fn vm_name(&self, vm: &ManagedObjectReference) -> Result<String> {
        let url = self.url(&["VirtualMachine", &vm.value, "name"])?;
        self.get_json(url).await
    }

    /// The VM's snapshot tree, or `None` if it has no snapshots.
    pub async fn snapshot_info(&self, vm: &ManagedObjectReference) -> Result<Option<SnapshotInfo>> {
        let url = self.url(&["VirtualMachine", &vm.value, "snapshot"])?;
        let response = self.authed(self.client.get(url)).send().await?;
        let body = check(response).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Start removing one snapshot. With `remove_children = false` its children are
    /// kept and the removed state is consolidated into them.
    pub async fn remove_snapshot(
        &self,
        snapshot: &ManagedObjectReference,
        remove_children: bool,
    ) -> Result<ManagedObjectReference> {
        let url = self.url(&["VirtualMachineSnapshot", &snapshot.value, "RemoveSnapshot_Task"])?;
        self.post_json(
            url,
            &RemoveSnapshotRequest {
                remove_children,
                consolidate: true,
            },
        )
        .await
    }

    pub async fn task_info(&self, task: &ManagedObjectReference) -> Result<TaskInfo> {
        let url = self.url(&["Task", &task.value, "info"])?;
        self.get_json(url).await
    }

    /// Poll a task with exponential backoff until it succeeds, fails or the deadline passes.
    pub async fn wait_for_task(&self, task: &ManagedObjectReference) -> Result<TaskInfo> {
        let started = Instant::now();
        let mut delay = self.polling.initial;
        loop {
            let info = self.task_info(task).await?;
            if info.state.is_terminal() {
                if info.state == TaskState::Error {
                    let message = info
                        .error
                        .as_ref()
                        .map(|fault| fault.describe())
                        .unwrap_or_else(|| format!("{task} ended in error"));
                    return Err(SdkError::TaskFailed(message));
                }
                return Ok(info);
            }
            if started.elapsed() + delay > self.polling.deadline {
                return Err(SdkError::Timeout);
            }
            tokio::time::sleep(delay).await;
            delay = self.polling.next_delay(delay);
        }
    }

    pub async fn remove_snapshot_and_wait(
        &self,
        snapshot: &ManagedObjectReference,
        remove_children: bool,
    ) -> Result<TaskInfo> {
        let task = self.remove_snapshot(snapshot, remove_children).await?;
        self.wait_for_task(&task).await
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SdkError::InvalidUrl(self.base_url.to_string()))?
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_id {
            Some(id) => request.header(SESSION_HEADER, id),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.authed(self.client.get(url)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        let response = self.authed(self.client.post(url)).json(body).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_empty(&self, url: Url) -> Result<()> {
        let response = self.authed(self.client.post(url)).send().await?;
        check(response).await?;
        Ok(())
    }
}

/// Turn non-2xx responses into `SdkError::Api`, preferring the fault's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(SdkError::Api {
        status: status.as_u16(),
        message: fault_message(&error_text),
    })
}

fn fault_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["localizedMessage", "message", "faultstring"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .or_else(|| {
            value
                .get("_typeName")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_defaults_to_https() {
        let url = api_base_url("vc1.example.com", "8.0.2.0").unwrap();
        assert_eq!(url.as_str(), "https://vc1.example.com/sdk/vim25/8.0.2.0");
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        let url = api_base_url("http://127.0.0.1:8443/", "8.0.1.0").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8443/sdk/vim25/8.0.1.0");
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let polling = TaskPolling::default();
        let mut delay = polling.initial;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(delay.as_secs());
            delay = polling.next_delay(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_fault_message_extraction() {
        assert_eq!(
            fault_message(r#"{"_typeName":"InvalidLogin","message":"Cannot complete login"}"#),
            "Cannot complete login"
        );
        assert_eq!(fault_message(r#"{"_typeName":"NotAuthenticated"}"#), "NotAuthenticated");
        assert_eq!(fault_message("  gateway timeout \n"), "gateway timeout");
    }
}
