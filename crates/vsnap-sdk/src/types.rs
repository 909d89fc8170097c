//! Wire types for the subset of the vim25 JSON API used by vsnap.
//!
//! Field names follow the vSphere API (camelCase); every data object carries a
//! `_typeName` discriminator which is accepted but otherwise ignored on input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn moref_type_name() -> String {
    "ManagedObjectReference".to_string()
}

/// Handle to a server-side managed object, e.g. `VirtualMachine:vm-42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "_typeName", default = "moref_type_name")]
    type_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: moref_type_name(),
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    pub root_folder: ManagedObjectReference,
    pub view_manager: Option<ManagedObjectReference>,
    pub session_manager: Option<ManagedObjectReference>,
    #[serde(default)]
    pub about: Option<AboutInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutInfo {
    pub full_name: String,
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub key: String,
    pub user_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateContainerViewRequest<'a> {
    pub container: &'a ManagedObjectReference,
    #[serde(rename = "type")]
    pub kinds: Vec<&'a str>,
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoveSnapshotRequest {
    pub remove_children: bool,
    pub consolidate: bool,
}

/// `VirtualMachine.snapshot`; absent when the VM has no snapshots.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    #[serde(default)]
    pub current_snapshot: Option<ManagedObjectReference>,
    #[serde(default)]
    pub root_snapshot_list: Vec<SnapshotTree>,
}

impl SnapshotInfo {
    /// Pre-order walk over every tree in `rootSnapshotList`.
    pub fn walk(&self) -> SnapshotWalk<'_> {
        SnapshotWalk::new(&self.root_snapshot_list)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTree {
    pub snapshot: ManagedObjectReference,
    #[serde(default)]
    pub vm: Option<ManagedObjectReference>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub child_snapshot_list: Vec<SnapshotTree>,
}

impl SnapshotTree {
    pub fn walk(&self) -> SnapshotWalk<'_> {
        SnapshotWalk::new(std::slice::from_ref(self))
    }
}

/// Iterative pre-order traversal yielding `(depth, node)`.
///
/// Parents are always yielded before their children, siblings in list order.
pub struct SnapshotWalk<'a> {
    stack: Vec<(usize, &'a SnapshotTree)>,
}

impl<'a> SnapshotWalk<'a> {
    fn new(roots: &'a [SnapshotTree]) -> Self {
        Self {
            stack: roots.iter().rev().map(|tree| (0, tree)).collect(),
        }
    }
}

impl<'a> Iterator for SnapshotWalk<'a> {
    type Item = (usize, &'a SnapshotTree);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack.extend(
            node.child_snapshot_list
                .iter()
                .rev()
                .map(|child| (depth + 1, child)),
        );
        Some((depth, node))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    #[serde(default)]
    pub key: Option<String>,
    pub state: TaskState,
    #[serde(default)]
    pub error: Option<LocalizedMethodFault>,
    #[serde(default)]
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedMethodFault {
    #[serde(default)]
    pub localized_message: Option<String>,
    #[serde(default)]
    pub fault: Option<serde_json::Value>,
}

impl LocalizedMethodFault {
    pub fn describe(&self) -> String {
        if let Some(message) = self.localized_message.as_deref().filter(|m| !m.is_empty()) {
            return message.to_string();
        }
        self.fault
            .as_ref()
            .and_then(|fault| fault.get("_typeName"))
            .and_then(|name| name.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "unknown task fault".to_string())
    }
}
