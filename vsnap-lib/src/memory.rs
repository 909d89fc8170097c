// In-memory inventory and connector for development/testing
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vsnap_common::{EndpointCredential, Result, VsnapError};
use vsnap_sdk::{ManagedObjectReference, SnapshotInfo, SnapshotTree};

use crate::connector::Connector;
use crate::inventory::{Inventory, VmRef};

/// Build a snapshot tree node for seeding an [`InMemoryInventory`].
pub fn snapshot_tree(
    id: &str,
    name: &str,
    created_at: DateTime<Utc>,
    children: Vec<SnapshotTree>,
) -> SnapshotTree {
    SnapshotTree {
        snapshot: ManagedObjectReference::new("VirtualMachineSnapshot", id),
        vm: None,
        name: name.to_string(),
        description: String::new(),
        create_time: created_at,
        state: Some("poweredOff".to_string()),
        child_snapshot_list: children,
    }
}

#[derive(Default)]
struct InventoryState {
    vms: Vec<(VmRef, Vec<SnapshotTree>)>,
    fail_listing: bool,
    failing_reads: HashSet<String>,
    failing_removals: HashSet<String>,
    removed: Vec<String>,
    logouts: usize,
}

/// Shared-state inventory; clones observe the same VMs, removals and logouts.
#[derive(Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<Mutex<InventoryState>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InventoryState> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_vm(self, id: &str, name: &str, roots: Vec<SnapshotTree>) -> Self {
        self.state().vms.push((
            VmRef {
                id: id.to_string(),
                name: name.to_string(),
            },
            roots,
        ));
        self
    }

    pub fn fail_listing(self) -> Self {
        self.state().fail_listing = true;
        self
    }

    pub fn fail_snapshot_read(self, vm_id: &str) -> Self {
        self.state().failing_reads.insert(vm_id.to_string());
        self
    }

    pub fn fail_removal(self, snapshot_id: &str) -> Self {
        self.state().failing_removals.insert(snapshot_id.to_string());
        self
    }

    /// Snapshot ids removed so far, in removal order.
    pub fn removed(&self) -> Vec<String> {
        self.state().removed.clone()
    }

    pub fn logouts(&self) -> usize {
        self.state().logouts
    }
}

/// Detach `id` from the forest, re-parenting its children in its place.
fn remove_node(list: &mut Vec<SnapshotTree>, id: &str) -> bool {
    if let Some(pos) = list.iter().position(|node| node.snapshot.value == id) {
        let node = list.remove(pos);
        for (offset, child) in node.child_snapshot_list.into_iter().enumerate() {
            list.insert(pos + offset, child);
        }
        return true;
    }
    list.iter_mut()
        .any(|node| remove_node(&mut node.child_snapshot_list, id))
}

#[async_trait]
impl Inventory for InMemoryInventory {
    async fn virtual_machines(&self) -> Result<Vec<VmRef>> {
        let state = self.state();
        if state.fail_listing {
            return Err(VsnapError::Internal("container view unavailable".to_string()));
        }
        Ok(state.vms.iter().map(|(vm, _)| vm.clone()).collect())
    }

    async fn snapshot_info(&self, vm: &VmRef) -> Result<Option<SnapshotInfo>> {
        let state = self.state();
        if state.failing_reads.contains(&vm.id) {
            return Err(VsnapError::Internal(format!("cannot read snapshots of {}", vm.id)));
        }
        let roots = state
            .vms
            .iter()
            .find(|(candidate, _)| candidate.id == vm.id)
            .map(|(_, roots)| roots.clone())
            .ok_or_else(|| VsnapError::Internal(format!("unknown VM {}", vm.id)))?;

        if roots.is_empty() {
            return Ok(None);
        }
        Ok(Some(SnapshotInfo {
            current_snapshot: None,
            root_snapshot_list: roots,
        }))
    }

    async fn remove_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.failing_removals.contains(snapshot_id) {
            return Err(VsnapError::Internal(format!(
                "snapshot {snapshot_id} is locked by another task"
            )));
        }
        let found = state
            .vms
            .iter_mut()
            .any(|(_, roots)| remove_node(roots, snapshot_id));
        if !found {
            return Err(VsnapError::Internal(format!("unknown snapshot {snapshot_id}")));
        }
        state.removed.push(snapshot_id.to_string());
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.state().logouts += 1;
        Ok(())
    }
}

/// Hands out [`InMemoryInventory`] sessions per host; unknown hosts fail to connect.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    endpoints: HashMap<String, InMemoryInventory>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, host: &str, inventory: InMemoryInventory) -> Self {
        self.endpoints.insert(host.to_string(), inventory);
        self
    }

    /// Hosts for which a connection was attempted, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, credential: &EndpointCredential) -> Result<Box<dyn Inventory>> {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(credential.host.clone());

        match self.endpoints.get(&credential.host) {
            Some(inventory) => Ok(Box::new(inventory.clone())),
            None => Err(VsnapError::endpoint(
                &credential.endpoint(),
                "connection refused",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_remove_reparents_children() {
        let inventory = InMemoryInventory::new().with_vm(
            "vm-1",
            "web01",
            vec![snapshot_tree(
                "s1",
                "base",
                at(1),
                vec![snapshot_tree("s2", "child", at(2), vec![])],
            )],
        );
        let vm = VmRef {
            id: "vm-1".to_string(),
            name: "web01".to_string(),
        };

        inventory.remove_snapshot("s1").await.unwrap();

        let info = inventory.snapshot_info(&vm).await.unwrap().unwrap();
        let names: Vec<_> = info.walk().map(|(d, s)| (d, s.name.clone())).collect();
        assert_eq!(names, vec![(0, "child".to_string())]);
        assert_eq!(inventory.removed(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_host_fails_to_connect() {
        let connector = InMemoryConnector::new();
        let cred = EndpointCredential::new(1, "nowhere", "u", "p");
        assert!(connector.connect(&cred).await.is_err());
        assert_eq!(connector.attempts(), vec!["nowhere".to_string()]);
    }
}
