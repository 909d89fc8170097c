use async_trait::async_trait;
use tracing::{debug, warn};
use vsnap_common::{Endpoint, Result, VsnapError};
use vsnap_sdk::{ManagedObjectReference, SnapshotInfo, VsphereClient};

/// A virtual machine as seen by one open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef {
    pub id: String,
    pub name: String,
}

/// Read and mutate the inventory of one connected endpoint.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn virtual_machines(&self) -> Result<Vec<VmRef>>;

    /// `None` when the VM has no snapshots.
    async fn snapshot_info(&self, vm: &VmRef) -> Result<Option<SnapshotInfo>>;

    /// Remove one snapshot, keeping its children, and wait for completion.
    async fn remove_snapshot(&self, snapshot_id: &str) -> Result<()>;

    async fn logout(&mut self) -> Result<()>;
}

/// [`Inventory`] backed by a logged-in [`VsphereClient`].
pub struct VsphereSession {
    endpoint: Endpoint,
    client: VsphereClient,
}

impl VsphereSession {
    pub fn new(endpoint: Endpoint, client: VsphereClient) -> Self {
        Self { endpoint, client }
    }

    fn err(&self, err: vsnap_sdk::SdkError) -> VsnapError {
        VsnapError::endpoint(&self.endpoint, err)
    }
}

#[async_trait]
impl Inventory for VsphereSession {
    async fn virtual_machines(&self) -> Result<Vec<VmRef>> {
        let morefs = self
            .client
            .list_virtual_machines()
            .await
            .map_err(|e| self.err(e))?;

        let mut vms = Vec::with_capacity(morefs.len());
        for moref in morefs {
            // VMs can disappear between listing and lookup; keep the id as a stand-in.
            let name = match self.client.vm_name(&moref).await {
                Ok(name) => name,
                Err(e) => {
                    warn!("Could not read name of {} on {}: {}", moref, self.endpoint, e);
                    moref.value.clone()
                }
            };
            vms.push(VmRef {
                id: moref.value,
                name,
            });
        }
        debug!("{} virtual machines on {}", vms.len(), self.endpoint);
        Ok(vms)
    }

    async fn snapshot_info(&self, vm: &VmRef) -> Result<Option<SnapshotInfo>> {
        let moref = ManagedObjectReference::new("VirtualMachine", vm.id.clone());
        self.client
            .snapshot_info(&moref)
            .await
            .map_err(|e| self.err(e))
    }

    async fn remove_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let moref = ManagedObjectReference::new("VirtualMachineSnapshot", snapshot_id);
        self.client
            .remove_snapshot_and_wait(&moref, false)
            .await
            .map_err(|e| self.err(e))?;
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.client.logout().await.map_err(|e| self.err(e))
    }
}

impl Drop for VsphereSession {
    fn drop(&mut self) {
        if self.client.is_logged_in() {
            warn!(
                "Session for {} dropped without logout; it will expire server-side",
                self.endpoint
            );
        }
    }
}
