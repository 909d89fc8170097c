//! Flattening an endpoint's VM inventory into snapshot records.

use async_stream::try_stream;
use futures::{Stream, TryStreamExt};
use tracing::warn;
use vsnap_common::{Endpoint, Result, SnapshotRecord, VmRecord};
use vsnap_sdk::SnapshotInfo;

use crate::inventory::Inventory;

/// Lazily yield every snapshot on `endpoint`, VM by VM, parents before children.
///
/// A failure to enumerate VMs ends the stream with that error. A failure to read
/// one VM's snapshots is logged and the VM is skipped.
pub fn walk_snapshots<'a>(
    endpoint: &'a Endpoint,
    inventory: &'a dyn Inventory,
) -> impl Stream<Item = Result<SnapshotRecord>> + 'a {
    try_stream! {
        let vms = inventory.virtual_machines().await?;
        for vm in vms {
            let info = match inventory.snapshot_info(&vm).await {
                Ok(Some(info)) => info,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping VM '{}' on {}: {}", vm.name, endpoint, e);
                    continue;
                }
            };
            let owner = VmRecord {
                id: vm.id,
                name: vm.name,
                endpoint: endpoint.clone(),
            };
            for record in flatten(&owner, &info) {
                yield record;
            }
        }
    }
}

/// Every node of the VM's snapshot forest as a record, in pre-order.
pub fn flatten(vm: &VmRecord, info: &SnapshotInfo) -> Vec<SnapshotRecord> {
    info.walk()
        .map(|(depth, node)| SnapshotRecord {
            id: node.snapshot.value.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            created_at: node.create_time,
            depth,
            vm: vm.clone(),
        })
        .collect()
}

/// Drain [`walk_snapshots`] into a vector.
pub async fn collect_snapshots(
    endpoint: &Endpoint,
    inventory: &dyn Inventory,
) -> Result<Vec<SnapshotRecord>> {
    walk_snapshots(endpoint, inventory).try_collect().await
}
