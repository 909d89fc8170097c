use std::io::Write;

use tracing::{error, info};
use vsnap_common::{EndpointCredential, Result, SnapshotRecord};

use crate::connector::{connect_all, Connector, EndpointSession};
use crate::report::{self, OutputFormat};
use crate::walker::collect_snapshots;

/// Snapshots of one open endpoint; listing failures are logged and yield nothing.
pub(crate) async fn gather(session: &EndpointSession) -> Vec<SnapshotRecord> {
    match collect_snapshots(&session.endpoint, session.inventory.as_ref()).await {
        Ok(records) => records,
        Err(e) => {
            error!("Error retrieving VMs from {}: {}", session.endpoint, e);
            Vec::new()
        }
    }
}

/// List every snapshot on every reachable endpoint and print the table.
///
/// Each session is logged out as soon as its endpoint has been walked. Returns
/// the rows in display order.
pub async fn run_list<W: Write>(
    connector: &dyn Connector,
    credentials: &[EndpointCredential],
    format: OutputFormat,
    output: &mut W,
) -> Result<Vec<SnapshotRecord>> {
    let sessions = connect_all(connector, credentials).await.require_any()?;

    let mut records = Vec::new();
    for session in sessions {
        records.extend(gather(&session).await);
        session.logout().await;
    }

    report::sort_for_listing(&mut records);
    report::write_listing(output, &records, format)?;
    info!("Listed {} snapshots", records.len());
    Ok(records)
}
