use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use tracing::{error, info};
use vsnap_common::{EndpointCredential, Result, SnapshotRecord};

use crate::connector::{connect_all, Connector, Sessions};
use crate::filter::{deletion_order, select_candidates, AgeThreshold};
use crate::lister::gather;
use crate::prompt::{self, AgeAnswer};
use crate::report::{self, OutputFormat};

/// Where the age threshold comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeSource {
    Fixed(AgeThreshold),
    /// Ask on the terminal before connecting.
    Ask,
}

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub age: AgeSource,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
    pub format: OutputFormat,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            age: AgeSource::Fixed(AgeThreshold::default()),
            assume_yes: false,
            format: OutputFormat::Table,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanupOutcome {
    pub threshold: Option<AgeThreshold>,
    pub candidates: Vec<SnapshotRecord>,
    pub confirmed: bool,
    pub deleted: Vec<SnapshotRecord>,
    pub failed: Vec<SnapshotRecord>,
}

/// Find snapshots older than the threshold on every reachable endpoint, show
/// them, ask once, then delete them.
///
/// A declined confirmation or a quit at the age prompt is not an error. All
/// sessions are logged out before returning, whatever the outcome.
pub async fn run_cleanup<R, W>(
    connector: &dyn Connector,
    credentials: &[EndpointCredential],
    options: &CleanupOptions,
    now: DateTime<Utc>,
    input: &mut R,
    output: &mut W,
) -> Result<CleanupOutcome>
where
    R: BufRead,
    W: Write,
{
    let threshold = match options.age {
        AgeSource::Fixed(threshold) => threshold,
        AgeSource::Ask => match prompt::ask_age(input, output)? {
            AgeAnswer::Days(days) => AgeThreshold::days(days)?,
            AgeAnswer::Quit => {
                info!("Snapshot cleanup cancelled.");
                return Ok(CleanupOutcome::default());
            }
        },
    };
    info!("Removing snapshots older than {} days", threshold.as_days());

    let sessions = connect_all(connector, credentials).await.require_any()?;
    let result = cleanup_sessions(&sessions, threshold, options, now, input, output).await;
    sessions.logout_all().await;

    if result.is_ok() {
        info!("Snapshot cleanup completed.");
    }
    result
}

async fn cleanup_sessions<R: BufRead, W: Write>(
    sessions: &Sessions,
    threshold: AgeThreshold,
    options: &CleanupOptions,
    now: DateTime<Utc>,
    input: &mut R,
    output: &mut W,
) -> Result<CleanupOutcome> {
    let mut records = Vec::new();
    for session in sessions.iter() {
        records.extend(gather(session).await);
    }

    let mut outcome = CleanupOutcome {
        threshold: Some(threshold),
        candidates: select_candidates(&records, threshold, now),
        ..CleanupOutcome::default()
    };
    report::write_candidates(output, &outcome.candidates, now, options.format)?;
    if outcome.candidates.is_empty() {
        return Ok(outcome);
    }

    outcome.confirmed = options.assume_yes || prompt::confirm(input, output)?;
    if !outcome.confirmed {
        info!("Deletion aborted by user.");
        return Ok(outcome);
    }

    for record in deletion_order(&outcome.candidates) {
        if delete(sessions, record).await {
            outcome.deleted.push(record.clone());
        } else {
            outcome.failed.push(record.clone());
        }
    }

    if options.format == OutputFormat::Table {
        writeln!(
            output,
            "Deleted {} snapshot(s), {} failed.",
            outcome.deleted.len(),
            outcome.failed.len()
        )?;
    }
    Ok(outcome)
}

async fn delete(sessions: &Sessions, record: &SnapshotRecord) -> bool {
    info!(
        "Attempting to delete snapshot '{}' from VM '{}'...",
        record.name, record.vm.name
    );
    let Some(session) = sessions.get(record.endpoint().index) else {
        error!(
            "Error deleting snapshot '{}': no open session for {}",
            record.name,
            record.endpoint()
        );
        return false;
    };
    match session.inventory.remove_snapshot(&record.id).await {
        Ok(()) => {
            info!("Successfully deleted snapshot '{}'.", record.name);
            true
        }
        Err(e) => {
            error!("Error deleting snapshot '{}': {}", record.name, e);
            false
        }
    }
}
