//! Console output for snapshot listings and cleanup candidates.
//!
//! Tables use a bordered grid:
//!
//! ```text
//! +---------+------+
//! | vCenter | VM   |
//! +=========+======+
//! | vc1     | db01 |
//! +---------+------+
//! ```

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use vsnap_common::SnapshotRecord;

pub const EMPTY_LISTING: &str = "No snapshots found across all vCenters.";
pub const NO_CANDIDATES: &str = "No snapshots older than the specified age were found.";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Trait for rows that can be rendered as a grid table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One line of the snapshot listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    pub vcenter: String,
    pub vm: String,
    pub snapshot: String,
    pub created_at: DateTime<Utc>,
}

impl From<&SnapshotRecord> for SnapshotRow {
    fn from(record: &SnapshotRecord) -> Self {
        Self {
            vcenter: record.vm.endpoint.host.clone(),
            vm: record.vm.name.clone(),
            snapshot: record.name.clone(),
            created_at: record.created_at,
        }
    }
}

impl TableDisplay for SnapshotRow {
    fn headers() -> Vec<&'static str> {
        vec!["vCenter", "VM", "Snapshot Name", "Creation Date"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.vcenter.clone(),
            self.vm.clone(),
            self.snapshot.clone(),
            self.created_at.format(DATE_FORMAT).to_string(),
        ]
    }
}

/// One line of the cleanup candidate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRow {
    #[serde(flatten)]
    pub snapshot: SnapshotRow,
    pub age_days: i64,
}

impl CandidateRow {
    pub fn new(record: &SnapshotRecord, now: DateTime<Utc>) -> Self {
        Self {
            snapshot: SnapshotRow::from(record),
            age_days: record.age_days(now),
        }
    }
}

impl TableDisplay for CandidateRow {
    fn headers() -> Vec<&'static str> {
        vec!["vCenter", "VM", "Snapshot Name", "Creation Date", "Age (days)"]
    }

    fn row(&self) -> Vec<String> {
        let mut row = self.snapshot.row();
        row.push(self.age_days.to_string());
        row
    }
}

/// Sort by (vCenter, VM) keeping walk order within a VM.
pub fn sort_for_listing(records: &mut [SnapshotRecord]) {
    records.sort_by(|a, b| {
        a.vm.endpoint
            .host
            .cmp(&b.vm.endpoint.host)
            .then_with(|| a.vm.name.cmp(&b.vm.name))
    });
}

pub fn render_grid(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let rule = |fill: char| -> String {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };
    let line = |cells: &[String]| -> String {
        let mut out = String::from("|");
        for (i, width) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            out.push_str(&format!(" {:<width$} |", cell, width = width));
        }
        out.push('\n');
        out
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut out = rule('-');
    out.push_str(&line(&header_cells));
    out.push_str(&rule('='));
    for row in rows {
        out.push_str(&line(row));
        out.push_str(&rule('-'));
    }
    out
}

/// Write items in the requested format; an empty table writes nothing.
pub fn write_items<T, W>(out: &mut W, items: &[T], format: OutputFormat) -> io::Result<()>
where
    T: TableDisplay + Serialize,
    W: Write,
{
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                return Ok(());
            }
            let rows: Vec<Vec<String>> = items.iter().map(TableDisplay::row).collect();
            out.write_all(render_grid(&T::headers(), &rows).as_bytes())
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, items)?;
            writeln!(out)
        }
    }
}

/// Print the full snapshot listing, or the empty-inventory message.
pub fn write_listing<W: Write>(
    out: &mut W,
    records: &[SnapshotRecord],
    format: OutputFormat,
) -> io::Result<()> {
    if records.is_empty() && format == OutputFormat::Table {
        return writeln!(out, "{EMPTY_LISTING}");
    }
    let rows: Vec<SnapshotRow> = records.iter().map(SnapshotRow::from).collect();
    write_items(out, &rows, format)
}

pub fn write_candidates<W: Write>(
    out: &mut W,
    candidates: &[SnapshotRecord],
    now: DateTime<Utc>,
    format: OutputFormat,
) -> io::Result<()> {
    if candidates.is_empty() && format == OutputFormat::Table {
        return writeln!(out, "{NO_CANDIDATES}");
    }
    let rows: Vec<CandidateRow> = candidates
        .iter()
        .map(|record| CandidateRow::new(record, now))
        .collect();
    if format == OutputFormat::Table {
        writeln!(out, "Snapshots to be deleted:")?;
    }
    write_items(out, &rows, format)
}
