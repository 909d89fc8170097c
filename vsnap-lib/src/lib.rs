//! Snapshot inventory and cleanup across several vCenter servers.
//!
//! The pipeline is: [`config`] resolves `VCENTER{N}_*` credentials,
//! [`connector`] opens one session per reachable endpoint, [`walker`] flattens
//! each endpoint's snapshot trees into records, and [`lister`] or [`cleanup`]
//! report on or remove them.

pub mod cleanup;
pub mod config;
pub mod connector;
pub mod filter;
pub mod inventory;
pub mod lister;
pub mod logging;
pub mod memory;
pub mod prompt;
pub mod report;
pub mod walker;

pub use cleanup::{run_cleanup, AgeSource, CleanupOptions, CleanupOutcome};
pub use connector::{connect_all, ConnectOptions, Connector, Sessions, VsphereConnector};
pub use filter::AgeThreshold;
pub use inventory::{Inventory, VmRef};
pub use lister::run_list;
pub use report::OutputFormat;
pub use vsnap_common::{Result, VsnapError};
