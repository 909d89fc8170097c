//! Tracing subscriber setup
//!
//! Configures the global tracing subscriber with:
//! - Console output on stderr, filtered by `RUST_LOG` (default `info`)
//! - A plain-text log file that is appended to across runs

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use vsnap_common::{Result, VsnapError};

pub const DEFAULT_LOG_FILE: &str = "snapshot_cleanup.log";

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub file: PathBuf,
    /// Console filter used when `RUST_LOG` is unset.
    pub console_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_LOG_FILE),
            console_filter: "info".to_string(),
        }
    }
}

pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            VsnapError::Config(format!("cannot open log file {}: {}", path.display(), e))
        })
}

/// `<timestamp> <LEVEL> <message>` lines without colours.
pub fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
}

/// Install the global subscriber. Must be called once, before any work is logged.
pub fn init(config: &LogConfig) -> Result<()> {
    let file = open_log_file(&config.file)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.console_filter));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer(file).with_filter(LevelFilter::INFO))
        .try_init()
        .map_err(|e| VsnapError::Internal(format!("failed to install tracing subscriber: {e}")))
}
