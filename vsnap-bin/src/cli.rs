use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vsnap_lib::cleanup::{AgeSource, CleanupOptions};
use vsnap_lib::config::DEFAULT_MAX_ENDPOINTS;
use vsnap_lib::connector::{ConnectOptions, DEFAULT_API_RELEASE};
use vsnap_lib::filter::{AgeThreshold, DEFAULT_AGE_DAYS};
use vsnap_lib::logging::{LogConfig, DEFAULT_LOG_FILE};
use vsnap_lib::report;
use vsnap_lib::Result;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl From<OutputFormat> for report::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => report::OutputFormat::Table,
            OutputFormat::Json => report::OutputFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(name = "vsnap")]
#[command(about = "List and clean up VM snapshots across vCenter servers", long_about = None)]
pub struct Cli {
    /// Extra env file with VCENTER{N}_HOST/_USER/_PASSWORD entries
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, global = true, env = "VSNAP_INSECURE")]
    pub insecure: bool,

    /// Log file, appended to on every run
    #[arg(long, global = true, env = "VSNAP_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Highest N probed for VCENTER{N}_* variables
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ENDPOINTS)]
    pub max_endpoints: u32,

    /// HTTP timeout in seconds
    #[arg(long, global = true, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// vim25 JSON API release
    #[arg(long, global = true, default_value = DEFAULT_API_RELEASE)]
    pub api_release: String,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every snapshot on every configured vCenter
    List,
    /// Delete snapshots older than a given age after confirmation
    Cleanup(CleanupArgs),
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Age of snapshots to delete (in days)
    #[arg(short, long, default_value_t = DEFAULT_AGE_DAYS, value_parser = clap::value_parser!(u32).range(1..))]
    pub age: u32,

    /// Prompt for the age instead of using --age
    #[arg(long, conflicts_with = "age")]
    pub ask_age: bool,

    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            file: self.log_file.clone(),
            ..LogConfig::default()
        }
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            insecure: self.insecure,
            timeout: Duration::from_secs(self.timeout),
            api_release: self.api_release.clone(),
            ..ConnectOptions::default()
        }
    }
}

impl CleanupArgs {
    pub fn options(&self, format: OutputFormat) -> Result<CleanupOptions> {
        let age = if self.ask_age {
            AgeSource::Ask
        } else {
            AgeSource::Fixed(AgeThreshold::days(self.age)?)
        };
        Ok(CleanupOptions {
            age,
            assume_yes: self.yes,
            format: format.into(),
        })
    }
}
