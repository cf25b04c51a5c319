//! Command Line Interface (CLI) arguments.

use crate::aggregate::DEFAULT_TOP_REGIONS;
use crate::models::MAX_TOP_REGIONS;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Output format of log events
#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Usage statistics server command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "USAGESTAT_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8000, env = "USAGESTAT_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "USAGESTAT_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/usagestat/certs/cert.pem",
        env = "USAGESTAT_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/usagestat/certs/key.pem",
        env = "USAGESTAT_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for requests to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "USAGESTAT_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Path to the CSV dataset, loaded once at startup
    #[arg(
        long,
        default_value = "data/processed/cleaned_merged.csv",
        env = "USAGESTAT_DATA_PATH"
    )]
    pub data_path: PathBuf,
    /// Whether to use Rayon for execution of aggregations.
    #[arg(long, default_value_t = false, env = "USAGESTAT_USE_RAYON")]
    pub use_rayon: bool,
    /// Number of regions returned by the top regions endpoint when no limit is requested
    #[arg(
        long,
        default_value_t = DEFAULT_TOP_REGIONS,
        value_parser = parse_top_regions_limit,
        env = "USAGESTAT_TOP_REGIONS_LIMIT"
    )]
    pub top_regions_limit: usize,
    /// Format of log output
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "USAGESTAT_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Parse and bound-check the default top regions limit.
fn parse_top_regions_limit(value: &str) -> Result<usize, String> {
    let limit: usize = value.parse().map_err(|err| format!("{err}"))?;
    if (1..=MAX_TOP_REGIONS).contains(&limit) {
        Ok(limit)
    } else {
        Err(format!("must be between 1 and {MAX_TOP_REGIONS}"))
    }
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
