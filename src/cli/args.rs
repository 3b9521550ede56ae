use crate::core::{CheckerConfig, ClientConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Default input file name
pub const DEFAULT_INPUT: &str = "cards.csv";

/// Default output file name
pub const DEFAULT_OUTPUT: &str = "valid_cards.csv";

/// Name of the sample input file shipped alongside the tool
pub const SAMPLE_FILE_NAME: &str = "cards.sample.csv";

/// Check balances of Visa gift cards listed in a CSV file
#[derive(Parser, Debug)]
#[command(name = "balance-checker")]
#[command(
    about = "Process a CSV of Visa gift cards, retrieve balances, and write the results to an output file",
    long_about = None
)]
pub struct CliArgs {
    /// Input CSV file with one card per row
    #[arg(short = 'i', long = "input", value_name = "FILE", default_value = DEFAULT_INPUT)]
    pub input_file: PathBuf,

    /// Output CSV file for the results
    #[arg(short = 'o', long = "output", value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    pub output_file: PathBuf,

    /// Print the sample file name and exit
    #[arg(long = "sample")]
    pub sample: bool,

    /// Number of concurrent lookups
    #[arg(
        long = "threads",
        value_name = "COUNT",
        help = "Number of concurrent lookups (default: CPU cores)"
    )]
    pub threads: Option<usize>,

    /// What happens to in-flight lookups on Ctrl+C
    #[arg(
        long = "shutdown",
        value_name = "MODE",
        default_value = "graceful",
        help = "On interrupt: 'graceful' waits for in-flight cards, 'immediate' abandons them"
    )]
    pub shutdown: ShutdownMode,

    /// Request timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Accept invalid TLS certificates (debugging only)
    #[arg(long = "insecure")]
    pub insecure: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}

/// Behaviour of in-flight lookups when a run is interrupted
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ShutdownMode {
    /// Stop submitting, let in-flight lookups finish
    Graceful,
    /// Stop submitting and abort in-flight lookups
    Immediate,
}

impl CliArgs {
    /// Create a CheckerConfig from CLI arguments
    ///
    /// Missing values fall back to defaults; a zero thread count is replaced
    /// with the default and a warning is logged.
    pub fn to_checker_config(&self) -> CheckerConfig {
        match self.threads {
            Some(threads) => CheckerConfig::new(threads, self.shutdown),
            None => CheckerConfig {
                shutdown: self.shutdown,
                ..CheckerConfig::default()
            },
        }
    }

    /// Create a ClientConfig from CLI arguments
    pub fn to_client_config(&self) -> ClientConfig {
        let default = ClientConfig::default();
        ClientConfig::new(
            &default.base_url,
            self.timeout.unwrap_or(default.timeout_seconds),
            self.insecure,
        )
    }
}
