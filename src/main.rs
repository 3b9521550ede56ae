//! Visa Gift Card Balance Checker CLI
//!
//! Command-line interface for checking gift card balances listed in a CSV file.
//!
//! # Usage
//!
//! ```bash
//! cargo run
//! cargo run -- -i my_cards.csv -o results.csv
//! cargo run -- --threads 4 --shutdown immediate
//! cargo run -- --sample
//! ```
//!
//! The program reads card rows from the input file, checks every card against
//! the issuer's portal, prints one line per card as it completes, and writes
//! all results to the output file.
//!
//! # Exit Codes
//!
//! - 0: Success, including runs with failed cards or an interrupt
//! - 1: Error (input file missing or unreadable, output not writable, etc.)

use std::process;

use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use visa_balance_checker::cli::{self, SAMPLE_FILE_NAME};
use visa_balance_checker::{BalanceRunner, CheckerError};

fn main() {
    // Parse command-line arguments using clap
    let args = cli::parse_args();

    init_tracing(&args.log_level);

    if args.sample {
        println!("Sample file should be named: {}", SAMPLE_FILE_NAME);
        return;
    }

    let runner = match BalanceRunner::from_config(args.to_client_config(), args.to_checker_config())
    {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    // Results table goes to stdout, diagnostics to stderr
    let mut console = std::io::stdout();
    if let Err(e) = runner.process(&args.input_file, &args.output_file, &mut console) {
        error!("run failed: {}", e);
        match e {
            CheckerError::FileNotFound { .. } => eprintln!(
                "\"{}\" is not found.\nPlease make a copy from \"{}\".",
                args.input_file.display(),
                SAMPLE_FILE_NAME
            ),
            other => eprintln!("Error: {}", other),
        }
        process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
