// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, ShutdownMode, DEFAULT_INPUT, DEFAULT_OUTPUT, SAMPLE_FILE_NAME};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// If parsing fails (e.g., invalid arguments or the --help flag), clap
/// displays an error message or help text and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
