//! I/O module
//!
//! Handles reading card files and writing results.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, output rows, console table)
//! - `card_reader` - Asynchronous card file reader
//! - `output` - Atomic results file writer

pub mod card_reader;
pub mod csv_format;
pub mod output;

pub use card_reader::CardReader;
pub use csv_format::{console_header, console_line, convert_csv_record, write_results_csv};
pub use output::write_results_file;
