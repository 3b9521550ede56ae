//! CSV format handling for card input rows and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - Conversion from input rows to `CardRecord`s
//! - Output row serialization for the results file
//! - The console table lines printed as cards complete
//!
//! All functions are pure (no I/O) for easy testing.

use std::io::Write;

use csv::WriterBuilder;

use crate::core::CardOutcome;
use crate::types::{CardRecord, CheckerError};

/// Column titles shared by the output file and the console table
pub const RESULT_COLUMNS: [&str; 5] = ["Last 4", "Available", "Initial", "Cashback", "Override"];

/// Separator between console table columns
pub const CONSOLE_SEPARATOR: &str = "  ";

/// Convert one input row to a CardRecord
///
/// Rows hold card number, month, year, cvv, postal code and an optional
/// trailing note. Any other field count is rejected. Field values are handed
/// to validation as-is; a row with bad values still yields a (rejected) card.
///
/// # Returns
///
/// Result containing either:
/// - Ok(CardRecord) - Card built from the row, valid or locally rejected
/// - Err(String) - The row does not have the expected shape
pub fn convert_csv_record<'a, I>(fields: I) -> Result<CardRecord, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let fields: Vec<&str> = fields.into_iter().collect();

    match fields.as_slice() {
        [number, month, year, cvv, postal] | [number, month, year, cvv, postal, _] => {
            Ok(CardRecord::new(number, month, year, cvv, postal))
        }
        _ => Err(format!(
            "expected 5 or 6 fields, found {}",
            fields.len()
        )),
    }
}

/// Output fields for one card
///
/// Valid cards give the five amount columns; failed cards give the last four
/// digits and the error reason.
pub fn result_fields(card: &CardRecord) -> Vec<String> {
    match card.error_message() {
        Some(message) => vec![card.last_four().to_string(), format!("ERROR: {}", message)],
        None => {
            let balance = &card.balance;
            vec![
                card.last_four().to_string(),
                format!("{:.2}", balance.available_balance),
                format!("{:.2}", balance.initial_balance),
                format!("{:.2}", balance.cashback_total),
                format!("{:.2}", balance.override_total),
            ]
        }
    }
}

/// Console table header and its underline
pub fn console_header() -> (String, String) {
    let header = RESULT_COLUMNS.join(CONSOLE_SEPARATOR);
    let underline = "=".repeat(header.len());
    (header, underline)
}

/// Console table line for one finished card
pub fn console_line(card: &CardRecord) -> String {
    result_fields(card).join(CONSOLE_SEPARATOR)
}

/// Write card outcomes to CSV format
///
/// Writes the header followed by one row per outcome. Outcomes are sorted by
/// input row for deterministic output, whatever order they completed in.
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(CheckerError::Csv)` if a write error occurred
pub fn write_results_csv(
    outcomes: &[CardOutcome],
    output: &mut dyn Write,
) -> Result<(), CheckerError> {
    // Error rows are shorter than balance rows
    let mut writer = WriterBuilder::new().flexible(true).from_writer(output);

    writer.write_record(RESULT_COLUMNS)?;

    let mut sorted: Vec<&CardOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|outcome| outcome.row);

    for outcome in sorted {
        writer.write_record(result_fields(&outcome.card))?;
    }

    writer.flush()?;

    Ok(())
}
