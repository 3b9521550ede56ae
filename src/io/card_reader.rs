//! Asynchronous CSV reader for card input files
//!
//! Provides a streaming interface over the rows of a card file.
//!
//! # Design
//!
//! The CardReader uses:
//! - csv-async for streaming CSV parsing
//! - a flexible, trimming reader so rows of 5 or 6 fields both parse
//! - `csv_format::convert_csv_record` for row to card conversion
//!
//! ```text
//! CSV file → CardReader → (row index, CardRecord)
//!                 ↓
//!          csv_format module
//!          (convert_csv_record)
//! ```
//!
//! Every data row gets a 1-based index, counting rows that are skipped, so
//! indices always match positions in the input.

use std::path::Path;

use csv_async::{AsyncReaderBuilder, ErrorKind, StringRecord};
use futures::io::AsyncRead;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::warn;

use crate::io::csv_format::convert_csv_record;
use crate::types::{CardRecord, CheckerError};

/// Asynchronous card file reader
pub struct CardReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncReader<R>,
    row: usize,
}

impl CardReader<Compat<tokio::fs::File>> {
    /// Open a card file from disk
    ///
    /// A missing file is reported as `CheckerError::FileNotFound`.
    pub async fn open(path: &Path) -> Result<Self, CheckerError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CheckerError::file_not_found(path.display().to_string())
            } else {
                CheckerError::from(e)
            }
        })?;

        // Wrap tokio file in a compatibility layer for csv-async
        Ok(Self::new(file.compat()))
    }
}

impl<R: AsyncRead + Unpin + Send> CardReader<R> {
    /// Create a new CardReader from an async reader
    ///
    /// The first row is taken as the header and skipped.
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_reader(reader);

        Self { csv_reader, row: 0 }
    }

    /// Read the next card
    ///
    /// Rows that cannot be turned into a card are logged and skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((row, card)))` for the next card, valid or rejected
    /// * `Ok(None)` at end of file
    /// * `Err(CheckerError::Io)` if the underlying reader fails
    pub async fn next_card(&mut self) -> Result<Option<(usize, CardRecord)>, CheckerError> {
        let mut record = StringRecord::new();

        loop {
            let read = self.csv_reader.read_record(&mut record).await;
            match read {
                Ok(false) => return Ok(None),
                Ok(true) => {
                    self.row += 1;
                    match convert_csv_record(record.iter()) {
                        Ok(card) => return Ok(Some((self.row, card))),
                        Err(e) => warn!(row = self.row, "skipping malformed row: {}", e),
                    }
                }
                Err(e) => {
                    if let ErrorKind::Io(_) = e.kind() {
                        return Err(e.into());
                    }
                    self.row += 1;
                    warn!(row = self.row, "CSV parse error: {}", e);
                }
            }
        }
    }

    /// Read every remaining card
    pub async fn read_all(&mut self) -> Result<Vec<(usize, CardRecord)>, CheckerError> {
        let mut cards = Vec::new();
        while let Some(card) = self.next_card().await? {
            cards.push(card);
        }
        Ok(cards)
    }
}
