//! Atomic results file writer
//!
//! Results are written to a temporary file next to the destination and then
//! renamed over it, so readers see either the previous file or the complete
//! new one.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::CardOutcome;
use crate::io::csv_format::write_results_csv;
use crate::types::CheckerError;

/// Write card outcomes to `path` atomically
pub fn write_results_file(path: &Path, outcomes: &[CardOutcome]) -> Result<(), CheckerError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_results_csv(outcomes, &mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| CheckerError::from(e.error))?;

    debug!(path = %path.display(), rows = outcomes.len(), "results written");
    Ok(())
}
