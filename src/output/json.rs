//! JSON report output writer.
//!
//! Writes report structs to JSON files with proper formatting.

use crate::diff::AnalysisReport;
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Write any report to a pretty-printed JSON file.
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_report<T: Serialize>(
    report: &T,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing report to: {}", output_path.display());

    // Create parent directories if needed
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report).map_err(OutputError::SerializationFailed)?;

    info!("Report written successfully");
    Ok(())
}

/// Read an analysis report back from a JSON file, used by `validate`.
pub fn read_report(path: impl AsRef<Path>) -> Result<AnalysisReport, OutputError> {
    let file = File::open(path.as_ref()).map_err(OutputError::ReadFailed)?;
    let report = serde_json::from_reader(BufReader::new(file))
        .map_err(OutputError::SerializationFailed)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::analyze;
    use crate::aggregator::StackInfoTable;

    #[test]
    fn test_write_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let report = analyze(Vec::new(), &StackInfoTable::new(), 100);
        write_report(&report, &path).unwrap();

        let loaded = read_report(&path).unwrap();
        assert_eq!(loaded.version, report.version);
        assert!(loaded.interval_diffs.is_empty());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/report.json");

        let report = analyze(Vec::new(), &StackInfoTable::new(), 100);
        write_report(&report, &path).unwrap();
        assert!(path.exists());
    }
}
