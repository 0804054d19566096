//! Heap snapshot series analysis command.
//!
//! Runs the diff engine once per heap handle found in a pre-built snapshot
//! series and writes the reports as one JSON array.

use crate::aggregator::{build_handle_series, read_heap_snapshots};
use crate::diff::{analyze, AnalysisReport};
use crate::output::write_report;
use crate::utils::config::DEFAULT_MAX_STACK_COUNT;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

/// Arguments for the heap-snapshots command
#[derive(Debug, Clone)]
pub struct HeapSnapshotsArgs {
    /// Path to the JSON heap snapshot series
    pub snapshots: PathBuf,

    /// Target process id
    pub process_id: u32,

    /// Maximum number of stacks reported per handle
    pub max_stack_count: usize,

    /// Output path for the JSON report array
    pub output: PathBuf,
}

impl Default for HeapSnapshotsArgs {
    fn default() -> Self {
        Self {
            snapshots: PathBuf::from("heap-snapshots.json"),
            process_id: 0,
            max_stack_count: DEFAULT_MAX_STACK_COUNT,
            output: PathBuf::from("heap-snapshot-report.json"),
        }
    }
}

/// Execute the heap-snapshots command, returning the per-handle reports
pub fn execute_heap_snapshots(args: HeapSnapshotsArgs) -> Result<Vec<AnalysisReport>> {
    let records = read_heap_snapshots(&args.snapshots)
        .context("Failed to read heap snapshot series")?;

    let by_handle = build_handle_series(&records, args.process_id);
    info!("Analyzing {} heap handles", by_handle.len());

    let reports: Vec<AnalysisReport> = by_handle
        .into_values()
        .map(|series| analyze(series.snapshots, &series.stack_table, args.max_stack_count))
        .collect();

    write_report(&reports, &args.output).context("Failed to write heap snapshot reports")?;
    Ok(reports)
}
