//! Handle analysis command.

use crate::handles::{build_handle_report, read_handle_log, HandleReport};
use crate::output::write_report;
use crate::trace::MapSymbolicator;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

/// Arguments for the handles command
#[derive(Debug, Clone)]
pub struct HandlesArgs {
    /// Path to the JSON handle log
    pub handles: PathBuf,

    /// Path to the JSON symbols file
    pub symbols: PathBuf,

    /// Target process id
    pub process_id: u32,

    /// Output path for the JSON report
    pub output: PathBuf,
}

impl Default for HandlesArgs {
    fn default() -> Self {
        Self {
            handles: PathBuf::from("handles.json"),
            symbols: PathBuf::from("symbols.json"),
            process_id: 0,
            output: PathBuf::from("handle-report.json"),
        }
    }
}

/// Execute the handles command, returning the report it wrote
pub fn execute_handles(args: HandlesArgs) -> Result<HandleReport> {
    let records = read_handle_log(&args.handles).context("Failed to read handle log")?;

    let symbolicator = MapSymbolicator::from_file(&args.symbols)
        .context("Failed to read symbols file")?;

    let report = build_handle_report(&records, args.process_id, &symbolicator);
    info!("Reported handles: {}", report.handles.len());

    write_report(&report, &args.output).context("Failed to write handle report")?;
    Ok(report)
}
