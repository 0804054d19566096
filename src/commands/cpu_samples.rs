//! CPU sample analysis command.

use crate::cpu::{build_cpu_report, read_cpu_samples, CpuReport};
use crate::output::write_report;
use crate::trace::MapSymbolicator;
use crate::utils::config::DEFAULT_CPU_TOP_STACKS;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

/// Arguments for the cpu-samples command
#[derive(Debug, Clone)]
pub struct CpuSamplesArgs {
    /// Path to the JSON CPU sample log
    pub samples: PathBuf,

    /// Path to the JSON symbols file
    pub symbols: PathBuf,

    /// Target process id
    pub process_id: u32,

    /// Number of top stacks reported
    pub top_stacks: usize,

    /// Output path for the JSON report
    pub output: PathBuf,
}

impl Default for CpuSamplesArgs {
    fn default() -> Self {
        Self {
            samples: PathBuf::from("cpu-samples.json"),
            symbols: PathBuf::from("symbols.json"),
            process_id: 0,
            top_stacks: DEFAULT_CPU_TOP_STACKS,
            output: PathBuf::from("cpu-report.json"),
        }
    }
}

/// Execute the cpu-samples command, returning the report it wrote
pub fn execute_cpu_samples(args: CpuSamplesArgs) -> Result<CpuReport> {
    let samples = read_cpu_samples(&args.samples, args.process_id)
        .context("Failed to read CPU sample log")?;

    let symbolicator = MapSymbolicator::from_file(&args.symbols)
        .context("Failed to read symbols file")?;

    info!("Aggregating {} CPU samples", samples.len());
    let report = build_cpu_report(&samples, &symbolicator, args.top_stacks);

    write_report(&report, &args.output).context("Failed to write CPU report")?;
    Ok(report)
}
