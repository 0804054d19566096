//! Virtual allocation analysis command.
//!
//! The virtual-alloc command:
//! 1. Reads the event log and symbols file
//! 2. Replays the log against the requested snapshot instants
//! 3. Finalizes per-snapshot attributions
//! 4. Runs the diff and ranking engine
//! 5. Writes the report JSON

use crate::aggregator::{finalize_snapshot, StackInfoTable};
use crate::diff::{analyze, AnalysisReport};
use crate::output::write_report;
use crate::replay::replay;
use crate::trace::{read_event_log, MapSymbolicator, TraceTimestamp};
use crate::utils::config::DEFAULT_MAX_STACK_COUNT;
use anyhow::{bail, Context, Result};
use log::info;
use std::path::PathBuf;

/// Arguments for the virtual-alloc command
#[derive(Debug, Clone)]
pub struct VirtualAllocArgs {
    /// Path to the JSON event log
    pub events: PathBuf,

    /// Path to the JSON symbols file
    pub symbols: PathBuf,

    /// Target process id (the log may contain other processes)
    pub process_id: u32,

    /// Snapshot instants, nanoseconds since trace start
    pub instants: Vec<u64>,

    /// Maximum number of stacks reported by the diff engine
    pub max_stack_count: usize,

    /// Output path for the JSON report
    pub output: PathBuf,

    /// Print a text summary to stdout
    pub print_summary: bool,
}

impl Default for VirtualAllocArgs {
    fn default() -> Self {
        Self {
            events: PathBuf::from("events.json"),
            symbols: PathBuf::from("symbols.json"),
            process_id: 0,
            instants: Vec::new(),
            max_stack_count: DEFAULT_MAX_STACK_COUNT,
            output: PathBuf::from("report.json"),
            print_summary: false,
        }
    }
}

/// Validate arguments before doing any work
pub fn validate_args(args: &VirtualAllocArgs) -> Result<()> {
    if !args.events.exists() {
        bail!("event log not found: {}", args.events.display());
    }
    if !args.symbols.exists() {
        bail!("symbols file not found: {}", args.symbols.display());
    }
    if args.max_stack_count == 0 {
        bail!("max stack count must be at least 1");
    }
    Ok(())
}

/// Execute the virtual-alloc command, returning the report it wrote
pub fn execute_virtual_alloc(args: VirtualAllocArgs) -> Result<AnalysisReport> {
    info!("FilePath: {}", args.events.display());
    info!("ProcessId: {}", args.process_id);

    // Latest instant first, matching the historical analyzer: the total diff
    // then reads latest minus earliest, i.e. growth over the series.
    let mut instants: Vec<TraceTimestamp> =
        args.instants.iter().map(|&n| TraceTimestamp(n)).collect();
    instants.sort_by(|a, b| b.cmp(a));
    info!("SnapshotTimestamps:");
    for instant in &instants {
        info!("{instant}");
    }

    info!("Step 1/4: Reading event log...");
    let events = read_event_log(&args.events, args.process_id)
        .context("Failed to read event log")?;
    info!("Total virtual allocations: {}", events.len());

    let symbolicator = MapSymbolicator::from_file(&args.symbols)
        .context("Failed to read symbols file")?;

    info!("Step 2/4: Replaying events...");
    let buckets =
        replay(&events, &instants, &symbolicator).context("Failed to replay event log")?;

    info!("Step 3/4: Aggregating stacks...");
    let mut stack_table = StackInfoTable::new();
    let snapshots = buckets
        .iter()
        .map(|bucket| finalize_snapshot(bucket, &symbolicator, &mut stack_table))
        .collect();

    info!("Step 4/4: Analyzing...");
    let report = analyze(snapshots, &stack_table, args.max_stack_count);

    write_report(&report, &args.output).context("Failed to write report")?;

    if args.print_summary {
        print_summary(&report);
    }

    Ok(report)
}

fn print_summary(report: &AnalysisReport) {
    println!("Total diff: {} bytes", report.total_diff.total_bytes);
    println!(
        "  heap-internal: {} bytes, unknown: {} bytes",
        report.total_diff.heap_committed, report.total_diff.unknown_committed
    );
    println!("Activity stacks: {}", report.activity_stack_ids.len());
    println!("Top usage stacks: {}", report.top_usage_stack_ids.len());
    println!("Snapshots: {}", report.total_bytes.len());
}
