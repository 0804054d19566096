//! Heap event matching command.

use crate::heap::{build_heap_report, read_heap_event_log, HeapMatcher, HeapReport};
use crate::output::write_report;
use crate::trace::{MapSymbolicator, TraceTimestamp};
use crate::utils::config::DEFAULT_HEAP_TOP_STACKS;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::path::PathBuf;

/// Arguments for the heap-events command
#[derive(Debug, Clone)]
pub struct HeapEventsArgs {
    /// Path to the JSON heap event log
    pub events: PathBuf,

    /// Path to the JSON symbols file
    pub symbols: PathBuf,

    /// Target process id
    pub process_id: u32,

    /// Optional matching window, nanoseconds since trace start
    pub window: Option<(u64, u64)>,

    /// Number of top stacks reported for allocs and frees
    pub top_stacks: usize,

    /// Output path for the JSON report
    pub output: PathBuf,

    /// Log per-diagnostic detail and list no-stack events in the report
    pub debug: bool,
}

impl Default for HeapEventsArgs {
    fn default() -> Self {
        Self {
            events: PathBuf::from("heap-events.json"),
            symbols: PathBuf::from("symbols.json"),
            process_id: 0,
            window: None,
            top_stacks: DEFAULT_HEAP_TOP_STACKS,
            output: PathBuf::from("heap-report.json"),
            debug: false,
        }
    }
}

/// Execute the heap-events command, returning the report it wrote
pub fn execute_heap_events(args: HeapEventsArgs) -> Result<HeapReport> {
    if let Some((start, end)) = args.window {
        if start > end {
            bail!("window start {start} is after window end {end}");
        }
        info!("StartTime: {start}, EndTime: {end}");
    }

    let events = read_heap_event_log(&args.events, args.process_id)
        .context("Failed to read heap event log")?;
    info!("Total heap events: {}", events.len());

    let symbolicator = MapSymbolicator::from_file(&args.symbols)
        .context("Failed to read symbols file")?;

    let mut matcher = match args.window {
        Some((start, end)) => {
            HeapMatcher::with_window(TraceTimestamp(start), TraceTimestamp(end))
        }
        None => HeapMatcher::new(),
    };
    for event in &events {
        matcher.apply(*event);
    }

    if args.debug {
        for diagnostic in matcher.unexpected() {
            debug!("unexpected event: {:?}", diagnostic);
        }
    }

    info!("Aggregating stacks for allocs and frees");
    let report = build_heap_report(&matcher, &symbolicator, args.top_stacks, args.debug);

    write_report(&report, &args.output).context("Failed to write heap report")?;
    Ok(report)
}
