//! Memtrace Analyzer CLI
//!
//! Attributes committed memory to call stacks from memory lifecycle event
//! traces and diffs snapshots to surface leaks and growth.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use memtrace_analyzer::commands::{
    execute_cpu_samples, execute_handles, execute_heap_events, execute_heap_snapshots,
    execute_virtual_alloc, validate_args, CpuSamplesArgs, HandlesArgs, HeapEventsArgs,
    HeapSnapshotsArgs, VirtualAllocArgs,
};
use memtrace_analyzer::output::read_report;
use memtrace_analyzer::utils::config::{
    DEFAULT_CPU_TOP_STACKS, DEFAULT_HEAP_TOP_STACKS, DEFAULT_MAX_STACK_COUNT, SCHEMA_VERSION,
};

/// Memtrace Analyzer - call-stack attribution for memory traces
#[derive(Parser, Debug)]
#[command(name = "memtrace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze virtual allocation events against snapshot instants
    VirtualAlloc {
        /// Path to the JSON event log
        #[arg(short, long)]
        events: PathBuf,

        /// Path to the JSON symbols file
        #[arg(short, long)]
        symbols: PathBuf,

        /// Target process id
        #[arg(short, long)]
        process: u32,

        /// Snapshot instants, nanoseconds since trace start (repeatable)
        #[arg(short = 't', long = "instant")]
        instants: Vec<u64>,

        /// Maximum number of reported stacks
        #[arg(long, default_value_t = DEFAULT_MAX_STACK_COUNT)]
        max_stacks: usize,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Match heap allocate/free events and report leaks and diagnostics
    HeapEvents {
        /// Path to the JSON heap event log
        #[arg(short, long)]
        events: PathBuf,

        /// Path to the JSON symbols file
        #[arg(short, long)]
        symbols: PathBuf,

        /// Target process id
        #[arg(short, long)]
        process: u32,

        /// Window start, nanoseconds since trace start
        #[arg(long)]
        start: Option<u64>,

        /// Window end, nanoseconds since trace start
        #[arg(long)]
        end: Option<u64>,

        /// Number of top stacks reported
        #[arg(long, default_value_t = DEFAULT_HEAP_TOP_STACKS)]
        top_stacks: usize,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "heap-report.json")]
        output: PathBuf,

        /// Log per-diagnostic detail and list no-stack events in the report
        #[arg(long)]
        debug: bool,
    },

    /// Analyze a pre-built heap snapshot series, one report per heap handle
    HeapSnapshots {
        /// Path to the JSON heap snapshot series
        #[arg(long)]
        snapshots: PathBuf,

        /// Target process id
        #[arg(short, long)]
        process: u32,

        /// Maximum number of reported stacks per handle
        #[arg(long, default_value_t = DEFAULT_MAX_STACK_COUNT)]
        max_stacks: usize,

        /// Output path for the JSON report array
        #[arg(short, long, default_value = "heap-snapshot-report.json")]
        output: PathBuf,
    },

    /// Aggregate CPU samples by call stack, ranked by total weight
    CpuSamples {
        /// Path to the JSON CPU sample log
        #[arg(long)]
        samples: PathBuf,

        /// Path to the JSON symbols file
        #[arg(short, long)]
        symbols: PathBuf,

        /// Target process id
        #[arg(short, long)]
        process: u32,

        /// Number of top stacks reported
        #[arg(long, default_value_t = DEFAULT_CPU_TOP_STACKS)]
        top_stacks: usize,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "cpu-report.json")]
        output: PathBuf,
    },

    /// Report handles missing a creating or closing stack
    Handles {
        /// Path to the JSON handle log
        #[arg(long)]
        handles: PathBuf,

        /// Path to the JSON symbols file
        #[arg(short, long)]
        symbols: PathBuf,

        /// Target process id
        #[arg(short, long)]
        process: u32,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "handle-report.json")]
        output: PathBuf,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::VirtualAlloc {
            events,
            symbols,
            process,
            instants,
            max_stacks,
            output,
            summary,
        } => {
            let args = VirtualAllocArgs {
                events,
                symbols,
                process_id: process,
                instants,
                max_stack_count: max_stacks,
                output,
                print_summary: summary,
            };
            validate_args(&args)?;
            execute_virtual_alloc(args)?;
        }

        Commands::HeapEvents {
            events,
            symbols,
            process,
            start,
            end,
            top_stacks,
            output,
            debug,
        } => {
            let window = match (start, end) {
                (Some(start), Some(end)) => Some((start, end)),
                (None, None) => None,
                _ => anyhow::bail!("--start and --end must be given together"),
            };
            execute_heap_events(HeapEventsArgs {
                events,
                symbols,
                process_id: process,
                window,
                top_stacks,
                output,
                debug,
            })?;
        }

        Commands::HeapSnapshots {
            snapshots,
            process,
            max_stacks,
            output,
        } => {
            execute_heap_snapshots(HeapSnapshotsArgs {
                snapshots,
                process_id: process,
                max_stack_count: max_stacks,
                output,
            })?;
        }

        Commands::CpuSamples {
            samples,
            symbols,
            process,
            top_stacks,
            output,
        } => {
            execute_cpu_samples(CpuSamplesArgs {
                samples,
                symbols,
                process_id: process,
                top_stacks,
                output,
            })?;
        }

        Commands::Handles {
            handles,
            symbols,
            process,
            output,
        } => {
            execute_handles(HandlesArgs {
                handles,
                symbols,
                process_id: process,
                output,
            })?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}

/// Validate a report JSON file
fn validate_report_file(file_path: PathBuf) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)?;

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Snapshots: {}", report.total_bytes.len());
    println!("  Activity stacks: {}", report.activity_stack_ids.len());
    println!("  Top usage stacks: {}", report.top_usage_stack_ids.len());
    println!("  Reported stacks: {}", report.stacks.len());

    Ok(())
}

/// Display version information
fn display_version() {
    println!("Memtrace Analyzer v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Call-stack attribution and snapshot diffing for memory traces.");
}
