//! Memtrace Analyzer
//!
//! Attribution of committed memory bytes to call stacks from a chronological
//! log of memory lifecycle events, with snapshot diffing to surface the call
//! stacks responsible for growth or shrinkage over time.
//!
//! This crate provides the core implementation for the `memtrace` CLI tool.
//!
//! ## Pipeline
//!
//! Event log -> [`replay`] (per-instant buckets) -> [`aggregator`]
//! (per-snapshot attributions) -> [`diff`] (ranked report).
//! [`ranges`] is the passive interval store the replayer drives; [`trace`]
//! holds the event model and the symbolication seam; [`heap`] matches heap
//! allocate/free pairs and keeps trace corruption visible.

pub mod aggregator;
pub mod commands;
pub mod cpu;
pub mod diff;
pub mod handles;
pub mod heap;
pub mod output;
pub mod ranges;
pub mod replay;
pub mod trace;
pub mod utils;
