//! Aggregation of replayed buckets into per-snapshot attributions.
//!
//! This module turns the replayer's raw per-instant state into:
//! - `SnapshotInfo` records (per-stack byte/count totals plus bucket totals)
//! - a global `StackInfoTable` (stack text, min/max single-allocation size)
//! - per-heap-handle snapshot series built from pre-existing heap snapshots

pub mod heap_series;
pub mod snapshot;

// Re-export main types and functions
pub use heap_series::{build_handle_series, read_heap_snapshots, HandleSeries, HeapSnapshotRecord};
pub use snapshot::{finalize_snapshot, SnapshotInfo, StackByteCount, StackInfo, StackInfoTable};
