//! Schema definitions for analysis reports.
//!
//! Defines the structures written to the report JSON: the cross-snapshot
//! total diff, per-snapshot interval diffs, ranked stack id lists and
//! per-stack detail records.

use crate::trace::TraceTimestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Byte deltas between two snapshots, per field and per activity stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRecord {
    /// Timestamp of the minuend snapshot
    pub timestamp: TraceTimestamp,

    /// Change in total committed bytes
    pub total_bytes: i64,

    /// Change in heap-internal-committed bytes
    pub heap_committed: i64,

    /// Change in unknown-committed bytes
    pub unknown_committed: i64,

    /// Per-activity-stack byte deltas
    pub by_stack: BTreeMap<String, i64>,
}

impl DiffRecord {
    pub fn zero(timestamp: TraceTimestamp) -> Self {
        Self {
            timestamp,
            total_bytes: 0,
            heap_committed: 0,
            unknown_committed: 0,
            by_stack: BTreeMap::new(),
        }
    }
}

/// Full detail for one reported stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackReport {
    pub stack_id: String,

    /// Attributed bytes, one entry per snapshot in series order
    pub total_size: Vec<i64>,

    /// Allocation counts, one entry per snapshot in series order
    pub block_count: Vec<u64>,

    /// Largest single allocation ever observed for this stack
    pub max_block_size: i64,

    /// Smallest single allocation ever observed for this stack
    pub min_block_size: i64,

    pub stack_text: String,
}

/// Complete output bundle of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the report was generated
    pub generated_at: String,

    /// Heap handle, present for reports built from a heap snapshot series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<u64>,

    /// First snapshot minus last snapshot
    pub total_diff: DiffRecord,

    /// One row per snapshot: snapshot[i] minus snapshot[i+1], the final row
    /// being an all-zero self diff
    pub interval_diffs: Vec<DiffRecord>,

    /// Stacks whose bytes changed between first and last snapshot, ranked
    pub activity_stack_ids: Vec<String>,

    /// Stacks with the largest byte counts in the first snapshot
    pub top_usage_stack_ids: Vec<String>,

    /// Detail for every reported stack (activity union top-usage)
    pub stacks: BTreeMap<String, StackReport>,

    /// Raw per-snapshot series, in snapshot order
    pub total_bytes: Vec<i64>,
    pub unknown_committed: Vec<i64>,
    pub heap_committed: Vec<i64>,
}
