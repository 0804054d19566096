//! Finalize replayed buckets into read-only snapshot attributions.

use crate::replay::SnapshotBuckets;
use crate::trace::{Symbolicator, TraceTimestamp};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Cumulative bytes and allocation count for one stack in one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackByteCount {
    pub stack_id: String,
    pub bytes: i64,
    pub count: u64,
}

/// Global, per-run record for one stack id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInfo {
    pub stack_id: String,
    pub stack_text: String,
    pub allocation_max_bytes: i64,
    pub allocation_min_bytes: i64,
}

/// Stack id -> global `StackInfo`, shared across every snapshot of a run.
///
/// A `BTreeMap` keeps iteration order stable so ranked output is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct StackInfoTable {
    stacks: BTreeMap<String, StackInfo>,
}

impl StackInfoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one allocation observed for a stack, updating min/max sizes
    pub fn observe(&mut self, stack_id: &str, stack_text: &str, bytes: i64) {
        match self.stacks.get_mut(stack_id) {
            Some(info) => {
                info.allocation_max_bytes = info.allocation_max_bytes.max(bytes);
                info.allocation_min_bytes = info.allocation_min_bytes.min(bytes);
            }
            None => {
                self.stacks.insert(
                    stack_id.to_string(),
                    StackInfo {
                        stack_id: stack_id.to_string(),
                        stack_text: stack_text.to_string(),
                        allocation_max_bytes: bytes,
                        allocation_min_bytes: bytes,
                    },
                );
            }
        }
    }

    pub fn get(&self, stack_id: &str) -> Option<&StackInfo> {
        self.stacks.get(stack_id)
    }

    /// All known stack ids, in stable (sorted) order
    pub fn stack_ids(&self) -> Vec<String> {
        self.stacks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

/// One instant's frozen attribution of committed memory to call stacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Heap handle, present only for snapshots built from a heap series
    pub handle: Option<u64>,
    pub timestamp: TraceTimestamp,
    /// Stack-attributed + heap-committed + unknown-committed
    pub total_bytes: i64,
    pub heap_committed: i64,
    pub unknown_committed: i64,
    pub stacks: HashMap<String, StackByteCount>,
}

impl SnapshotInfo {
    pub fn empty(timestamp: TraceTimestamp) -> Self {
        Self {
            handle: None,
            timestamp,
            total_bytes: 0,
            heap_committed: 0,
            unknown_committed: 0,
            stacks: HashMap::new(),
        }
    }

    /// Bytes attributed to `stack_id`, zero when absent
    pub fn stack_bytes(&self, stack_id: &str) -> i64 {
        self.stacks.get(stack_id).map_or(0, |s| s.bytes)
    }
}

/// Finalize one instant's buckets into a read-only `SnapshotInfo`.
///
/// Groups the allocation table by stack id, sums the two range-set buckets,
/// and feeds every observed allocation into the global stack table. Live
/// allocations whose stack can no longer be resolved are skipped; their bytes
/// were never stack-attributed.
pub fn finalize_snapshot(
    buckets: &SnapshotBuckets,
    symbolicator: &dyn Symbolicator,
    stack_table: &mut StackInfoTable,
) -> SnapshotInfo {
    let mut stacks: HashMap<String, StackByteCount> = HashMap::new();
    let mut stack_total_bytes: i64 = 0;

    for allocation in buckets.allocations.values() {
        let Some(stack) = symbolicator.resolve(allocation.timestamp, allocation.thread_id) else {
            continue;
        };

        let stack_text = stack.text();
        let stack_id = stack.stack_id();
        let bytes = allocation.size as i64;
        stack_total_bytes += bytes;

        stacks
            .entry(stack_id.clone())
            .and_modify(|entry| {
                entry.bytes += bytes;
                entry.count += 1;
            })
            .or_insert_with(|| StackByteCount {
                stack_id: stack_id.clone(),
                bytes,
                count: 1,
            });

        stack_table.observe(&stack_id, &stack_text, bytes);
    }

    let heap_committed = buckets.heap_committed.total_bytes() as i64;
    let unknown_committed = buckets.unknown_committed.total_bytes() as i64;

    debug!(
        "{}: stacks: {}, heap range count: {}",
        buckets.instant,
        stacks.len(),
        buckets.heap_committed.len()
    );

    SnapshotInfo {
        handle: None,
        timestamp: buckets.instant,
        total_bytes: stack_total_bytes + heap_committed + unknown_committed,
        heap_committed,
        unknown_committed,
        stacks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::replay;
    use crate::trace::symbols::StackTableEntry;
    use crate::trace::{LifecycleFacets, MapSymbolicator, MemoryEvent};

    #[test]
    fn test_finalize_groups_by_stack_and_tracks_min_max() {
        let symbols = MapSymbolicator::new(vec![StackTableEntry {
            thread_id: 1,
            from: TraceTimestamp(0),
            to: TraceTimestamp(u64::MAX),
            frames: vec!["app!main".to_string()],
        }]);
        let commit = LifecycleFacets {
            commit: true,
            ..Default::default()
        };
        let events = vec![
            MemoryEvent {
                timestamp: TraceTimestamp(1),
                thread_id: 1,
                base: 0x1000,
                size: 0x100,
                facets: commit,
            },
            MemoryEvent {
                timestamp: TraceTimestamp(2),
                thread_id: 1,
                base: 0x9000,
                size: 0x400,
                facets: commit,
            },
        ];

        let buckets = replay(&events, &[TraceTimestamp(10)], &symbols).unwrap();
        let mut table = StackInfoTable::new();
        let snapshot = finalize_snapshot(&buckets[0], &symbols, &mut table);

        assert_eq!(snapshot.stacks.len(), 1);
        let entry = snapshot.stacks.values().next().unwrap();
        assert_eq!(entry.bytes, 0x500);
        assert_eq!(entry.count, 2);
        assert_eq!(snapshot.total_bytes, 0x500);

        let info = table.get(&entry.stack_id).unwrap();
        assert_eq!(info.allocation_min_bytes, 0x100);
        assert_eq!(info.allocation_max_bytes, 0x400);
    }

    #[test]
    fn test_finalize_sums_bucket_totals() {
        // Unknown commit only: no stacks, totals come from the range set.
        let commit = LifecycleFacets {
            commit: true,
            ..Default::default()
        };
        let events = vec![MemoryEvent {
            timestamp: TraceTimestamp(1),
            thread_id: 1,
            base: 0x1000,
            size: 0x2000,
            facets: commit,
        }];
        let symbols = MapSymbolicator::default();

        let buckets = replay(&events, &[TraceTimestamp(10)], &symbols).unwrap();
        let mut table = StackInfoTable::new();
        let snapshot = finalize_snapshot(&buckets[0], &symbols, &mut table);

        assert_eq!(snapshot.unknown_committed, 0x2000);
        assert_eq!(snapshot.heap_committed, 0);
        assert_eq!(snapshot.total_bytes, 0x2000);
        assert!(snapshot.stacks.is_empty());
        assert!(table.is_empty());
    }
}
