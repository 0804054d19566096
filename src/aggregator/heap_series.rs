//! Snapshot series built from pre-existing heap snapshots.
//!
//! Some traces already carry a series of full heap snapshots instead of raw
//! lifecycle events. Each snapshot lists live allocations with a heap handle,
//! a pre-computed stack id and the stack text, so no replay is needed: the
//! allocations are grouped per handle into the same `SnapshotInfo` shape the
//! diff engine consumes.

use crate::aggregator::snapshot::{SnapshotInfo, StackByteCount, StackInfoTable};
use crate::trace::TraceTimestamp;
use crate::utils::error::ParseError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One live allocation inside a heap snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapAllocationRecord {
    pub heap_handle: u64,
    /// Snapshot-unique numeric stack id
    pub stack_id: u64,
    pub stack_text: String,
    pub bytes: i64,
}

/// One pre-built heap snapshot of the traced process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapSnapshotRecord {
    pub timestamp: TraceTimestamp,
    pub process_id: u32,
    pub allocations: Vec<HeapAllocationRecord>,
}

/// Chronology of one heap handle: its snapshots plus the global stack table
#[derive(Debug, Default)]
pub struct HandleSeries {
    pub snapshots: Vec<SnapshotInfo>,
    pub stack_table: StackInfoTable,
}

/// Read a JSON heap snapshot series file
pub fn read_heap_snapshots(
    path: impl AsRef<Path>,
) -> Result<Vec<HeapSnapshotRecord>, ParseError> {
    let file = File::open(path.as_ref())?;
    let records = serde_json::from_reader(BufReader::new(file))?;
    Ok(records)
}

/// Group a heap snapshot series into per-handle snapshot chronologies.
///
/// Snapshots are walked newest first, matching the instant ordering of the
/// event-log path: the first snapshot of every series is the latest one.
/// Snapshots of other processes are skipped.
pub fn build_handle_series(
    records: &[HeapSnapshotRecord],
    process_id: u32,
) -> BTreeMap<u64, HandleSeries> {
    info!("Total heap snapshots: {}", records.len());

    let mut by_handle: BTreeMap<u64, HandleSeries> = BTreeMap::new();
    let mut total_allocations: u64 = 0;

    for record in records.iter().rev() {
        if record.process_id != process_id {
            debug!("skip process: {}", record.process_id);
            continue;
        }

        // Per-handle SnapshotInfo under construction for this one snapshot.
        let mut handle_map: BTreeMap<u64, SnapshotInfo> = BTreeMap::new();

        for allocation in &record.allocations {
            total_allocations += 1;
            let stack_id = format!("{:X}", allocation.stack_id);
            let handle = allocation.heap_handle;

            let snapshot = handle_map.entry(handle).or_insert_with(|| SnapshotInfo {
                handle: Some(handle),
                ..SnapshotInfo::empty(record.timestamp)
            });

            snapshot
                .stacks
                .entry(stack_id.clone())
                .and_modify(|entry| {
                    entry.bytes += allocation.bytes;
                    entry.count += 1;
                })
                .or_insert_with(|| StackByteCount {
                    stack_id: stack_id.clone(),
                    bytes: allocation.bytes,
                    count: 1,
                });
            snapshot.total_bytes += allocation.bytes;

            by_handle
                .entry(handle)
                .or_default()
                .stack_table
                .observe(&stack_id, &allocation.stack_text, allocation.bytes);
        }

        for (handle, snapshot) in handle_map {
            by_handle.entry(handle).or_default().snapshots.push(snapshot);
        }
    }

    info!("TotalAllocations: {}", total_allocations);
    for (handle, series) in &by_handle {
        debug!("Handle: {:#x}, snapshots: {}", handle, series.snapshots.len());
    }

    by_handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn alloc(handle: u64, stack_id: u64, bytes: i64) -> HeapAllocationRecord {
        HeapAllocationRecord {
            heap_handle: handle,
            stack_id,
            stack_text: format!("frame_{stack_id}"),
            bytes,
        }
    }

    #[test]
    fn test_series_grouped_per_handle_newest_first() {
        let records = vec![
            HeapSnapshotRecord {
                timestamp: TraceTimestamp(100),
                process_id: 4,
                allocations: vec![alloc(0xA, 1, 64), alloc(0xB, 2, 32)],
            },
            HeapSnapshotRecord {
                timestamp: TraceTimestamp(200),
                process_id: 4,
                allocations: vec![alloc(0xA, 1, 64), alloc(0xA, 1, 16)],
            },
        ];

        let by_handle = build_handle_series(&records, 4);
        assert_eq!(by_handle.len(), 2);

        let series_a = &by_handle[&0xA];
        assert_eq!(series_a.snapshots.len(), 2);
        // Newest snapshot comes first.
        assert_eq!(series_a.snapshots[0].timestamp, TraceTimestamp(200));
        assert_eq!(series_a.snapshots[0].total_bytes, 80);
        assert_eq!(series_a.snapshots[0].stacks["1"].count, 2);
        assert_eq!(series_a.snapshots[1].total_bytes, 64);
        assert_eq!(series_a.snapshots[0].handle, Some(0xA));

        let info = series_a.stack_table.get("1").unwrap();
        assert_eq!(info.allocation_min_bytes, 16);
        assert_eq!(info.allocation_max_bytes, 64);
    }

    #[test]
    fn test_other_processes_are_skipped() {
        let records = vec![HeapSnapshotRecord {
            timestamp: TraceTimestamp(100),
            process_id: 9,
            allocations: vec![alloc(0xA, 1, 64)],
        }];
        assert!(build_handle_series(&records, 4).is_empty());
    }
}
