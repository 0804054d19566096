//! Core diff and ranking engine.
//!
//! Compares a chronological series of snapshots, selects the stacks most
//! responsible for growth or shrinkage, and assembles the report bundle.

use super::schema::{AnalysisReport, DiffRecord, StackReport};
use crate::aggregator::{SnapshotInfo, StackByteCount, StackInfoTable};
use crate::trace::TraceTimestamp;
use crate::utils::config::SCHEMA_VERSION;
use chrono::Utc;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Analyze a snapshot series against the global stack table.
///
/// Steps:
/// 1. Densify: every known stack id gets a (possibly zero) entry in every
///    snapshot.
/// 2. Total diff = first snapshot minus last snapshot, per field and per
///    stack.
/// 3. Activity selection: drop zero diffs, sort descending by signed diff;
///    if more than `max_stack_count` remain, keep the `max_stack_count / 2`
///    largest and the `max_stack_count / 2` smallest (integer division, so an
///    odd count leaves a one-element asymmetry).
/// 4. Interval diffs: one row per snapshot, the last row diffing against
///    itself.
/// 5. Top-usage: the `max_stack_count` stacks with the largest byte counts in
///    the first snapshot.
///
/// An empty snapshot series or an empty stack universe yields a well-formed
/// empty report.
pub fn analyze(
    mut snapshots: Vec<SnapshotInfo>,
    stack_table: &StackInfoTable,
    max_stack_count: usize,
) -> AnalysisReport {
    let stack_ids = stack_table.stack_ids();
    info!("AllStackIds: {}", stack_ids.len());

    if snapshots.is_empty() {
        return empty_report();
    }

    // Densify: every stack id appears in every snapshot before any diff.
    for snapshot in &mut snapshots {
        for stack_id in &stack_ids {
            snapshot
                .stacks
                .entry(stack_id.clone())
                .or_insert_with(|| StackByteCount {
                    stack_id: stack_id.clone(),
                    bytes: 0,
                    count: 0,
                });
        }
    }

    let first = &snapshots[0];
    let last = &snapshots[snapshots.len() - 1];

    let mut total_diff_by_stack: HashMap<String, i64> = HashMap::new();
    for stack_id in &stack_ids {
        total_diff_by_stack.insert(
            stack_id.clone(),
            first.stack_bytes(stack_id) - last.stack_bytes(stack_id),
        );
    }

    // Stacks whose bytes actually changed, most growth first. The input ids
    // are sorted, so ties keep a stable order.
    let mut ids_with_diff: Vec<&String> = stack_ids
        .iter()
        .filter(|id| total_diff_by_stack[*id] != 0)
        .collect();
    ids_with_diff.sort_by(|a, b| total_diff_by_stack[*b].cmp(&total_diff_by_stack[*a]));

    let activity_stack_ids: Vec<String> = if ids_with_diff.len() <= max_stack_count {
        ids_with_diff
            .iter()
            .take(max_stack_count)
            .map(|id| (*id).clone())
            .collect()
    } else {
        let half = max_stack_count / 2;
        let mut selected: Vec<String> = ids_with_diff
            .iter()
            .take(half)
            .map(|id| (*id).clone())
            .collect();
        selected.extend(
            ids_with_diff
                .iter()
                .skip(ids_with_diff.len() - half)
                .map(|id| (*id).clone()),
        );
        selected
    };

    info!("StackIdsHasDiff: {}", ids_with_diff.len());
    info!("ActivityStackIds: {}", activity_stack_ids.len());

    debug!("Creating total diff");
    let total_diff = diff_record(first, last, &activity_stack_ids);

    debug!("Creating interval diffs");
    let interval_diffs: Vec<DiffRecord> = (0..snapshots.len())
        .map(|i| {
            // The final snapshot diffs against itself, so the output always
            // has exactly one row per snapshot.
            let next = if i == snapshots.len() - 1 { i } else { i + 1 };
            diff_record(&snapshots[i], &snapshots[next], &activity_stack_ids)
        })
        .collect();

    debug!("Ranking top usage stacks");
    let mut by_first_usage: Vec<&String> = stack_ids.iter().collect();
    by_first_usage.sort_by(|a, b| first.stack_bytes(b.as_str()).cmp(&first.stack_bytes(a.as_str())));
    let top_usage_stack_ids: Vec<String> = by_first_usage
        .into_iter()
        .take(max_stack_count)
        .cloned()
        .collect();

    let mut reported: HashSet<&String> = activity_stack_ids.iter().collect();
    reported.extend(top_usage_stack_ids.iter());

    let mut stacks: BTreeMap<String, StackReport> = BTreeMap::new();
    for stack_id in reported {
        let Some(info) = stack_table.get(stack_id) else {
            continue;
        };
        stacks.insert(
            stack_id.clone(),
            StackReport {
                stack_id: stack_id.clone(),
                total_size: snapshots.iter().map(|s| s.stack_bytes(stack_id)).collect(),
                block_count: snapshots
                    .iter()
                    .map(|s| s.stacks.get(stack_id).map_or(0, |e| e.count))
                    .collect(),
                max_block_size: info.allocation_max_bytes,
                min_block_size: info.allocation_min_bytes,
                stack_text: info.stack_text.clone(),
            },
        );
    }

    let report = AnalysisReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        handle: snapshots[0].handle,
        total_diff,
        interval_diffs,
        activity_stack_ids,
        top_usage_stack_ids,
        stacks,
        total_bytes: snapshots.iter().map(|s| s.total_bytes).collect(),
        unknown_committed: snapshots.iter().map(|s| s.unknown_committed).collect(),
        heap_committed: snapshots.iter().map(|s| s.heap_committed).collect(),
    };
    info!("Analyze done");
    report
}

/// `minuend` minus `subtrahend`, per field and per activity stack
fn diff_record(
    minuend: &SnapshotInfo,
    subtrahend: &SnapshotInfo,
    activity_stack_ids: &[String],
) -> DiffRecord {
    let by_stack = activity_stack_ids
        .iter()
        .map(|id| {
            (
                id.clone(),
                minuend.stack_bytes(id) - subtrahend.stack_bytes(id),
            )
        })
        .collect();

    DiffRecord {
        timestamp: minuend.timestamp,
        total_bytes: minuend.total_bytes - subtrahend.total_bytes,
        heap_committed: minuend.heap_committed - subtrahend.heap_committed,
        unknown_committed: minuend.unknown_committed - subtrahend.unknown_committed,
        by_stack,
    }
}

fn empty_report() -> AnalysisReport {
    AnalysisReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        handle: None,
        total_diff: DiffRecord::zero(TraceTimestamp::default()),
        interval_diffs: Vec::new(),
        activity_stack_ids: Vec::new(),
        top_usage_stack_ids: Vec::new(),
        stacks: BTreeMap::new(),
        total_bytes: Vec::new(),
        unknown_committed: Vec::new(),
        heap_committed: Vec::new(),
    }
}
