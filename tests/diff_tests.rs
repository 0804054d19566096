//! Diff engine tests over the public API.

use memtrace_analyzer::aggregator::{SnapshotInfo, StackByteCount, StackInfoTable};
use memtrace_analyzer::diff::analyze;
use memtrace_analyzer::trace::TraceTimestamp;

fn snapshot(nanos: u64, stacks: &[(&str, i64)]) -> SnapshotInfo {
    let mut info = SnapshotInfo::empty(TraceTimestamp(nanos));
    for (id, bytes) in stacks {
        info.stacks.insert(
            id.to_string(),
            StackByteCount {
                stack_id: id.to_string(),
                bytes: *bytes,
                count: 1,
            },
        );
        info.total_bytes += bytes;
    }
    info
}

fn table(ids: &[&str]) -> StackInfoTable {
    let mut table = StackInfoTable::new();
    for id in ids {
        table.observe(id, &format!("frames of {id}"), 1);
    }
    table
}

#[test]
fn odd_max_stack_count_splits_asymmetrically() {
    // Five changed stacks with K = 3: integer division keeps 1 growth and
    // 1 shrinkage.
    let first = snapshot(20, &[("a", 100), ("b", 80), ("c", 60), ("d", 10), ("e", 5)]);
    let last = snapshot(10, &[("a", 10), ("b", 10), ("c", 10), ("d", 40), ("e", 50)]);
    let report = analyze(
        vec![first, last],
        &table(&["a", "b", "c", "d", "e"]),
        3,
    );

    assert_eq!(report.activity_stack_ids, vec!["a", "e"]);
}

#[test]
fn densified_stacks_report_zero_series_entries() {
    // "b" only exists in the first snapshot; densification still gives it a
    // full per-snapshot series.
    let first = snapshot(20, &[("a", 100), ("b", 50)]);
    let last = snapshot(10, &[("a", 100)]);
    let report = analyze(vec![first, last], &table(&["a", "b"]), 100);

    let b = &report.stacks["b"];
    assert_eq!(b.total_size, vec![50, 0]);
    assert_eq!(b.block_count, vec![1, 0]);
    assert_eq!(report.activity_stack_ids, vec!["b"]);
    assert_eq!(report.total_diff.by_stack["b"], 50);
}

#[test]
fn raw_series_follow_snapshot_order() {
    let snapshots = vec![
        snapshot(30, &[("a", 300)]),
        snapshot(20, &[("a", 200)]),
        snapshot(10, &[("a", 100)]),
    ];
    let report = analyze(snapshots, &table(&["a"]), 100);

    assert_eq!(report.total_bytes, vec![300, 200, 100]);
    assert_eq!(report.interval_diffs.len(), 3);
    assert_eq!(report.interval_diffs[0].timestamp, TraceTimestamp(30));
    assert_eq!(report.interval_diffs[0].total_bytes, 100);
    assert_eq!(report.interval_diffs[2].total_bytes, 0);
    assert_eq!(report.total_diff.total_bytes, 200);
}

#[test]
fn reported_set_is_union_of_activity_and_top_usage() {
    // "big" never changes but dominates usage; "mover" changes but is small.
    let first = snapshot(20, &[("big", 10_000), ("mover", 50)]);
    let last = snapshot(10, &[("big", 10_000), ("mover", 10)]);
    let report = analyze(vec![first, last], &table(&["big", "mover"]), 1);

    assert_eq!(report.activity_stack_ids, vec!["mover"]);
    assert_eq!(report.top_usage_stack_ids, vec!["big"]);
    assert!(report.stacks.contains_key("big"));
    assert!(report.stacks.contains_key("mover"));
}

#[test]
fn stack_detail_carries_text_and_block_sizes() {
    let mut table = StackInfoTable::new();
    table.observe("a", "app!main\napp!alloc", 64);
    table.observe("a", "app!main\napp!alloc", 256);

    let first = snapshot(20, &[("a", 320)]);
    let last = snapshot(10, &[("a", 0)]);
    let report = analyze(vec![first, last], &table, 100);

    let detail = &report.stacks["a"];
    assert_eq!(detail.stack_text, "app!main\napp!alloc");
    assert_eq!(detail.min_block_size, 64);
    assert_eq!(detail.max_block_size, 256);
}
