//! Disjoint committed address range tracking.
//!
//! An [`AddressRangeSet`] stores the byte ranges of committed virtual memory as
//! a sorted sequence of half-open intervals. Inserting a range merges it with
//! any overlapping or touching neighbours; removing a range truncates, splits
//! or deletes whatever it intersects. After every mutation the set is sorted,
//! pairwise disjoint, and no two consecutive ranges touch.

use crate::trace::TraceTimestamp;
use serde::{Deserialize, Serialize};

/// A half-open byte interval `[start, end)` of committed memory.
///
/// Timestamp and thread id are provenance from whichever event last produced
/// or merged the range. They are kept for diagnostics only and never affect
/// set semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrRange {
    pub start: u64,
    pub end: u64,
    pub timestamp: TraceTimestamp,
    pub thread_id: u32,
}

impl AddrRange {
    pub fn new(start: u64, end: u64, timestamp: TraceTimestamp, thread_id: u32) -> Self {
        Self {
            start,
            end,
            timestamp,
            thread_id,
        }
    }

    /// Length of the interval in bytes
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Ordered set of disjoint, non-touching address ranges.
///
/// Backed by a sorted `Vec` with binary search for the insertion point. For a
/// fixed chronological sequence of `insert`/`remove` calls the resulting set
/// is uniquely determined.
#[derive(Debug, Clone, Default)]
pub struct AddressRangeSet {
    ranges: Vec<AddrRange>,
}

impl AddressRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddrRange> {
        self.ranges.iter()
    }

    /// Sum of interval lengths, recomputed on demand
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(AddrRange::len).sum()
    }

    /// Add a committed interval, merging with overlapping or touching
    /// neighbours so the disjointness invariant holds afterwards.
    ///
    /// A single insert can bridge several previously disjoint ranges; the
    /// forward sweep after the merge absorbs all of them.
    pub fn insert(&mut self, range: AddrRange) {
        if range.is_empty() {
            return;
        }

        // Append fast path: empty set, or strictly after the last stored range.
        if self
            .ranges
            .last()
            .map_or(true, |last| last.end < range.start)
        {
            self.ranges.push(range);
            return;
        }

        // Rightmost stored range with start <= range.start is the merge candidate.
        let after = self.ranges.partition_point(|r| r.start <= range.start);

        let merged_at = if after == 0 {
            // New range starts before everything stored.
            self.ranges.insert(0, range);
            0
        } else {
            let candidate = after - 1;
            if self.ranges[candidate].end >= range.start {
                // Overlap or touch: extend in place.
                self.ranges[candidate].end = self.ranges[candidate].end.max(range.end);
                candidate
            } else {
                self.ranges.insert(after, range);
                after
            }
        };

        self.absorb_following(merged_at);
    }

    /// Absorb every range after `idx` whose start lies at or before the
    /// current end, extending the end to the maximum seen.
    fn absorb_following(&mut self, idx: usize) {
        let mut end = self.ranges[idx].end;
        let mut next = idx + 1;
        while next < self.ranges.len() && self.ranges[next].start <= end {
            end = end.max(self.ranges[next].end);
            next += 1;
        }
        self.ranges[idx].end = end;
        self.ranges.drain(idx + 1..next);
    }

    /// Delete the portion of stored coverage intersecting `[start, end)`.
    pub fn remove(&mut self, window: &AddrRange) {
        if window.is_empty() || self.ranges.is_empty() {
            return;
        }

        // Fast exit when the window lies entirely outside stored coverage.
        let first = &self.ranges[0];
        let last = &self.ranges[self.ranges.len() - 1];
        if last.end <= window.start || first.start >= window.end {
            return;
        }

        let mut i = 0;
        while i < self.ranges.len() {
            let current = self.ranges[i];

            if current.start < window.start {
                if current.end <= window.start {
                    // Entirely before the window.
                    i += 1;
                } else if current.end <= window.end {
                    // Overlaps only the low side: truncate the tail.
                    self.ranges[i].end = window.start;
                    i += 1;
                } else {
                    // Strictly contains the window: cut into two. At most one
                    // stored range can straddle the window like this.
                    let tail = AddrRange::new(
                        window.end,
                        current.end,
                        current.timestamp,
                        current.thread_id,
                    );
                    self.ranges[i].end = window.start;
                    self.ranges.insert(i + 1, tail);
                    break;
                }
            } else if current.start < window.end {
                if current.end <= window.end {
                    // Fully inside the window.
                    self.ranges.remove(i);
                } else {
                    // Extends past the window: truncate the head and stop.
                    self.ranges[i].start = window.end;
                    break;
                }
            } else {
                // Sorted order guarantees nothing further intersects.
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(start: u64, end: u64) -> AddrRange {
        AddrRange::new(start, end, TraceTimestamp(0), 1)
    }

    fn spans(set: &AddressRangeSet) -> Vec<(u64, u64)> {
        set.iter().map(|r| (r.start, r.end)).collect()
    }

    fn assert_invariant(set: &AddressRangeSet) {
        let ranges: Vec<_> = set.iter().collect();
        for r in &ranges {
            assert!(r.start < r.end, "empty or inverted range {:?}", r);
        }
        for pair in ranges.windows(2) {
            assert!(
                pair[0].end < pair[1].start,
                "ranges touch or overlap: {:?} then {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_insert_appends_disjoint_ranges() {
        let mut set = AddressRangeSet::new();
        set.insert(range(10, 20));
        set.insert(range(30, 40));
        assert_eq!(spans(&set), vec![(10, 20), (30, 40)]);
        assert_eq!(set.total_bytes(), 20);
        assert_invariant(&set);
    }

    #[test]
    fn test_insert_merges_overlap_and_left_extension() {
        let mut set = AddressRangeSet::new();
        set.insert(range(10, 20));
        set.insert(range(15, 25));
        set.insert(range(5, 12));
        assert_eq!(spans(&set), vec![(5, 25)]);
        assert_invariant(&set);
    }

    #[test]
    fn test_insert_merges_touching_range() {
        let mut set = AddressRangeSet::new();
        set.insert(range(10, 20));
        set.insert(range(20, 30));
        assert_eq!(spans(&set), vec![(10, 30)]);
        assert_invariant(&set);
    }

    #[test]
    fn test_insert_bridges_several_ranges() {
        let mut set = AddressRangeSet::new();
        set.insert(range(0, 10));
        set.insert(range(20, 30));
        set.insert(range(40, 50));
        set.insert(range(5, 45));
        assert_eq!(spans(&set), vec![(0, 50)]);
        assert_invariant(&set);
    }

    #[test]
    fn test_insert_before_head() {
        let mut set = AddressRangeSet::new();
        set.insert(range(50, 60));
        set.insert(range(10, 20));
        assert_eq!(spans(&set), vec![(10, 20), (50, 60)]);
        assert_invariant(&set);
    }

    #[test]
    fn test_insert_contained_range_is_a_noop_on_shape() {
        let mut set = AddressRangeSet::new();
        set.insert(range(10, 100));
        set.insert(range(40, 60));
        assert_eq!(spans(&set), vec![(10, 100)]);
        assert_invariant(&set);
    }

    #[test]
    fn test_remove_splits_contained_window() {
        let mut set = AddressRangeSet::new();
        set.insert(range(0, 100));
        set.remove(&range(40, 60));
        assert_eq!(spans(&set), vec![(0, 40), (60, 100)]);
        assert_invariant(&set);
    }

    #[test]
    fn test_remove_full_coverage_empties_set() {
        let mut set = AddressRangeSet::new();
        set.insert(range(0, 10));
        set.insert(range(20, 30));
        set.remove(&range(0, 30));
        assert!(set.is_empty());
        assert_eq!(set.total_bytes(), 0);
    }

    #[test]
    fn test_remove_truncates_low_and_high_sides() {
        let mut set = AddressRangeSet::new();
        set.insert(range(0, 50));
        set.insert(range(60, 100));
        set.remove(&range(40, 80));
        assert_eq!(spans(&set), vec![(0, 40), (80, 100)]);
        assert_invariant(&set);
    }

    #[test]
    fn test_remove_outside_coverage_is_noop() {
        let mut set = AddressRangeSet::new();
        set.insert(range(100, 200));
        set.remove(&range(0, 50));
        set.remove(&range(300, 400));
        assert_eq!(spans(&set), vec![(100, 200)]);
    }

    #[test]
    fn test_remove_on_empty_set_is_noop() {
        let mut set = AddressRangeSet::new();
        set.remove(&range(0, 100));
        assert!(set.is_empty());
    }

    #[test]
    fn test_total_bytes_tracks_mutations() {
        let mut set = AddressRangeSet::new();
        set.insert(range(0, 0x1000));
        set.insert(range(0x2000, 0x3000));
        assert_eq!(set.total_bytes(), 0x2000);
        set.remove(&range(0x800, 0x1000));
        assert_eq!(set.total_bytes(), 0x1800);
        assert_invariant(&set);
    }
}
