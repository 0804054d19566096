//! Snapshot replay over the chronological event log.
//!
//! One forward pass drives an independent set of buckets per requested
//! snapshot instant: an unknown-committed range set for events without a
//! resolvable stack, a heap-internal-committed range set for commits made by
//! the heap manager itself, and a per-base allocation table for application
//! commits. Because the buckets of different instants never interact, a
//! single sweep against all instants at once is equivalent to replaying the
//! log once per instant up to that instant's timestamp.

use crate::ranges::{AddrRange, AddressRangeSet};
use crate::trace::{MemoryEvent, Symbolicator, TraceTimestamp};
use crate::utils::error::ReplayError;
use log::{debug, info};
use std::collections::HashMap;

/// Progress is logged every this many events
const PROGRESS_INTERVAL: usize = 100_000;

/// A live application commit, keyed by base address in the allocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    pub timestamp: TraceTimestamp,
    pub thread_id: u32,
    pub base: u64,
    pub size: u64,
}

/// Point-in-time committed-memory state for one requested snapshot instant.
#[derive(Debug, Default)]
pub struct SnapshotBuckets {
    pub instant: TraceTimestamp,
    /// Commits whose stack could not be resolved
    pub unknown_committed: AddressRangeSet,
    /// Commits made inside the heap manager's own page-reservation code
    pub heap_committed: AddressRangeSet,
    /// Application commits, keyed by base address
    pub allocations: HashMap<u64, AllocationRecord>,
}

impl SnapshotBuckets {
    fn new(instant: TraceTimestamp) -> Self {
        Self {
            instant,
            ..Self::default()
        }
    }
}

/// Replay a time-sorted event log against the requested snapshot instants.
///
/// The returned buckets are a dense array in the caller's instant order, so
/// downstream iteration is stable and matches the requested order.
///
/// Release events usually carry no size; the true size is recovered from the
/// most recent unmatched Reserve at the same base. When no such Reserve
/// exists the carried size (typically zero) is used as-is, which can leave
/// residual committed ranges behind. This mirrors the historical analyzer and
/// is a documented limitation.
///
/// # Errors
/// * `ReplayError::UnsortedEvents` - the log is not sorted by timestamp
pub fn replay(
    events: &[MemoryEvent],
    instants: &[TraceTimestamp],
    symbolicator: &dyn Symbolicator,
) -> Result<Vec<SnapshotBuckets>, ReplayError> {
    info!(
        "Replaying {} events against {} snapshot instants",
        events.len(),
        instants.len()
    );

    let mut buckets: Vec<SnapshotBuckets> = instants
        .iter()
        .map(|&instant| SnapshotBuckets::new(instant))
        .collect();

    // base address -> size of the last unmatched Reserve at that base
    let mut reserve_sizes: HashMap<u64, u64> = HashMap::new();

    let mut previous = TraceTimestamp::default();
    for (index, event) in events.iter().enumerate() {
        if event.timestamp < previous {
            return Err(ReplayError::UnsortedEvents { index });
        }
        previous = event.timestamp;

        if index > 0 && index % PROGRESS_INTERVAL == 0 {
            info!(
                "Merging allocations completed {:.4} %",
                index as f64 * 100.0 / events.len() as f64
            );
        }

        let stack = symbolicator.resolve(event.timestamp, event.thread_id);

        if event.facets.reserve {
            reserve_sizes.insert(event.base, event.size);
        }

        let mut size = event.size;
        if event.facets.release {
            // MEM_RELEASE requires the size to be zero, so get the real size
            // from the matching Reserve.
            if let Some(reserved) = reserve_sizes.remove(&event.base) {
                size = reserved;
            }
        }

        // Clamp instead of wrapping: a corrupt event with a base near the top
        // of the address space must not take the whole replay down.
        let range = AddrRange::new(
            event.base,
            event.base.saturating_add(size),
            event.timestamp,
            event.thread_id,
        );

        for bucket in buckets
            .iter_mut()
            .filter(|bucket| event.timestamp <= bucket.instant)
        {
            if event.facets.commit {
                match &stack {
                    None => bucket.unknown_committed.insert(range),
                    Some(stack) if stack.is_heap_internal() => {
                        bucket.heap_committed.insert(range);
                    }
                    Some(_) => {
                        bucket.allocations.insert(
                            event.base,
                            AllocationRecord {
                                timestamp: event.timestamp,
                                thread_id: event.thread_id,
                                base: event.base,
                                size: event.size,
                            },
                        );
                    }
                }
            }

            if event.facets.release || event.facets.decommit {
                bucket.unknown_committed.remove(&range);
                if bucket.allocations.remove(&event.base).is_none() {
                    bucket.heap_committed.remove(&range);
                }
            }
        }
    }

    for bucket in &buckets {
        debug!(
            "{}: unknown ranges: {}, heap ranges: {}, live allocations: {}",
            bucket.instant,
            bucket.unknown_committed.len(),
            bucket.heap_committed.len(),
            bucket.allocations.len()
        );
    }

    Ok(buckets)
}
