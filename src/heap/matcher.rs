//! Alloc/free pairing by base address.

use crate::trace::TraceTimestamp;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a heap lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeapEventKind {
    Alloc,
    Free,
}

/// One heap allocate or free event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapEvent {
    pub kind: HeapEventKind,
    pub timestamp: TraceTimestamp,
    pub thread_id: u32,
    pub base: u64,
    pub size: u64,
}

/// Why an event could not be paired cleanly.
///
/// Serialized with the historical tag strings so existing report consumers
/// keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnexpectedKind {
    /// Free whose size disagrees with the live allocation at that base
    #[serde(rename = "UnMatchSize")]
    UnmatchedSize,
    /// Second free at a base that already has an unmatched free
    #[serde(rename = "UnMatchBase")]
    UnmatchedBase,
    /// Allocation at a base that is already live
    #[serde(rename = "UnFree")]
    UnexpectedAlloc,
}

/// A diagnostic: an event that did not pair cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnexpectedEvent {
    pub kind: UnexpectedKind,
    pub event: HeapEvent,
}

/// Pairs alloc and free events inside an optional time window.
///
/// After the full log is applied, `live_allocs` holds allocations never
/// freed, `unmatched_frees` holds frees that never saw an allocation, and
/// `unexpected` holds every diagnostic in event order.
#[derive(Debug, Default)]
pub struct HeapMatcher {
    window: Option<(TraceTimestamp, TraceTimestamp)>,
    live_allocs: HashMap<u64, HeapEvent>,
    unmatched_frees: HashMap<u64, HeapEvent>,
    unexpected: Vec<UnexpectedEvent>,
}

impl HeapMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only events with `start <= timestamp <= end` are matched
    pub fn with_window(start: TraceTimestamp, end: TraceTimestamp) -> Self {
        Self {
            window: Some((start, end)),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: HeapEvent) {
        if let Some((start, end)) = self.window {
            if event.timestamp < start || event.timestamp > end {
                return;
            }
        }

        match event.kind {
            HeapEventKind::Free => self.apply_free(event),
            HeapEventKind::Alloc => self.apply_alloc(event),
        }
    }

    fn apply_free(&mut self, event: HeapEvent) {
        if let Some(alloc) = self.live_allocs.get(&event.base) {
            if alloc.size != event.size {
                warn!(
                    "free at {:#x} with size {} does not match allocation size {}",
                    event.base, event.size, alloc.size
                );
                self.unexpected.push(UnexpectedEvent {
                    kind: UnexpectedKind::UnmatchedSize,
                    event,
                });
            } else {
                self.live_allocs.remove(&event.base);
            }
        } else if self.unmatched_frees.contains_key(&event.base) {
            // Double-free-like: two frees with no allocation in between.
            self.unexpected.push(UnexpectedEvent {
                kind: UnexpectedKind::UnmatchedBase,
                event,
            });
        } else {
            self.unmatched_frees.insert(event.base, event);
        }
    }

    fn apply_alloc(&mut self, event: HeapEvent) {
        if self.live_allocs.contains_key(&event.base) {
            self.unexpected.push(UnexpectedEvent {
                kind: UnexpectedKind::UnexpectedAlloc,
                event,
            });
        } else {
            self.live_allocs.insert(event.base, event);
        }
    }

    /// Allocations never freed, in unspecified order
    pub fn live_allocs(&self) -> impl Iterator<Item = &HeapEvent> {
        self.live_allocs.values()
    }

    /// Frees that never matched an allocation
    pub fn unmatched_frees(&self) -> impl Iterator<Item = &HeapEvent> {
        self.unmatched_frees.values()
    }

    pub fn unexpected(&self) -> &[UnexpectedEvent] {
        &self.unexpected
    }

    pub fn live_alloc_count(&self) -> usize {
        self.live_allocs.len()
    }

    pub fn unmatched_free_count(&self) -> usize {
        self.unmatched_frees.len()
    }
}
