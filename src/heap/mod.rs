//! Heap allocate/free event matching and diagnostics.
//!
//! Pairs heap allocation events with their frees by base address and keeps
//! everything that does not pair cleanly visible: size mismatches, double
//! frees and re-allocations of a live base are recorded as diagnostics, never
//! silently dropped and never fatal.

pub mod matcher;
pub mod report;

pub use matcher::{HeapEvent, HeapEventKind, HeapMatcher, UnexpectedEvent, UnexpectedKind};
pub use report::{build_heap_report, read_heap_event_log, HeapReport, StackUsage};
