//! Command implementations.
//!
//! Each command is thin glue: read inputs, drive the core pipeline, write the
//! report. The heavy lifting lives in the library modules.

pub mod cpu_samples;
pub mod handles;
pub mod heap_events;
pub mod heap_snapshots;
pub mod virtual_alloc;

pub use cpu_samples::{execute_cpu_samples, CpuSamplesArgs};
pub use handles::{execute_handles, HandlesArgs};
pub use heap_events::{execute_heap_events, HeapEventsArgs};
pub use heap_snapshots::{execute_heap_snapshots, HeapSnapshotsArgs};
pub use virtual_alloc::{execute_virtual_alloc, validate_args, VirtualAllocArgs};
