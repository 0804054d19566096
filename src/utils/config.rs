//! Configuration and constants for the analyzer.

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default maximum number of stacks reported by the diff engine
pub const DEFAULT_MAX_STACK_COUNT: usize = 100;

/// Default number of top stacks reported by the heap event matcher
pub const DEFAULT_HEAP_TOP_STACKS: usize = 100;

/// Default number of top stacks reported by the CPU sample aggregator
pub const DEFAULT_CPU_TOP_STACKS: usize = 100;

// Raw flag word bits carried by virtual alloc/free events.
// These match the Windows MEM_* constants the kernel provider emits.
pub const FLAG_COMMIT: u32 = 0x1000;
pub const FLAG_RESERVE: u32 = 0x2000;
pub const FLAG_DECOMMIT: u32 = 0x4000;
pub const FLAG_RELEASE: u32 = 0x8000;

/// Frames that mark a commit as originating inside the heap manager itself.
/// A stack containing any of these is attributed to the heap-internal bucket
/// rather than an application call site.
pub const HEAP_INTERNAL_FRAMES: &[&str] = &[
    "ntdll!RtlpAllocateHeapInternal",
    "ntdll!RtlCreateHeap",
];

// Fixed payload layouts for virtual alloc/free events.
// 32-bit: u32 base, u32 size, u32 pid, u32 flags.
// 64-bit: u64 base, u64 size, u32 pid, u32 flags.
pub const PAYLOAD_LEN_32: usize = 16;
pub const PAYLOAD_LEN_64: usize = 24;
