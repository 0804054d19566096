//! Trace event model and the external collaborator seams.
//!
//! Trace ingestion proper (ETW session handling, provider wiring) lives
//! outside this crate; what arrives here is an event log already filtered to
//! one target process. This module defines the event shapes, the fixed-layout
//! payload decoder, and the [`Symbolicator`] seam used to resolve call stacks.

pub mod event;
pub mod symbols;

pub use event::{
    decode_payload, read_event_log, DecodedPayload, LifecycleFacets, MemoryEvent, TraceTimestamp,
};
pub use symbols::{MapSymbolicator, ResolvedStack, Symbolicator};
