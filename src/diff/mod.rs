//! Snapshot diffing and stack ranking.
//!
//! Compares a chronological snapshot series and selects the most significant
//! call stacks: those responsible for growth or shrinkage between the first
//! and last snapshot, plus the heaviest stacks of the first snapshot.

mod engine;
mod schema;

// Public API exports
pub use engine::analyze;
pub use schema::{AnalysisReport, DiffRecord, StackReport};
