//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while reading and decoding a trace event log
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid virtual alloc/free event: payload is {actual} bytes, expected {expected}")]
    InvalidPayload { expected: usize, actual: usize },

    #[error("invalid event record: {0}")]
    InvalidRecord(String),
}

/// Errors that can occur while replaying an event log into snapshots
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("event log is not sorted by timestamp (event {index} goes backwards)")]
    UnsortedEvents { index: usize },
}

/// Errors that can occur during report output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to read file: {0}")]
    ReadFailed(std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
