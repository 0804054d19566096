//! Leaked handle reporting.
//!
//! Lists handles of the target process that are missing a creating or a
//! closing stack: a handle with both stacks paired cleanly is not
//! interesting. For the kept handles both stack texts are reported, empty
//! when the trace carried no stack for that side.

use crate::trace::{Symbolicator, TraceTimestamp};
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::ParseError;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reference to the event that created or closed a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRef {
    pub timestamp: TraceTimestamp,
    pub thread_id: u32,
}

/// One handle observed in the trace.
///
/// `create`/`close` are present only when the trace captured a stack for
/// that side of the handle's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HandleRecord {
    pub process_id: u32,
    #[serde(default)]
    pub create: Option<StackRef>,
    #[serde(default)]
    pub close: Option<StackRef>,
}

/// Stack texts of one reported handle, empty when unavailable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleInfo {
    pub create_stack: String,
    pub close_stack: String,
}

/// Output bundle of a handle analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleReport {
    pub version: String,
    pub generated_at: String,
    pub handles: Vec<HandleInfo>,
}

/// Read a JSON handle log
pub fn read_handle_log(path: impl AsRef<Path>) -> Result<Vec<HandleRecord>, ParseError> {
    let file = File::open(path.as_ref())?;
    let records = serde_json::from_reader(BufReader::new(file))?;
    Ok(records)
}

/// Keep the handles of `process_id` that are missing a creating or closing
/// stack, resolving whichever side is present.
pub fn collect_leaked_handles(
    records: &[HandleRecord],
    process_id: u32,
    symbolicator: &dyn Symbolicator,
) -> Vec<HandleInfo> {
    info!("totalHandles: {}", records.len());

    records
        .iter()
        .filter(|record| {
            record.process_id == process_id && !(record.create.is_some() && record.close.is_some())
        })
        .map(|record| HandleInfo {
            create_stack: resolve_text(record.create, symbolicator),
            close_stack: resolve_text(record.close, symbolicator),
        })
        .collect()
}

fn resolve_text(stack_ref: Option<StackRef>, symbolicator: &dyn Symbolicator) -> String {
    stack_ref
        .and_then(|r| symbolicator.resolve(r.timestamp, r.thread_id))
        .map_or_else(String::new, |stack| stack.text())
}

/// Assemble the handle report
pub fn build_handle_report(
    records: &[HandleRecord],
    process_id: u32,
    symbolicator: &dyn Symbolicator,
) -> HandleReport {
    HandleReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        handles: collect_leaked_handles(records, process_id, symbolicator),
    }
}
