//! CPU sample aggregation per call stack.
//!
//! Sums sample weight per resolved stack text and reports the heaviest
//! stacks. Samples without a resolvable stack are skipped; they carry no
//! attribution target.

use crate::trace::{Symbolicator, TraceTimestamp};
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::ParseError;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One CPU sample of the traced process
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CpuSample {
    pub timestamp: TraceTimestamp,
    pub thread_id: u32,
    pub process_id: u32,
    /// Sample weight in milliseconds
    pub weight_ms: f64,
}

/// Total sampled milliseconds for one stack text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStackUsage {
    pub total_ms: f64,
    pub stack_text: String,
}

/// Output bundle of a CPU sample analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuReport {
    pub version: String,
    pub generated_at: String,
    /// Top stacks by total sampled milliseconds
    pub stacks: Vec<CpuStackUsage>,
}

/// Read a JSON CPU sample log, keeping only samples of `process_id`.
pub fn read_cpu_samples(
    path: impl AsRef<Path>,
    process_id: u32,
) -> Result<Vec<CpuSample>, ParseError> {
    let file = File::open(path.as_ref())?;
    let samples: Vec<CpuSample> = serde_json::from_reader(BufReader::new(file))?;

    let total = samples.len();
    let kept: Vec<CpuSample> = samples
        .into_iter()
        .filter(|sample| sample.process_id == process_id)
        .collect();
    info!("Total stack samples: {total}, kept for process {process_id}: {}", kept.len());
    Ok(kept)
}

/// Sum sample weight per resolved stack text, keeping the `top_n` heaviest.
///
/// Samples without a resolvable stack, or resolving to an empty text, are
/// skipped.
pub fn aggregate_cpu_samples(
    samples: &[CpuSample],
    symbolicator: &dyn Symbolicator,
    top_n: usize,
) -> Vec<CpuStackUsage> {
    let mut by_text: HashMap<String, f64> = HashMap::new();

    for sample in samples {
        let Some(stack) = symbolicator.resolve(sample.timestamp, sample.thread_id) else {
            continue;
        };
        let text = stack.text();
        if text.is_empty() {
            continue;
        }
        *by_text.entry(text).or_insert(0.0) += sample.weight_ms;
    }

    info!("Uniq stacks: {}", by_text.len());

    let mut usages: Vec<CpuStackUsage> = by_text
        .into_iter()
        .map(|(stack_text, total_ms)| CpuStackUsage {
            total_ms,
            stack_text,
        })
        .collect();
    // Ties break on text so the ranking is deterministic.
    usages.sort_by(|a, b| {
        b.total_ms
            .total_cmp(&a.total_ms)
            .then_with(|| a.stack_text.cmp(&b.stack_text))
    });
    usages.truncate(top_n);
    usages
}

/// Assemble the CPU report
pub fn build_cpu_report(
    samples: &[CpuSample],
    symbolicator: &dyn Symbolicator,
    top_n: usize,
) -> CpuReport {
    CpuReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        stacks: aggregate_cpu_samples(samples, symbolicator, top_n),
    }
}
