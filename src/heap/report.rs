//! Stack aggregation and report assembly for heap event analysis.

use super::matcher::{HeapEvent, HeapMatcher, UnexpectedKind};
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

/// Aggregated bytes and event count for one stack text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackUsage {
    pub size: u64,
    pub count: u64,
    pub stack_text: String,
}

/// One diagnostic with its resolved stack, for the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnexpectedEventReport {
    pub tag: UnexpectedKind,
    pub timestamp: TraceTimestamp,
    pub thread_id: u32,
    pub base: u64,
    pub size: u64,
    pub stack_text: String,
}

/// Output bundle of a heap event analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapReport {
    pub version: String,
    pub generated_at: String,
    /// Top stacks by bytes still allocated at the end of the window
    pub allocs: Vec<StackUsage>,
    /// Top stacks by bytes freed without a matching allocation
    pub frees: Vec<StackUsage>,
    pub unexpected_events: Vec<UnexpectedEventReport>,
    /// Events that resolved to no stack, populated only in debug runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_stack_events: Vec<HeapEvent>,
}

/// Aggregate events by resolved stack text, keeping the `top_n` heaviest.
///
/// Events without a resolvable stack are grouped under "Unknown"; when a
/// `no_stack_events` sink is given they are also collected into it.
pub fn aggregate_stacks<'a>(
    events: impl Iterator<Item = &'a HeapEvent>,
    symbolicator: &dyn Symbolicator,
    top_n: usize,
    mut no_stack_events: Option<&mut Vec<HeapEvent>>,
) -> Vec<StackUsage> {
    let mut by_text: HashMap<String, StackUsage> = HashMap::new();

    for event in events {
        let resolved = symbolicator.resolve(event.timestamp, event.thread_id);
        if resolved.is_none() {
            if let Some(sink) = no_stack_events.as_deref_mut() {
                sink.push(*event);
            }
        }
        let text = resolved.map_or_else(|| "Unknown".to_string(), |stack| stack.text());

        by_text
            .entry(text.clone())
            .and_modify(|usage| {
                usage.size += event.size;
                usage.count += 1;
            })
            .or_insert(StackUsage {
                size: event.size,
                count: 1,
                stack_text: text,
            });
    }

    let mut usages: Vec<StackUsage> = by_text.into_values().collect();
    // Ties break on text so the ranking is deterministic.
    usages.sort_by(|a, b| b.size.cmp(&a.size).then(a.stack_text.cmp(&b.stack_text)));
    usages.truncate(top_n);
    usages
}

/// Assemble the heap report from a finished matcher.
///
/// With `debug` set the report also lists the events that resolved to no
/// stack, so a broken symbols file is visible in the output.
pub fn build_heap_report(
    matcher: &HeapMatcher,
    symbolicator: &dyn Symbolicator,
    top_n: usize,
    debug: bool,
) -> HeapReport {
    info!(
        "got allocs: {}, frees: {}",
        matcher.live_alloc_count(),
        matcher.unmatched_free_count()
    );

    let unexpected_events = matcher
        .unexpected()
        .iter()
        .map(|diagnostic| {
            let event = diagnostic.event;
            let stack_text = symbolicator
                .resolve(event.timestamp, event.thread_id)
                .map_or_else(|| "Unknown".to_string(), |stack| stack.text());
            UnexpectedEventReport {
                tag: diagnostic.kind,
                timestamp: event.timestamp,
                thread_id: event.thread_id,
                base: event.base,
                size: event.size,
                stack_text,
            }
        })
        .collect();

    let mut no_stack = Vec::new();
    let allocs = aggregate_stacks(
        matcher.live_allocs(),
        symbolicator,
        top_n,
        debug.then_some(&mut no_stack),
    );
    let frees = aggregate_stacks(
        matcher.unmatched_frees(),
        symbolicator,
        top_n,
        debug.then_some(&mut no_stack),
    );
    no_stack.sort_by_key(|event| (event.timestamp, event.base));

    HeapReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        allocs,
        frees,
        unexpected_events,
        no_stack_events: no_stack,
    }
}

/// One record of the JSON heap event log
#[derive(Debug, Deserialize)]
struct RawHeapEventRecord {
    #[serde(flatten)]
    event: HeapEvent,
    process_id: u32,
}

/// Read a JSON heap event log, keeping only events of `process_id`, sorted by
/// timestamp.
pub fn read_heap_event_log(
    path: impl AsRef<Path>,
    process_id: u32,
) -> Result<Vec<HeapEvent>, ParseError> {
    let file = File::open(path.as_ref())?;
    let records: Vec<RawHeapEventRecord> = serde_json::from_reader(BufReader::new(file))?;

    let mut events: Vec<HeapEvent> = records
        .into_iter()
        .filter(|record| record.process_id == process_id)
        .map(|record| record.event)
        .collect();
    events.sort_by_key(|event| event.timestamp);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::matcher::HeapEventKind;
    use crate::trace::symbols::StackTableEntry;
    use crate::trace::MapSymbolicator;
    use pretty_assertions::assert_eq;

    fn alloc(nanos: u64, thread_id: u32, base: u64, size: u64) -> HeapEvent {
        HeapEvent {
            kind: HeapEventKind::Alloc,
            timestamp: TraceTimestamp(nanos),
            thread_id,
            base,
            size,
        }
    }

    #[test]
    fn test_aggregate_groups_by_stack_and_ranks_by_size() {
        let symbols = MapSymbolicator::new(vec![
            StackTableEntry {
                thread_id: 1,
                from: TraceTimestamp(0),
                to: TraceTimestamp(u64::MAX),
                frames: vec!["app!hot".to_string()],
            },
            StackTableEntry {
                thread_id: 2,
                from: TraceTimestamp(0),
                to: TraceTimestamp(u64::MAX),
                frames: vec!["app!cold".to_string()],
            },
        ]);
        let events = vec![
            alloc(1, 1, 0x100, 64),
            alloc(2, 1, 0x200, 64),
            alloc(3, 2, 0x300, 16),
        ];

        let usages = aggregate_stacks(events.iter(), &symbols, 100, None);
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].stack_text, "app!hot");
        assert_eq!(usages[0].size, 128);
        assert_eq!(usages[0].count, 2);
        assert_eq!(usages[1].stack_text, "app!cold");
    }

    #[test]
    fn test_unresolved_events_group_under_unknown() {
        let symbols = MapSymbolicator::default();
        let events = vec![alloc(1, 1, 0x100, 8), alloc(2, 1, 0x200, 8)];

        let usages = aggregate_stacks(events.iter(), &symbols, 100, None);
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].stack_text, "Unknown");
        assert_eq!(usages[0].count, 2);
    }

    #[test]
    fn test_top_n_truncation() {
        let entries: Vec<StackTableEntry> = (1..=5)
            .map(|thread| StackTableEntry {
                thread_id: thread,
                from: TraceTimestamp(0),
                to: TraceTimestamp(u64::MAX),
                frames: vec![format!("app!site_{thread}")],
            })
            .collect();
        let symbols = MapSymbolicator::new(entries);
        let events: Vec<HeapEvent> = (1..=5)
            .map(|thread| alloc(thread as u64, thread, 0x100 * thread as u64, 8 * thread as u64))
            .collect();

        let usages = aggregate_stacks(events.iter(), &symbols, 2, None);
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].stack_text, "app!site_5");
        assert_eq!(usages[1].stack_text, "app!site_4");
    }

    #[test]
    fn test_debug_report_lists_no_stack_events() {
        let symbols = MapSymbolicator::default();
        let mut matcher = HeapMatcher::new();
        matcher.apply(alloc(2, 1, 0x200, 16));
        matcher.apply(alloc(1, 1, 0x100, 8));

        let report = build_heap_report(&matcher, &symbols, 100, true);
        assert_eq!(report.no_stack_events.len(), 2);
        assert_eq!(report.no_stack_events[0].base, 0x100);
        assert_eq!(report.no_stack_events[1].base, 0x200);

        let quiet = build_heap_report(&matcher, &symbols, 100, false);
        assert!(quiet.no_stack_events.is_empty());
    }
}
