//! Call stack resolution seam.
//!
//! Symbol resolution is an external collaborator: given the timestamp and
//! thread of an event it either produces a resolved stack or reports that no
//! stack is available. The analyzer only depends on the [`Symbolicator`]
//! trait; [`MapSymbolicator`] is the file-backed implementation the CLI uses.

use crate::trace::TraceTimestamp;
use crate::utils::config::HEAP_INTERNAL_FRAMES;
use crate::utils::error::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::BufReader;
use std::path::Path;

/// A fully resolved call stack, frames ordered root first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStack {
    pub frames: Vec<String>,
}

impl ResolvedStack {
    pub fn new(frames: Vec<String>) -> Self {
        Self { frames }
    }

    /// Textual representation: frames joined by newlines, root first
    pub fn text(&self) -> String {
        self.frames.join("\n")
    }

    /// Stable identifier for this stack's text
    pub fn stack_id(&self) -> String {
        stack_id_for(&self.text())
    }

    /// True when any frame belongs to the heap manager's own page-reservation
    /// code, so the commit is heap-internal rather than an application
    /// allocation.
    pub fn is_heap_internal(&self) -> bool {
        self.frames
            .iter()
            .any(|frame| HEAP_INTERNAL_FRAMES.contains(&frame.as_str()))
    }
}

/// Hash a stack text into its stable uppercase-hex id
pub fn stack_id_for(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:X}", hasher.finish())
}

/// Resolves the call stack active at (timestamp, thread id).
pub trait Symbolicator {
    /// Returns `None` when no stack is available for the event
    fn resolve(&self, timestamp: TraceTimestamp, thread_id: u32) -> Option<ResolvedStack>;
}

/// One entry of the symbols file: a stack valid for a thread within a
/// half-open timestamp window `[from, to)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackTableEntry {
    pub thread_id: u32,
    pub from: TraceTimestamp,
    pub to: TraceTimestamp,
    pub frames: Vec<String>,
}

/// Symbolicator backed by a table of (thread, window) -> stack entries.
#[derive(Debug, Clone, Default)]
pub struct MapSymbolicator {
    entries: Vec<StackTableEntry>,
}

impl MapSymbolicator {
    pub fn new(entries: Vec<StackTableEntry>) -> Self {
        Self { entries }
    }

    /// Load the table from a JSON symbols file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let file = File::open(path.as_ref())?;
        let entries = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Symbolicator for MapSymbolicator {
    fn resolve(&self, timestamp: TraceTimestamp, thread_id: u32) -> Option<ResolvedStack> {
        self.entries
            .iter()
            .find(|entry| {
                entry.thread_id == thread_id && entry.from <= timestamp && timestamp < entry.to
            })
            .map(|entry| ResolvedStack::new(entry.frames.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stack_id_is_stable_and_text_sensitive() {
        let a = stack_id_for("main\nalloc");
        let b = stack_id_for("main\nalloc");
        let c = stack_id_for("main\nfree");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_heap_internal_detection() {
        let heap = ResolvedStack::new(vec![
            "ntdll!RtlUserThreadStart".to_string(),
            "ntdll!RtlpAllocateHeapInternal".to_string(),
        ]);
        assert!(heap.is_heap_internal());

        let app = ResolvedStack::new(vec![
            "app!main".to_string(),
            "KernelBase!VirtualAlloc".to_string(),
        ]);
        assert!(!app.is_heap_internal());
    }

    #[test]
    fn test_map_symbolicator_window_lookup() {
        let symbolicator = MapSymbolicator::new(vec![StackTableEntry {
            thread_id: 4,
            from: TraceTimestamp(10),
            to: TraceTimestamp(20),
            frames: vec!["app!main".to_string()],
        }]);

        assert!(symbolicator.resolve(TraceTimestamp(10), 4).is_some());
        assert!(symbolicator.resolve(TraceTimestamp(19), 4).is_some());
        assert!(symbolicator.resolve(TraceTimestamp(20), 4).is_none());
        assert!(symbolicator.resolve(TraceTimestamp(15), 5).is_none());
    }
}
