//! Memory lifecycle events and payload decoding.
//!
//! Virtual alloc/free events arrive either as structured records or as the
//! raw fixed-layout payload the kernel provider emits. The payload layout is
//! strict: a length mismatch means the trace is corrupt and the run aborts.

use crate::utils::config::{
    FLAG_COMMIT, FLAG_DECOMMIT, FLAG_RELEASE, FLAG_RESERVE, PAYLOAD_LEN_32, PAYLOAD_LEN_64,
};
use crate::utils::error::ParseError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Nanoseconds since the start of the trace.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TraceTimestamp(pub u64);

impl TraceTimestamp {
    pub fn nanos(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TraceTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Lifecycle facets carried by a virtual-memory event.
///
/// An event may carry more than one facet at once (e.g. reserve+commit), so
/// these are independent named booleans rather than a single enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleFacets {
    #[serde(default)]
    pub commit: bool,
    #[serde(default)]
    pub reserve: bool,
    #[serde(default)]
    pub decommit: bool,
    #[serde(default)]
    pub release: bool,
}

impl LifecycleFacets {
    /// Build facets from the raw flag word of the kernel provider
    pub fn from_raw(flags: u32) -> Self {
        Self {
            commit: flags & FLAG_COMMIT != 0,
            reserve: flags & FLAG_RESERVE != 0,
            decommit: flags & FLAG_DECOMMIT != 0,
            release: flags & FLAG_RELEASE != 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.commit || self.reserve || self.decommit || self.release)
    }
}

/// One virtual-memory lifecycle event, filtered to the target process.
///
/// `size` may be zero on Release events; the replayer recovers the true size
/// from the matching Reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub timestamp: TraceTimestamp,
    pub thread_id: u32,
    pub base: u64,
    pub size: u64,
    pub facets: LifecycleFacets,
}

/// Fields decoded from a raw virtual alloc/free payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPayload {
    pub base: u64,
    pub size: u64,
    pub process_id: u32,
    pub flags: u32,
}

/// Decode the fixed-layout payload of a virtual alloc/free event.
///
/// 32-bit payloads are exactly 16 bytes (u32 base, u32 size, u32 pid,
/// u32 flags, little endian); 64-bit payloads are exactly 24 bytes (u64 base,
/// u64 size, u32 pid, u32 flags). Any other length is fatal.
pub fn decode_payload(data: &[u8], is_32bit: bool) -> Result<DecodedPayload, ParseError> {
    let expected = if is_32bit {
        PAYLOAD_LEN_32
    } else {
        PAYLOAD_LEN_64
    };
    if data.len() != expected {
        return Err(ParseError::InvalidPayload {
            expected,
            actual: data.len(),
        });
    }

    let u32_at = |offset: usize| {
        u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    };
    let u64_at = |offset: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[offset..offset + 8]);
        u64::from_le_bytes(bytes)
    };

    if is_32bit {
        Ok(DecodedPayload {
            base: u32_at(0) as u64,
            size: u32_at(4) as u64,
            process_id: u32_at(8),
            flags: u32_at(12),
        })
    } else {
        Ok(DecodedPayload {
            base: u64_at(0),
            size: u64_at(8),
            process_id: u32_at(16),
            flags: u32_at(20),
        })
    }
}

/// One record of the JSON event log.
///
/// Either the structured `base`/`size`/`flags` fields are present, or `payload`
/// carries the raw provider bytes and is decoded here.
#[derive(Debug, Deserialize)]
struct RawEventRecord {
    timestamp: u64,
    thread_id: u32,
    process_id: u32,
    #[serde(default)]
    base: Option<u64>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    flags: Option<u32>,
    #[serde(default)]
    payload: Option<Vec<u8>>,
    #[serde(default)]
    is_32bit: bool,
}

/// Read a JSON event log, keeping only events of `process_id`, sorted by
/// timestamp.
///
/// # Errors
/// * `ParseError::IoError` / `ParseError::JsonError` - unreadable input
/// * `ParseError::InvalidPayload` - raw payload with the wrong length (fatal,
///   no partial-result recovery)
/// * `ParseError::InvalidRecord` - record with neither structured fields nor
///   a payload
pub fn read_event_log(
    path: impl AsRef<Path>,
    process_id: u32,
) -> Result<Vec<MemoryEvent>, ParseError> {
    let path = path.as_ref();
    info!("Reading event log: {}", path.display());

    let file = File::open(path)?;
    let records: Vec<RawEventRecord> = serde_json::from_reader(BufReader::new(file))?;

    let total = records.len();
    let mut events = Vec::new();
    for record in records {
        if record.process_id != process_id {
            continue;
        }
        events.push(event_from_record(record)?);
    }

    // Stable sort keeps same-timestamp events in log order.
    events.sort_by_key(|e| e.timestamp);

    debug!(
        "Kept {} of {} events for process {}",
        events.len(),
        total,
        process_id
    );
    Ok(events)
}

fn event_from_record(record: RawEventRecord) -> Result<MemoryEvent, ParseError> {
    let (base, size, flags) = if let Some(payload) = &record.payload {
        let decoded = decode_payload(payload, record.is_32bit)?;
        (decoded.base, decoded.size, decoded.flags)
    } else {
        let base = record.base.ok_or_else(|| {
            ParseError::InvalidRecord("record has neither a base nor a payload".to_string())
        })?;
        (base, record.size.unwrap_or(0), record.flags.unwrap_or(0))
    };

    Ok(MemoryEvent {
        timestamp: TraceTimestamp(record.timestamp),
        thread_id: record.thread_id,
        base,
        size,
        facets: LifecycleFacets::from_raw(flags),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_facets_from_raw_flags() {
        let facets = LifecycleFacets::from_raw(FLAG_RESERVE | FLAG_COMMIT);
        assert!(facets.reserve);
        assert!(facets.commit);
        assert!(!facets.decommit);
        assert!(!facets.release);

        assert!(LifecycleFacets::from_raw(0).is_empty());
    }

    #[test]
    fn test_decode_payload_64() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x1000u64.to_le_bytes());
        data.extend_from_slice(&0x100u64.to_le_bytes());
        data.extend_from_slice(&42u32.to_le_bytes());
        data.extend_from_slice(&FLAG_COMMIT.to_le_bytes());

        let decoded = decode_payload(&data, false).unwrap();
        assert_eq!(decoded.base, 0x1000);
        assert_eq!(decoded.size, 0x100);
        assert_eq!(decoded.process_id, 42);
        assert_eq!(decoded.flags, FLAG_COMMIT);
    }

    #[test]
    fn test_decode_payload_32() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x2000u32.to_le_bytes());
        data.extend_from_slice(&0x80u32.to_le_bytes());
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&FLAG_RELEASE.to_le_bytes());

        let decoded = decode_payload(&data, true).unwrap();
        assert_eq!(decoded.base, 0x2000);
        assert_eq!(decoded.size, 0x80);
        assert_eq!(decoded.process_id, 7);
        assert_eq!(decoded.flags, FLAG_RELEASE);
    }

    #[test]
    fn test_decode_payload_length_mismatch_is_fatal() {
        let err = decode_payload(&[0u8; 10], false).unwrap_err();
        match err {
            ParseError::InvalidPayload { expected, actual } => {
                assert_eq!(expected, PAYLOAD_LEN_64);
                assert_eq!(actual, 10);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(decode_payload(&[0u8; 24], true).is_err());
    }
}
