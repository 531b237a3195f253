// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Fixed-capacity, overwrite-oldest ring buffer of diagnostic entries, plus
//! the RLE compression applied to each entry's payload before it's stored.

use std::collections::VecDeque;
use std::sync::Mutex;

use arrayvec::ArrayVec;

use crate::clock::{now_ms, SequenceGenerator};
use crate::constants::{DIAGNOSTIC_MAX_PAYLOAD, DIAGNOSTIC_RING_CAPACITY};
use crate::model::{Compression, DiagnosticEntry, DiagnosticSource};

use super::rle;

pub struct DiagnosticRing {
    entries: Mutex<VecDeque<DiagnosticEntry>>,
    sequence: SequenceGenerator,
}

impl DiagnosticRing {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(DIAGNOSTIC_RING_CAPACITY)),
            sequence: SequenceGenerator::new(),
        }
    }

    /// Records one diagnostic entry, RLE-compressing the payload when that
    /// actually shrinks it. Evicts the oldest entry once the ring is full.
    pub fn record(&self, source: DiagnosticSource, raw_payload: &[u8]) {
        let original_len = raw_payload.len();
        let truncated = &raw_payload[..original_len.min(DIAGNOSTIC_MAX_PAYLOAD * 2)];
        let compressed = rle::compress(truncated);

        let (compression, bytes): (Compression, &[u8]) = if compressed.len() < truncated.len() {
            (Compression::Rle, &compressed)
        } else {
            (Compression::None, truncated)
        };

        let mut payload: ArrayVec<u8, DIAGNOSTIC_MAX_PAYLOAD> = ArrayVec::new();
        for &b in bytes.iter().take(DIAGNOSTIC_MAX_PAYLOAD) {
            let _ = payload.try_push(b);
        }

        let entry = DiagnosticEntry {
            timestamp_ms: now_ms(),
            sequence: self.sequence.next(),
            source,
            original_len,
            stored_len: payload.len(),
            compression,
            payload,
        };

        let mut entries = self.entries.lock().expect("diagnostic ring lock poisoned");
        if entries.len() >= DIAGNOSTIC_RING_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<DiagnosticEntry> {
        self.entries
            .lock()
            .expect("diagnostic ring lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("diagnostic ring lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains and returns every buffered entry, for the persister to flush.
    pub fn drain(&self) -> Vec<DiagnosticEntry> {
        let mut entries = self.entries.lock().expect("diagnostic ring lock poisoned");
        entries.drain(..).collect()
    }
}

impl Default for DiagnosticRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_entries_in_order_with_monotonic_sequence_numbers() {
        let ring = DiagnosticRing::new();
        ring.record(DiagnosticSource::Uart, b"hello");
        ring.record(DiagnosticSource::Bus, b"world");
        let snapshot = ring.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[1].sequence > snapshot[0].sequence);
    }

    #[test]
    fn evicts_the_oldest_entry_once_full() {
        let ring = DiagnosticRing::new();
        for i in 0..DIAGNOSTIC_RING_CAPACITY + 3 {
            ring.record(DiagnosticSource::Main, &[i as u8]);
        }
        assert_eq!(ring.len(), DIAGNOSTIC_RING_CAPACITY);
        let snapshot = ring.snapshot();
        assert_eq!(snapshot[0].payload[0], 3);
    }

    #[test]
    fn draining_empties_the_ring() {
        let ring = DiagnosticRing::new();
        ring.record(DiagnosticSource::Uart, b"x");
        assert_eq!(ring.drain().len(), 1);
        assert!(ring.is_empty());
    }
}
