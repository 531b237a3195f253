// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Monotonic millisecond clock and monotonic sequence IDs.
//!
//! The gateway never timestamps with wall-clock time: LiveData, diagnostic
//! entries and watchdog check-ins only need to be orderable against each
//! other, and a wall clock can jump backwards under NTP correction. A single
//! process-start `Instant` gives a monotonic millisecond counter that never
//! does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns milliseconds elapsed since this process started.
pub fn now_ms() -> u64 {
    PROCESS_START.elapsed().as_millis() as u64
}

/// A monotonically increasing sequence generator, shared by the event bus
/// and the diagnostic ring so every published event and logged entry gets a
/// strictly ordered identifier.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Returns the next sequence number, starting at 0.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let seq = SequenceGenerator::new();
        let a = seq.next();
        let b = seq.next();
        let c = seq.next();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn now_ms_is_monotonic() {
        let a = now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = now_ms();
        assert!(b >= a);
    }
}
