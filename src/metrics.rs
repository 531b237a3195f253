// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Internal process metrics: a small trait so the gateway's own health can
//! be reported the same way consumer data is, without pulling in a full
//! metrics-exporter stack by default.

use serde::Serialize;

use crate::poller::PollerDiagnostics;
use std::sync::atomic::Ordering;

/// A point-in-time summary of the poller's frame counters, suitable for a
/// status endpoint or a periodic log line.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub frames_total: u64,
    pub frames_valid: u64,
    pub header_errors: u64,
    pub length_errors: u64,
    pub crc_errors: u64,
    pub timeout_errors: u64,
    pub missing_register_errors: u64,
    pub bus_dropped_events: u64,
}

pub trait MetricsProvider: Send + Sync {
    fn snapshot(&self) -> MetricsSnapshot;
}

/// Reads directly off the poller's and bus's live counters.
pub struct GatewayMetricsProvider {
    pub poller: std::sync::Arc<PollerDiagnostics>,
    pub bus: std::sync::Arc<crate::bus::EventBus>,
}

impl MetricsProvider for GatewayMetricsProvider {
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_total: self.poller.frames_total.load(Ordering::Relaxed),
            frames_valid: self.poller.frames_valid.load(Ordering::Relaxed),
            header_errors: self.poller.header_errors.load(Ordering::Relaxed),
            length_errors: self.poller.length_errors.load(Ordering::Relaxed),
            crc_errors: self.poller.crc_errors.load(Ordering::Relaxed),
            timeout_errors: self.poller.timeout_errors.load(Ordering::Relaxed),
            missing_register_errors: self
                .poller
                .missing_register_errors
                .load(Ordering::Relaxed),
            bus_dropped_events: self.bus.dropped_events(),
        }
    }
}

/// Used where a `MetricsProvider` is required but nothing is wired up, e.g.
/// in unit tests for other subsystems.
pub struct NullMetricsProvider;

impl MetricsProvider for NullMetricsProvider {
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_total: 0,
            frames_valid: 0,
            header_errors: 0,
            length_errors: 0,
            crc_errors: 0,
            timeout_errors: 0,
            missing_register_errors: 0,
            bus_dropped_events: 0,
        }
    }
}
