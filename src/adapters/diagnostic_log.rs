// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Logs diagnostic ring entries as structured, hex-payload log lines —
//! useful when no MQTT/CAN consumer is configured but a human still wants
//! visibility into frame-level problems.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bus::BusEvent;
use crate::util::encode_hex;

pub struct DiagnosticLogSubscriber;

impl DiagnosticLogSubscriber {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, mut rx: mpsc::Receiver<BusEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = rx.recv() => {
                    match event {
                        Some(BusEvent::DiagnosticLogEntry(entry)) => {
                            log::info!(
                                "diagnostic[{}] seq={} source={:?} original_len={} stored_len={} compression={:?} payload={}",
                                entry.timestamp_ms,
                                entry.sequence,
                                entry.source,
                                entry.original_len,
                                entry.stored_len,
                                entry.compression,
                                encode_hex(&entry.payload),
                            );
                        }
                        Some(_) => {}
                        None => return,
                    }
                }
            }
        }
    }
}

impl Default for DiagnosticLogSubscriber {
    fn default() -> Self {
        Self::new()
    }
}
