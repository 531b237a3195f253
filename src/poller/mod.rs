// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Poller and command arbiter: owns the serial link exclusively, runs the
//! fixed-period poll cycle, and interleaves on-demand read/write register
//! commands ahead of the next scheduled poll. Commands and pauses arrive
//! over a bounded inbox so the link is never touched from two tasks at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bus::{BusEvent, EventBus};
use crate::codec::{self, vendor};
use crate::constants::POLL_INTERVAL_DEFAULT_MS;
use crate::error::GatewayError;
use crate::link::LinkDriver;
use crate::parser::decode_live_data;
use crate::registers::CATALOGUE;
use crate::snapshot::SnapshotRegister;
use crate::util::logging::LogThrottle;

/// At most one warning per second for a given poll-cycle failure, so a BMS
/// that's gone silent or noisy doesn't flood the log at the poll rate.
const POLL_ERROR_LOG_WINDOW_MS: u64 = 1_000;
const POLL_ERROR_LOG_CAP: u32 = 1;

/// The arbiter's current relationship to the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    AwaitingResponse,
    Paused,
}

/// Requests sent to the poller from the rest of the gateway. Writes and
/// reads always complete (or time out) before the next scheduled poll.
pub enum ArbiterMessage {
    Pause,
    Resume,
    WriteRegister {
        address: u16,
        value: u16,
        respond_to: oneshot::Sender<Result<u16, GatewayError>>,
    },
    ReadRegister {
        address: u16,
        respond_to: oneshot::Sender<Result<u16, GatewayError>>,
    },
}

/// Cumulative counters describing what the poller has seen on the wire.
#[derive(Debug, Default)]
pub struct PollerDiagnostics {
    pub frames_total: AtomicU64,
    pub frames_valid: AtomicU64,
    pub header_errors: AtomicU64,
    pub length_errors: AtomicU64,
    pub crc_errors: AtomicU64,
    pub timeout_errors: AtomicU64,
    pub missing_register_errors: AtomicU64,
}

impl PollerDiagnostics {
    fn record(&self, outcome: &Result<Vec<u16>, GatewayError>) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Ok(_) => {
                self.frames_valid.fetch_add(1, Ordering::Relaxed);
            }
            Err(GatewayError::InvalidArgument(_)) => {
                self.header_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(GatewayError::InvalidSize(_)) => {
                self.length_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(GatewayError::InvalidCrc { .. }) => {
                self.crc_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(GatewayError::Timeout(_)) => {
                self.timeout_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(GatewayError::MissingRegister { .. }) => {
                self.missing_register_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
    }
}

/// What a caller holds onto to talk to a running poller.
pub struct PollerHandle {
    pub inbox: mpsc::Sender<ArbiterMessage>,
    pub diagnostics: Arc<PollerDiagnostics>,
}

pub struct Poller {
    link: LinkDriver,
    inbox: mpsc::Receiver<ArbiterMessage>,
    snapshot: Arc<SnapshotRegister>,
    bus: Arc<EventBus>,
    diagnostics: Arc<PollerDiagnostics>,
    poll_interval: tokio::time::Duration,
    state: PollerState,
    error_log_throttle: LogThrottle,
}

impl Poller {
    pub fn new(
        link: LinkDriver,
        snapshot: Arc<SnapshotRegister>,
        bus: Arc<EventBus>,
        poll_interval: tokio::time::Duration,
    ) -> (Self, PollerHandle) {
        let (tx, rx) = mpsc::channel(16);
        let diagnostics = Arc::new(PollerDiagnostics::default());
        let poller = Self {
            link,
            inbox: rx,
            snapshot,
            bus,
            diagnostics: diagnostics.clone(),
            poll_interval,
            state: PollerState::Idle,
            error_log_throttle: LogThrottle::new(POLL_ERROR_LOG_WINDOW_MS, POLL_ERROR_LOG_CAP),
        };
        (poller, PollerHandle { inbox: tx, diagnostics })
    }

    /// Runs the poll/arbiter loop until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                message = self.inbox.recv() => {
                    match message {
                        Some(msg) => self.handle_message(msg).await,
                        None => return,
                    }
                }
                _ = ticker.tick(), if self.state != PollerState::Paused => {
                    self.state = PollerState::AwaitingResponse;
                    self.poll_once().await;
                    self.state = PollerState::Idle;
                }
            }
        }
    }

    async fn handle_message(&mut self, message: ArbiterMessage) {
        match message {
            ArbiterMessage::Pause => self.state = PollerState::Paused,
            ArbiterMessage::Resume => {
                if self.state == PollerState::Paused {
                    self.state = PollerState::Idle;
                }
            }
            ArbiterMessage::WriteRegister {
                address,
                value,
                respond_to,
            } => {
                let result = self.write_register(address, value).await;
                let _ = respond_to.send(result);
            }
            ArbiterMessage::ReadRegister {
                address,
                respond_to,
            } => {
                let result = self.read_register(address).await;
                let _ = respond_to.send(result);
            }
        }
    }

    /// Writes a register, awaits its ACK, then issues an immediate
    /// verification read of the same address and returns whatever raw value
    /// comes back. Both frames go out before the poller's inbox is checked
    /// again, so no poll can land in between.
    async fn write_register(&mut self, address: u16, value: u16) -> Result<u16, GatewayError> {
        let entry = crate::registers::find(address)
            .ok_or_else(|| GatewayError::NotFound(format!("register {address:#06x}")))?;
        if !entry.writable {
            return Err(GatewayError::NotAllowed(address));
        }
        let frame = vendor::build_write_single(address, value)?;
        let response = self.link.send_and_await(&frame).await?;
        if response.len() < 2 || response[0] != crate::constants::VENDOR_PREAMBLE {
            return Err(GatewayError::InvalidArgument(
                "malformed write acknowledgement".to_string(),
            ));
        }
        if response[1] == crate::constants::OP_NACK {
            return Err(GatewayError::InvalidState(
                "controller rejected the write".to_string(),
            ));
        }
        self.bus
            .publish(BusEvent::RegisterUpdate { address, value })
            .await;
        let confirmed = self.read_register(address).await?;
        Ok(confirmed)
    }

    async fn read_register(&mut self, address: u16) -> Result<u16, GatewayError> {
        crate::registers::find(address)
            .ok_or_else(|| GatewayError::NotFound(format!("register {address:#06x}")))?;
        let frame = vendor::build_read_single(address)?;
        let response = self.link.send_and_await(&frame).await?;
        if response.len() < 5 {
            return Err(GatewayError::InvalidSize(
                "read-single response too short".to_string(),
            ));
        }
        Ok(u16::from_le_bytes([response[3], response[4]]))
    }

    async fn poll_once(&mut self) {
        let outcome = self.do_poll().await;
        self.diagnostics.record(&outcome);
        match outcome {
            Ok(words) => match decode_live_data(&words, crate::clock::now_ms()) {
                Ok(live) => {
                    self.snapshot.update(live.clone());
                    self.bus.publish(BusEvent::BmsLiveData(Arc::new(live))).await;
                }
                Err(e) => {
                    self.diagnostics
                        .missing_register_errors
                        .fetch_add(1, Ordering::Relaxed);
                    if self.error_log_throttle.allow() {
                        log::warn!("poll cycle decoded words but could not build a live-data record: {e}");
                    }
                }
            },
            Err(e) if self.error_log_throttle.allow() => {
                log::warn!("poll cycle failed: {e}");
            }
            Err(_) => {}
        }
    }

    async fn do_poll(&mut self) -> Result<Vec<u16>, GatewayError> {
        let request = vendor::build_poll_request()?;
        let response = self.link.send_and_await(&request).await?;
        codec::parse_poll_response(&response)
    }
}

/// Default polling period, used when a configuration value isn't given.
pub fn default_poll_interval() -> tokio::time::Duration {
    tokio::time::Duration::from_millis(POLL_INTERVAL_DEFAULT_MS)
}

/// Total word count the poller expects back on every cycle; exposed so
/// callers don't need to reach into `crate::registers` directly.
pub fn expected_catalogue_len() -> usize {
    CATALOGUE.len()
}
