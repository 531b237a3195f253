// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Owns the serial port and turns request/response pairs into a single
//! async call, hiding the reassembler and the sleep-wake retry from callers.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{Duration, Instant};
use tokio_serial::SerialPortBuilderExt;

use crate::constants::{COMMAND_RESPONSE_TIMEOUT, POLLED_READ_TIMEOUT, SLEEP_WAKE_RETRY_DELAY};
use crate::error::GatewayError;

use super::reassembler::Reassembler;

/// How the driver learns that new bytes are available on the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionMode {
    /// Reads the port on a short timeout in a loop. Works everywhere
    /// `tokio-serial` does; this is the default.
    #[default]
    Polled,
    /// Reserved for a future `SerialEventSource` hook on platforms that can
    /// interrupt on RX instead of polling. Not yet implemented: there is no
    /// portable tokio-serial equivalent, so this variant only exists to
    /// reserve the name behind the feature flag.
    #[cfg(feature = "interrupt-events")]
    EventDriven,
}

pub struct LinkDriver {
    port: tokio_serial::SerialStream,
    reassembler: Reassembler,
    mode: CollectionMode,
}

impl LinkDriver {
    pub fn new(port: tokio_serial::SerialStream, mode: CollectionMode) -> Self {
        Self {
            port,
            reassembler: Reassembler::new(),
            mode,
        }
    }

    /// Opens the named serial device at the given baud rate.
    pub fn open(path: &str, baud_rate: u32, mode: CollectionMode) -> Result<Self, GatewayError> {
        let port = tokio_serial::new(path, baud_rate).open_native_async()?;
        Ok(Self::new(port, mode))
    }

    pub fn mode(&self) -> CollectionMode {
        self.mode
    }

    pub fn bytes_dropped(&self) -> u64 {
        self.reassembler.bytes_dropped()
    }

    /// Sends `request` and awaits one complete response frame. If the
    /// controller stays silent for the whole command timeout — it may have
    /// been asleep — the request is resent once after
    /// [`SLEEP_WAKE_RETRY_DELAY`] before giving up.
    pub async fn send_and_await(&mut self, request: &[u8]) -> Result<Vec<u8>, GatewayError> {
        self.port.write_all(request).await?;
        match self.await_frame(COMMAND_RESPONSE_TIMEOUT).await {
            Err(GatewayError::Timeout(_)) => {
                tokio::time::sleep(SLEEP_WAKE_RETRY_DELAY).await;
                self.port.write_all(request).await?;
                self.await_frame(COMMAND_RESPONSE_TIMEOUT).await
            }
            other => other,
        }
    }

    /// Polls the port once for whatever is immediately available and feeds
    /// it to the reassembler, returning a frame if one is now complete. Used
    /// by the unsolicited-event collection loop between commands.
    pub async fn poll_once(&mut self) -> Result<Option<Vec<u8>>, GatewayError> {
        let mut buf = [0u8; 256];
        match tokio::time::timeout(POLLED_READ_TIMEOUT, self.port.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => {}
            Ok(Ok(n)) => self.reassembler.push(&buf[..n])?,
            Ok(Err(e)) => return Err(e.into()),
        }
        Ok(self.reassembler.try_extract_frame())
    }

    async fn await_frame(&mut self, budget: Duration) -> Result<Vec<u8>, GatewayError> {
        let deadline = Instant::now() + budget;
        loop {
            if let Some(frame) = self.reassembler.try_extract_frame() {
                return Ok(frame);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(GatewayError::Timeout(
                    "no response frame within command timeout".to_string(),
                ));
            }
            let read_timeout = remaining.min(POLLED_READ_TIMEOUT);
            let mut buf = [0u8; 256];
            match tokio::time::timeout(read_timeout, self.port.read(&mut buf)).await {
                Ok(Ok(0)) | Err(_) => continue,
                Ok(Ok(n)) => self.reassembler.push(&buf[..n])?,
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }
}
