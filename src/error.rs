// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! # Gateway Error Handling
//!
//! This module defines the `GatewayError` enum shared by every subsystem of
//! the TinyBMS gateway: the frame codec, the link driver, the poller and
//! arbiter, the snapshot register and event bus, the watchdog, and the
//! diagnostic ring/persister.

use thiserror::Error;

/// Represents the different error kinds that can occur in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A request argument was out of range (e.g. a bad register count).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A buffer was too small to hold the requested frame.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// An operation was attempted from a state that does not allow it,
    /// e.g. a watchdog check-in before the watchdog was initialised.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// CRC verification failed on a received frame.
    #[error("invalid CRC: expected {expected:#06x}, calculated {calculated:#06x}")]
    InvalidCrc { expected: u16, calculated: u16 },

    /// A register address is not present in the catalogue, or a persisted
    /// snapshot does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A fixed-capacity slot table (watchdog tasks, listeners) is full.
    #[error("no memory: {0}")]
    NoMem(String),

    /// A response did not arrive within the per-command timeout, including
    /// after the sleep-wake retry.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A mutex or arbiter resource could not be acquired within its bound.
    #[error("busy: {0}")]
    Busy(String),

    /// The underlying serial port or persistence backend failed.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// A poll response was shorter than the catalogue's total word count.
    #[error("missing register data: expected {expected} words, got {got}")]
    MissingRegister { expected: usize, got: usize },

    /// A write was attempted against a read-only register.
    #[error("register is not writable: {0:#06x}")]
    NotAllowed(u16),
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::IoFailure(e.to_string())
    }
}

impl From<tokio_serial::Error> for GatewayError {
    fn from(e: tokio_serial::Error) -> Self {
        GatewayError::IoFailure(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for GatewayError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        GatewayError::Timeout("bounded wait elapsed".to_string())
    }
}
