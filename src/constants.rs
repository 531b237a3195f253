// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Protocol and timing constants for the TinyBMS serial link.

use std::time::Duration;

/// Vendor-dialect frame preamble byte.
pub const VENDOR_PREAMBLE: u8 = 0xAA;

/// Vendor opcode: read a single register.
pub const OP_READ_SINGLE: u8 = 0x07;
/// Vendor opcode: read multiple individual registers (the poll request).
pub const OP_READ_MULTI: u8 = 0x09;
/// Vendor opcode: write a single register.
pub const OP_WRITE_SINGLE: u8 = 0x0D;
/// Vendor opcode: read the newest events.
pub const OP_READ_EVENTS: u8 = 0x11;
/// Vendor opcode: positive acknowledgement.
pub const OP_ACK: u8 = 0x01;
/// Vendor opcode: negative acknowledgement.
pub const OP_NACK: u8 = 0x81;

/// MODBUS opcode: read holding registers.
pub const MODBUS_OP_READ_HOLDING: u8 = 0x03;
/// MODBUS opcode: write multiple holding registers.
pub const MODBUS_OP_WRITE_HOLDING: u8 = 0x10;

/// Minimum valid response length: preamble, opcode, length byte, 2 CRC bytes.
pub const MIN_RESPONSE_LEN: usize = 5;

/// Maximum number of register snapshots carried by one LiveData record.
pub const MAX_REGISTER_SNAPSHOTS: usize = 64;

/// Maximum words stored inline per register snapshot.
pub const MAX_SNAPSHOT_WORDS: usize = 8;

/// Maximum size of the reassembler's rolling buffer, in bytes.
pub const REASSEMBLER_MAX_BUFFER: usize = 128;

/// Maximum frame size the reassembler will accept before resyncing.
pub const MAX_FRAME_LEN: usize = 128;

/// Default / min / max poll interval.
pub const POLL_INTERVAL_DEFAULT_MS: u64 = 250;
pub const POLL_INTERVAL_MIN_MS: u64 = 100;
pub const POLL_INTERVAL_MAX_MS: u64 = 1000;

/// Delay the link driver waits after a silent command before retrying once.
pub const SLEEP_WAKE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Polled collection-loop read timeout.
pub const POLLED_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Default per-command response timeout (read-single / write-single / ACK wait).
pub const COMMAND_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default timeout for acquiring the command/arbiter mutex.
pub const ARBITER_MUTEX_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for acquiring a core data mutex (snapshot, ring, watchdog).
pub const DATA_MUTEX_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for acquiring a listener/diagnostic-adjacent mutex.
pub const LISTENER_MUTEX_TIMEOUT: Duration = Duration::from_millis(100);

/// Timeout for enqueueing an event on a bounded subscriber queue.
pub const BUS_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(50);

/// Default per-subscriber bounded queue depth.
pub const BUS_QUEUE_DEPTH: usize = 32;

/// Maximum listener slots of each kind on the snapshot register.
pub const MAX_LISTENERS_PER_KIND: usize = 4;

/// Maximum concurrently registered watchdog tasks.
pub const MAX_WATCHDOG_TASKS: usize = 16;
/// Maximum watchdog task name length.
pub const MAX_WATCHDOG_NAME_LEN: usize = 31;
/// Default soft-watchdog sweep interval.
pub const WATCHDOG_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Diagnostic ring capacity (entries).
pub const DIAGNOSTIC_RING_CAPACITY: usize = 64;
/// Maximum diagnostic payload length, in bytes, before compression.
pub const DIAGNOSTIC_MAX_PAYLOAD: usize = 96;

/// Persister save retry count and base back-off.
pub const PERSISTER_MAX_ATTEMPTS: u32 = 3;
pub const PERSISTER_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Flush manager thresholds.
pub const FLUSH_PENDING_THRESHOLD: u32 = 10;
pub const FLUSH_IDLE_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum grace delay before deinit reclaims mutexes during shutdown.
pub const SHUTDOWN_GRACE_DELAY: Duration = Duration::from_millis(200);

/// Base address of the fixed 8-word ASCII serial-number run.
pub const SERIAL_NUMBER_BASE_ADDRESS: u16 = 0x0020;
/// Base address of the contiguous 16-entry cell-voltage block.
pub const CELL_VOLTAGE_BASE_ADDRESS: u16 = 0x0000;
/// Number of cells tracked (and balancing bits).
pub const CELL_COUNT: usize = 16;
