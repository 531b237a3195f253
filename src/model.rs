// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Flat data types shared across the codec, parser, snapshot register and
//! consumer adapters: the register snapshot, the LiveData record, the
//! diagnostic entry, and the watchdog task record.

use arrayvec::ArrayVec;
use serde::Serialize;

use crate::constants::{CELL_COUNT, MAX_REGISTER_SNAPSHOTS, MAX_SNAPSHOT_WORDS};

/// Raw wire representation of a register's value, as declared by the
/// catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RawType {
    U16,
    I16,
    U32,
    F32,
    /// Two independent signed bytes packed into one 16-bit word.
    I8Pair,
}

/// One decoded register, in catalogue order, as it appeared in a poll
/// response. `raw_value` is sign-extended where the raw type is signed.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterSnapshot {
    pub address: u16,
    pub type_tag: RawType,
    pub raw_value: i64,
    pub word_count: u8,
    /// Inline copy of the register's wire words, zero-padded beyond
    /// `word_count`.
    pub words: [u16; MAX_SNAPSHOT_WORDS],
    pub text: Option<String>,
}

impl RegisterSnapshot {
    pub fn new(address: u16, type_tag: RawType, raw_value: i64, word_count: u8) -> Self {
        Self {
            address,
            type_tag,
            raw_value,
            word_count,
            words: [0u16; MAX_SNAPSHOT_WORDS],
            text: None,
        }
    }
}

/// A bounded, insertion-ordered list of register snapshots, one LiveData
/// record's worth.
pub type RegisterLog = ArrayVec<RegisterSnapshot, MAX_REGISTER_SNAPSHOTS>;

/// Alarm severity for the MQTT metrics schema: `0` clear, `2` active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum AlarmLevel {
    Clear,
    Active,
}

impl From<AlarmLevel> for u8 {
    fn from(level: AlarmLevel) -> u8 {
        match level {
            AlarmLevel::Clear => 0,
            AlarmLevel::Active => 2,
        }
    }
}

impl AlarmLevel {
    pub fn from_bit(set: bool) -> Self {
        if set {
            AlarmLevel::Active
        } else {
            AlarmLevel::Clear
        }
    }
}

/// Alarm/warning projection used by the MQTT metrics adapter.
#[derive(Debug, Clone, Serialize)]
pub struct Alarms {
    pub high_charge: AlarmLevel,
    pub high_discharge: AlarmLevel,
    pub cell_imbalance: AlarmLevel,
    pub raw_alarm_bits: u16,
    pub raw_warning_bits: u16,
}

/// Charge/discharge current limits projection.
#[derive(Debug, Clone, Serialize)]
pub struct Limits {
    pub max_charge_current_a: f32,
    pub max_discharge_current_a: f32,
    pub charge_overcurrent_limit_a: f32,
    pub discharge_overcurrent_limit_a: f32,
}

/// The typed, engineering-unit projection of a full poll response, plus the
/// ordered register log that produced it. Exactly one valid, CRC-checked
/// frame produces one `LiveData`.
#[derive(Debug, Clone, Serialize)]
pub struct LiveData {
    pub timestamp_ms: u64,

    pub pack_voltage_v: f32,
    pub pack_current_a: f32,
    pub cell_voltages_mv: [u16; CELL_COUNT],
    pub min_cell_mv: Option<u16>,
    pub max_cell_mv: Option<u16>,
    pub imbalance_mv: u16,

    pub state_of_charge_pct: f32,
    pub state_of_health_pct: f32,

    pub pack_temperature_min_c: f32,
    pub pack_temperature_max_c: f32,
    pub mosfet_temperature_c: f32,

    pub balancing_bits: u16,
    pub cell_balancing: [u8; CELL_COUNT],

    pub status_code: u16,
    pub raw_alarm_bits: u16,
    pub raw_warning_bits: u16,

    pub charge_cutoff_voltage_v: f32,
    pub discharge_cutoff_voltage_v: f32,
    pub limits: Limits,

    pub cycle_count: u32,
    pub uptime_s: u32,
    pub serial_number: String,

    pub register_log: RegisterLog,
}

impl LiveData {
    pub fn alarms(&self) -> Alarms {
        Alarms {
            high_charge: AlarmLevel::from_bit(self.raw_alarm_bits & 0x0001 != 0),
            high_discharge: AlarmLevel::from_bit(self.raw_alarm_bits & 0x0002 != 0),
            cell_imbalance: AlarmLevel::from_bit(self.raw_warning_bits & 0x0001 != 0),
            raw_alarm_bits: self.raw_alarm_bits,
            raw_warning_bits: self.raw_warning_bits,
        }
    }

    pub fn power_w(&self) -> f32 {
        self.pack_voltage_v * self.pack_current_a
    }

    pub fn average_temperature_c(&self) -> f32 {
        (self.pack_temperature_min_c + self.pack_temperature_max_c) / 2.0
    }
}

/// Source of a diagnostic log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticSource {
    Uart,
    Bus,
    Main,
}

/// Compression applied to a diagnostic entry's stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compression {
    None,
    Rle,
}

/// One entry in the diagnostic ring buffer.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEntry {
    pub timestamp_ms: u64,
    pub sequence: u64,
    pub source: DiagnosticSource,
    pub original_len: usize,
    pub stored_len: usize,
    pub compression: Compression,
    pub payload: ArrayVec<u8, { crate::constants::DIAGNOSTIC_MAX_PAYLOAD }>,
}

/// A single task's liveness record tracked by the soft watchdog.
#[derive(Debug, Clone, Serialize)]
pub struct WatchdogTaskRecord {
    pub name: String,
    pub timeout_ms: u64,
    pub last_checkin_ms: u64,
    pub missed_checkins: u64,
    pub is_alive: bool,
}
