// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! # Register Catalogue
//!
//! Static metadata for every register the gateway polls from the TinyBMS:
//! address, wire word count, raw encoding, scale factor and the semantic
//! LiveData field(s) it feeds. The catalogue is immutable, built once at
//! first use, and transmitted in declaration order — the poll request's
//! payload length in 16-bit words is the sum of every entry's `word_count`.

use once_cell::sync::Lazy;

use crate::model::RawType;

/// The LiveData field a register's decoded (and scaled) value is written
/// into. Some registers populate two fields (e.g. an `I8Pair` register
/// carrying both a min and a max temperature).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveField {
    PackVoltage,
    PackCurrent,
    CellVoltageBlock,
    StateOfCharge,
    StateOfHealth,
    PackTemperatureMin,
    PackTemperatureMax,
    MosfetTemperature,
    BalancingBits,
    StatusCode,
    AlarmBits,
    WarningBits,
    ChargeCutoffVoltage,
    DischargeCutoffVoltage,
    MaxChargeCurrent,
    MaxDischargeCurrent,
    ChargeOvercurrentLimit,
    DischargeOvercurrentLimit,
    CycleCount,
    UptimeSeconds,
    SerialNumberAscii,
}

/// One catalogue entry: everything the parser needs to decode a register
/// and route its value onto the LiveData record.
#[derive(Debug, Clone, Copy)]
pub struct RegisterEntry {
    pub address: u16,
    pub word_count: u8,
    pub raw_type: RawType,
    pub scale: f32,
    pub primary_field: Option<LiveField>,
    pub secondary_field: Option<LiveField>,
    pub unit: &'static str,
    pub doc: &'static str,
    /// Registers the arbiter will refuse to write to (`NotAllowed`).
    pub writable: bool,
}

const fn entry(
    address: u16,
    word_count: u8,
    raw_type: RawType,
    scale: f32,
    primary_field: Option<LiveField>,
    unit: &'static str,
    doc: &'static str,
) -> RegisterEntry {
    RegisterEntry {
        address,
        word_count,
        raw_type,
        scale,
        primary_field,
        secondary_field: None,
        unit,
        doc,
        writable: false,
    }
}

/// Full register set polled on every cycle, in wire order. Cell voltages
/// occupy a contiguous 16-entry block starting at
/// [`crate::constants::CELL_VOLTAGE_BASE_ADDRESS`]; the serial number
/// occupies the fixed 8-word run at
/// [`crate::constants::SERIAL_NUMBER_BASE_ADDRESS`].
pub static CATALOGUE: Lazy<Vec<RegisterEntry>> = Lazy::new(build_catalogue);

fn build_catalogue() -> Vec<RegisterEntry> {
    let mut v = Vec::new();

    // Cell voltages: 16 contiguous U16 registers in millivolts, no scaling.
    for i in 0..crate::constants::CELL_COUNT as u16 {
        v.push(entry(
            crate::constants::CELL_VOLTAGE_BASE_ADDRESS + i,
            1,
            RawType::U16,
            1.0,
            Some(LiveField::CellVoltageBlock),
            "mV",
            "Individual cell voltage",
        ));
    }

    // Serial number: 8-word ASCII run.
    v.push(RegisterEntry {
        address: crate::constants::SERIAL_NUMBER_BASE_ADDRESS,
        word_count: 8,
        raw_type: RawType::U16,
        scale: 1.0,
        primary_field: Some(LiveField::SerialNumberAscii),
        secondary_field: None,
        unit: "",
        doc: "Device serial number, ASCII",
        writable: false,
    });

    v.push(entry(
        0x0034,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::PackVoltage),
        "V",
        "Pack voltage",
    ));
    v.push(entry(
        0x0036,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::PackCurrent),
        "A",
        "Pack current, positive = charge",
    ));
    v.push(entry(
        0x0046,
        2,
        RawType::U32,
        1e-6,
        Some(LiveField::StateOfCharge),
        "%",
        "State of charge",
    ));
    v.push(entry(
        0x0048,
        2,
        RawType::U32,
        1e-6,
        Some(LiveField::StateOfHealth),
        "%",
        "State of health",
    ));

    // Pack temperature min/max packed as two signed bytes in one word.
    v.push(RegisterEntry {
        address: 0x0050,
        word_count: 1,
        raw_type: RawType::I8Pair,
        scale: 1.0,
        primary_field: Some(LiveField::PackTemperatureMin),
        secondary_field: Some(LiveField::PackTemperatureMax),
        unit: "C",
        doc: "Pack temperature min (low byte) / max (high byte)",
        writable: false,
    });

    v.push(entry(
        0x0052,
        1,
        RawType::I16,
        0.1,
        Some(LiveField::MosfetTemperature),
        "C",
        "MOSFET temperature",
    ));

    v.push(entry(
        0x0060,
        1,
        RawType::U16,
        1.0,
        Some(LiveField::BalancingBits),
        "",
        "Per-cell balancing bitfield, bit i = cell i",
    ));
    v.push(entry(
        0x0062,
        1,
        RawType::U16,
        1.0,
        Some(LiveField::StatusCode),
        "",
        "Controller status code",
    ));
    v.push(entry(
        0x0064,
        1,
        RawType::U16,
        1.0,
        Some(LiveField::AlarmBits),
        "",
        "Raw alarm bitfield",
    ));
    v.push(entry(
        0x0066,
        1,
        RawType::U16,
        1.0,
        Some(LiveField::WarningBits),
        "",
        "Raw warning bitfield",
    ));

    v.push(entry(
        0x0068,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::ChargeCutoffVoltage),
        "V",
        "Over-voltage charge cutoff threshold",
    ));
    v.push(entry(
        0x006A,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::DischargeCutoffVoltage),
        "V",
        "Under-voltage discharge cutoff threshold",
    ));
    v.push(entry(
        0x006C,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::MaxChargeCurrent),
        "A",
        "Configured maximum charge current",
    ));
    v.push(entry(
        0x006E,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::MaxDischargeCurrent),
        "A",
        "Configured maximum discharge current",
    ));
    v.push(entry(
        0x0070,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::ChargeOvercurrentLimit),
        "A",
        "Charge overcurrent protection limit",
    ));
    v.push(entry(
        0x0072,
        2,
        RawType::F32,
        1.0,
        Some(LiveField::DischargeOvercurrentLimit),
        "A",
        "Discharge overcurrent protection limit",
    ));

    v.push(RegisterEntry {
        address: 0x0086,
        word_count: 1,
        raw_type: RawType::U16,
        scale: 1.0,
        primary_field: None,
        secondary_field: None,
        unit: "",
        doc: "Controller restart command (write-only, 0xA55A)",
        writable: true,
    });

    v.push(entry(
        0x0090,
        2,
        RawType::U32,
        1.0,
        Some(LiveField::CycleCount),
        "",
        "Charge/discharge cycle count",
    ));
    v.push(entry(
        0x0092,
        2,
        RawType::U32,
        1.0,
        Some(LiveField::UptimeSeconds),
        "s",
        "Controller uptime",
    ));

    v
}

/// Total number of 16-bit words the catalogue spans on the wire; the poll
/// request's declared payload length in words.
pub fn total_word_count() -> usize {
    CATALOGUE.iter().map(|e| e.word_count as usize).sum()
}

/// Looks up a catalogue entry by register address.
pub fn find(address: u16) -> Option<&'static RegisterEntry> {
    CATALOGUE.iter().find(|e| e.address == address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_is_non_empty_and_ordered_by_insertion() {
        assert!(!CATALOGUE.is_empty());
        // Cell voltage block occupies the first 16 slots.
        for (i, e) in CATALOGUE.iter().take(16).enumerate() {
            assert_eq!(e.address, crate::constants::CELL_VOLTAGE_BASE_ADDRESS + i as u16);
        }
    }

    #[test]
    fn total_word_count_matches_sum() {
        let expected: usize = CATALOGUE.iter().map(|e| e.word_count as usize).sum();
        assert_eq!(total_word_count(), expected);
    }

    #[test]
    fn restart_register_is_the_only_writable_one() {
        let writable: Vec<_> = CATALOGUE.iter().filter(|e| e.writable).collect();
        assert_eq!(writable.len(), 1);
        assert_eq!(writable[0].address, 0x0086);
    }
}
