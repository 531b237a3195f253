// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Turns a validated, catalogue-order word sequence (from
//! [`crate::codec::parse_poll_response`]) into a [`LiveData`] record.
//!
//! Every catalogue entry is visited in declaration order, consuming exactly
//! `word_count` words each; this must line up byte-for-byte with how
//! [`crate::codec::vendor::build_poll_request`] built the request from the
//! same catalogue.

use crate::constants::CELL_COUNT;
use crate::error::GatewayError;
use crate::model::{Limits, LiveData, RegisterLog, RegisterSnapshot};
use crate::registers::{LiveField, RegisterEntry, CATALOGUE};

fn decode_ascii_block(words: &[u16]) -> String {
    let mut text = String::with_capacity(words.len() * 2);
    for w in words {
        for byte in [(*w & 0xFF) as u8, (*w >> 8) as u8] {
            if byte.is_ascii_graphic() || byte == b' ' {
                text.push(byte as char);
            }
        }
    }
    text.trim().to_string()
}

struct Decoded {
    raw_value: i64,
    primary: f32,
    secondary: Option<f32>,
}

fn decode_numeric(entry: &RegisterEntry, words: &[u16]) -> Decoded {
    use crate::model::RawType::*;
    match entry.raw_type {
        U16 => {
            let raw = words[0];
            Decoded {
                raw_value: raw as i64,
                primary: raw as f32 * entry.scale,
                secondary: None,
            }
        }
        I16 => {
            let raw = words[0] as i16;
            Decoded {
                raw_value: raw as i64,
                primary: raw as f32 * entry.scale,
                secondary: None,
            }
        }
        U32 => {
            let raw = (words[0] as u32) | ((words[1] as u32) << 16);
            Decoded {
                raw_value: raw as i64,
                primary: raw as f32 * entry.scale,
                secondary: None,
            }
        }
        F32 => {
            let bits = (words[0] as u32) | ((words[1] as u32) << 16);
            let value = f32::from_bits(bits);
            Decoded {
                raw_value: bits as i64,
                primary: value * entry.scale,
                secondary: None,
            }
        }
        I8Pair => {
            let word = words[0];
            let lo = (word & 0xFF) as u8 as i8;
            let hi = (word >> 8) as u8 as i8;
            Decoded {
                raw_value: word as i64,
                primary: lo as f32 * entry.scale,
                secondary: Some(hi as f32 * entry.scale),
            }
        }
    }
}

/// Decodes a complete, catalogue-length word sequence into a `LiveData`.
///
/// `words.len()` must equal [`crate::registers::total_word_count`]; the
/// codec layer already enforces this before calling in, but a defensive
/// check remains here since this function is also usable standalone.
pub fn decode_live_data(words: &[u16], timestamp_ms: u64) -> Result<LiveData, GatewayError> {
    let expected = crate::registers::total_word_count();
    if words.len() != expected {
        return Err(GatewayError::MissingRegister {
            expected,
            got: words.len(),
        });
    }

    let mut register_log = RegisterLog::new();
    let mut cell_voltages_mv = [0u16; CELL_COUNT];
    let mut serial_number = String::new();
    let mut pack_voltage_v = 0f32;
    let mut pack_current_a = 0f32;
    let mut state_of_charge_pct = 0f32;
    let mut state_of_health_pct = 0f32;
    let mut pack_temperature_min_c = 0f32;
    let mut pack_temperature_max_c = 0f32;
    let mut mosfet_temperature_c = 0f32;
    let mut balancing_bits = 0u16;
    let mut status_code = 0u16;
    let mut raw_alarm_bits = 0u16;
    let mut raw_warning_bits = 0u16;
    let mut charge_cutoff_voltage_v = 0f32;
    let mut discharge_cutoff_voltage_v = 0f32;
    let mut max_charge_current_a = 0f32;
    let mut max_discharge_current_a = 0f32;
    let mut charge_overcurrent_limit_a = 0f32;
    let mut discharge_overcurrent_limit_a = 0f32;
    let mut cycle_count = 0u32;
    let mut uptime_s = 0u32;

    let mut cursor = 0usize;
    for entry in CATALOGUE.iter() {
        let wc = entry.word_count as usize;
        let slice = &words[cursor..cursor + wc];
        cursor += wc;

        let mut snapshot =
            RegisterSnapshot::new(entry.address, entry.raw_type, 0, entry.word_count);
        for (i, w) in slice.iter().enumerate().take(snapshot.words.len()) {
            snapshot.words[i] = *w;
        }

        if entry.primary_field == Some(LiveField::SerialNumberAscii) {
            let text = decode_ascii_block(slice);
            serial_number = text.clone();
            snapshot.text = Some(text);
            let _ = register_log.try_push(snapshot);
            continue;
        }

        let decoded = decode_numeric(entry, slice);
        snapshot.raw_value = decoded.raw_value;

        if let Some(field) = entry.primary_field {
            route(
                field,
                decoded.primary,
                entry.address,
                &mut cell_voltages_mv,
                &mut pack_voltage_v,
                &mut pack_current_a,
                &mut state_of_charge_pct,
                &mut state_of_health_pct,
                &mut pack_temperature_min_c,
                &mut mosfet_temperature_c,
                &mut balancing_bits,
                &mut status_code,
                &mut raw_alarm_bits,
                &mut raw_warning_bits,
                &mut charge_cutoff_voltage_v,
                &mut discharge_cutoff_voltage_v,
                &mut max_charge_current_a,
                &mut max_discharge_current_a,
                &mut charge_overcurrent_limit_a,
                &mut discharge_overcurrent_limit_a,
                &mut cycle_count,
                &mut uptime_s,
            );
        }
        if let (Some(field), Some(value)) = (entry.secondary_field, decoded.secondary) {
            // Only PackTemperatureMax uses the secondary slot today.
            if field == LiveField::PackTemperatureMax {
                pack_temperature_max_c = value;
            }
        }

        let _ = register_log.try_push(snapshot);
    }

    let min_cell_mv = cell_voltages_mv.iter().copied().min();
    let max_cell_mv = cell_voltages_mv.iter().copied().max();
    let imbalance_mv = match (min_cell_mv, max_cell_mv) {
        (Some(min), Some(max)) => max - min,
        _ => 0,
    };
    let mut cell_balancing = [0u8; CELL_COUNT];
    for (i, slot) in cell_balancing.iter_mut().enumerate() {
        *slot = ((balancing_bits >> i) & 0x1) as u8;
    }

    Ok(LiveData {
        timestamp_ms,
        pack_voltage_v,
        pack_current_a,
        cell_voltages_mv,
        min_cell_mv,
        max_cell_mv,
        imbalance_mv,
        state_of_charge_pct,
        state_of_health_pct,
        pack_temperature_min_c,
        pack_temperature_max_c,
        mosfet_temperature_c,
        balancing_bits,
        cell_balancing,
        status_code,
        raw_alarm_bits,
        raw_warning_bits,
        charge_cutoff_voltage_v,
        discharge_cutoff_voltage_v,
        limits: Limits {
            max_charge_current_a,
            max_discharge_current_a,
            charge_overcurrent_limit_a,
            discharge_overcurrent_limit_a,
        },
        cycle_count,
        uptime_s,
        serial_number,
        register_log,
    })
}

#[allow(clippy::too_many_arguments)]
fn route(
    field: LiveField,
    value: f32,
    address: u16,
    cell_voltages_mv: &mut [u16; CELL_COUNT],
    pack_voltage_v: &mut f32,
    pack_current_a: &mut f32,
    state_of_charge_pct: &mut f32,
    state_of_health_pct: &mut f32,
    pack_temperature_min_c: &mut f32,
    mosfet_temperature_c: &mut f32,
    balancing_bits: &mut u16,
    status_code: &mut u16,
    raw_alarm_bits: &mut u16,
    raw_warning_bits: &mut u16,
    charge_cutoff_voltage_v: &mut f32,
    discharge_cutoff_voltage_v: &mut f32,
    max_charge_current_a: &mut f32,
    max_discharge_current_a: &mut f32,
    charge_overcurrent_limit_a: &mut f32,
    discharge_overcurrent_limit_a: &mut f32,
    cycle_count: &mut u32,
    uptime_s: &mut u32,
) {
    match field {
        LiveField::CellVoltageBlock => {
            let idx = (address - crate::constants::CELL_VOLTAGE_BASE_ADDRESS) as usize;
            if idx < cell_voltages_mv.len() {
                cell_voltages_mv[idx] = value as u16;
            }
        }
        LiveField::PackVoltage => *pack_voltage_v = value,
        LiveField::PackCurrent => *pack_current_a = value,
        LiveField::StateOfCharge => *state_of_charge_pct = value,
        LiveField::StateOfHealth => *state_of_health_pct = value,
        LiveField::PackTemperatureMin => *pack_temperature_min_c = value,
        LiveField::PackTemperatureMax => { /* handled via secondary_field */ }
        LiveField::MosfetTemperature => *mosfet_temperature_c = value,
        LiveField::BalancingBits => *balancing_bits = value as u16,
        LiveField::StatusCode => *status_code = value as u16,
        LiveField::AlarmBits => *raw_alarm_bits = value as u16,
        LiveField::WarningBits => *raw_warning_bits = value as u16,
        LiveField::ChargeCutoffVoltage => *charge_cutoff_voltage_v = value,
        LiveField::DischargeCutoffVoltage => *discharge_cutoff_voltage_v = value,
        LiveField::MaxChargeCurrent => *max_charge_current_a = value,
        LiveField::MaxDischargeCurrent => *max_discharge_current_a = value,
        LiveField::ChargeOvercurrentLimit => *charge_overcurrent_limit_a = value,
        LiveField::DischargeOvercurrentLimit => *discharge_overcurrent_limit_a = value,
        LiveField::CycleCount => *cycle_count = value as u32,
        LiveField::UptimeSeconds => *uptime_s = value as u32,
        LiveField::SerialNumberAscii => {}
    }
}
