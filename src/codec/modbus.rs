// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! MODBUS dialect frame builders, used only when the BMS firmware is
//! configured for MODBUS framing instead of the vendor dialect. Addresses
//! and register payloads are big-endian here; the codec never mixes byte
//! orders across opcodes.

use crate::constants::{MODBUS_OP_READ_HOLDING, MODBUS_OP_WRITE_HOLDING};
use crate::error::GatewayError;

use super::crc::append_crc;

/// Builds a MODBUS "read holding registers" request (function code `0x03`).
pub fn build_read_holding(
    slave_id: u8,
    start_address: u16,
    register_count: u16,
) -> Result<Vec<u8>, GatewayError> {
    if register_count == 0 {
        return Err(GatewayError::InvalidArgument(
            "register_count must be non-zero".to_string(),
        ));
    }
    let mut frame = Vec::with_capacity(8);
    frame.push(slave_id);
    frame.push(MODBUS_OP_READ_HOLDING);
    frame.extend_from_slice(&start_address.to_be_bytes());
    frame.extend_from_slice(&register_count.to_be_bytes());
    append_crc(&mut frame);
    Ok(frame)
}

/// Builds a MODBUS "write multiple holding registers" request (function
/// code `0x10`).
pub fn build_write_holding(
    slave_id: u8,
    start_address: u16,
    values: &[u16],
) -> Result<Vec<u8>, GatewayError> {
    if values.is_empty() {
        return Err(GatewayError::InvalidArgument(
            "values must be non-empty".to_string(),
        ));
    }
    let byte_count = values.len() * 2;
    if byte_count > u8::MAX as usize {
        return Err(GatewayError::InvalidSize(
            "write payload exceeds 255 bytes".to_string(),
        ));
    }

    let mut frame = Vec::with_capacity(7 + byte_count + 2);
    frame.push(slave_id);
    frame.push(MODBUS_OP_WRITE_HOLDING);
    frame.extend_from_slice(&start_address.to_be_bytes());
    frame.extend_from_slice(&(values.len() as u16).to_be_bytes());
    frame.push(byte_count as u8);
    for v in values {
        frame.extend_from_slice(&v.to_be_bytes());
    }
    append_crc(&mut frame);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_holding_uses_big_endian_address_and_count() {
        let frame = build_read_holding(0x01, 0x0034, 2).unwrap();
        assert_eq!(frame[0], 0x01);
        assert_eq!(frame[1], MODBUS_OP_READ_HOLDING);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), 0x0034);
        assert_eq!(u16::from_be_bytes([frame[4], frame[5]]), 2);
        super::super::crc::verify(&frame).unwrap();
    }

    #[test]
    fn write_holding_encodes_register_payload_big_endian() {
        let frame = build_write_holding(0x01, 0x0086, &[0xA55A]).unwrap();
        // slave, func, addr_hi, addr_lo, count_hi, count_lo, byte_count, val_hi, val_lo
        assert_eq!(frame[6], 2);
        assert_eq!(u16::from_be_bytes([frame[7], frame[8]]), 0xA55A);
        super::super::crc::verify(&frame).unwrap();
    }

    #[test]
    fn write_holding_rejects_empty_values() {
        assert!(matches!(
            build_write_holding(1, 0, &[]),
            Err(GatewayError::InvalidArgument(_))
        ));
    }
}
