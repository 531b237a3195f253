// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! CRC-16 used by both wire dialects: polynomial 0xA001 (reflected),
//! initial value 0xFFFF — the standard MODBUS CRC-16, computed over every
//! byte preceding the two CRC bytes and transmitted little-endian (LSB
//! first, then MSB).

use crc::{Crc, CRC_16_MODBUS};

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Computes the CRC-16/MODBUS checksum of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Appends the little-endian CRC-16 of `data` (everything already written)
/// to `out`.
pub fn append_crc(out: &mut Vec<u8>) {
    let crc = crc16(out);
    out.push((crc & 0xFF) as u8);
    out.push((crc >> 8) as u8);
}

/// Splits a frame into its payload (everything but the trailing CRC bytes)
/// and the CRC it claims, and reports whether it matches.
pub fn verify(frame: &[u8]) -> Result<(), crate::error::GatewayError> {
    if frame.len() < 2 {
        return Err(crate::error::GatewayError::InvalidSize(
            "frame too short to carry a CRC".to_string(),
        ));
    }
    let (body, crc_bytes) = frame.split_at(frame.len() - 2);
    let expected = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let calculated = crc16(body);
    if expected != calculated {
        return Err(crate::error::GatewayError::InvalidCrc {
            expected,
            calculated,
        });
    }
    Ok(())
}
