// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Vendor dialect frame builders.
//!
//! Wire format: `0xAA | opcode | payload_length_bytes | payload... | CRC_LSB | CRC_MSB`.
//! Addresses are little-endian in this dialect; the codec never mixes byte
//! orders across opcodes (see [`crate::codec::modbus`] for the MSB dialect).

use crate::constants::{
    OP_READ_EVENTS, OP_READ_MULTI, OP_READ_SINGLE, OP_WRITE_SINGLE, VENDOR_PREAMBLE,
};
use crate::error::GatewayError;
use crate::registers::CATALOGUE;

use super::crc::append_crc;

/// Builds a read-single-register request (opcode `0x07`).
pub fn build_read_single(address: u16) -> Result<Vec<u8>, GatewayError> {
    let mut frame = Vec::with_capacity(8);
    frame.push(VENDOR_PREAMBLE);
    frame.push(OP_READ_SINGLE);
    frame.push(2); // payload length in bytes: one u16 address
    frame.extend_from_slice(&address.to_le_bytes());
    append_crc(&mut frame);
    Ok(frame)
}

/// Builds a write-single-register request (opcode `0x0D`).
pub fn build_write_single(address: u16, value: u16) -> Result<Vec<u8>, GatewayError> {
    let mut frame = Vec::with_capacity(10);
    frame.push(VENDOR_PREAMBLE);
    frame.push(OP_WRITE_SINGLE);
    frame.push(4);
    frame.extend_from_slice(&address.to_le_bytes());
    frame.extend_from_slice(&value.to_le_bytes());
    append_crc(&mut frame);
    Ok(frame)
}

/// Builds a read-newest-events request (opcode `0x11`). `count` is the
/// number of events requested; the firmware caps it internally.
pub fn build_read_events(count: u8) -> Result<Vec<u8>, GatewayError> {
    if count == 0 {
        return Err(GatewayError::InvalidArgument(
            "event count must be non-zero".to_string(),
        ));
    }
    let mut frame = Vec::with_capacity(6);
    frame.push(VENDOR_PREAMBLE);
    frame.push(OP_READ_EVENTS);
    frame.push(1);
    frame.push(count);
    append_crc(&mut frame);
    Ok(frame)
}

/// Builds a read-multiple-individual (poll) request for an arbitrary set of
/// addresses, in the order given. [`build_poll_request`] is the production
/// entry point; this is exposed separately so tests can exercise the exact
/// wire shape against a small, literal address list.
pub fn build_poll_request_for(addresses: &[u16]) -> Result<Vec<u8>, GatewayError> {
    let payload_len_bytes = addresses.len() * 2;
    if payload_len_bytes > u8::MAX as usize {
        return Err(GatewayError::InvalidSize(
            "poll request payload exceeds 255 bytes".to_string(),
        ));
    }

    let mut frame = Vec::with_capacity(3 + payload_len_bytes + 2);
    frame.push(VENDOR_PREAMBLE);
    frame.push(OP_READ_MULTI);
    frame.push(payload_len_bytes as u8);
    for address in addresses {
        frame.extend_from_slice(&address.to_le_bytes());
    }
    append_crc(&mut frame);
    Ok(frame)
}

/// Builds the poll request (opcode `0x09`, read-multiple-individual) from
/// the register catalogue. Idempotent: identical bytes on every call, since
/// the catalogue is fixed at build time.
pub fn build_poll_request() -> Result<Vec<u8>, GatewayError> {
    if CATALOGUE.len() > u8::MAX as usize / 2 {
        return Err(GatewayError::InvalidArgument(
            "catalogue too large for a single poll request".to_string(),
        ));
    }
    let addresses: Vec<u16> = CATALOGUE.iter().map(|e| e.address).collect();
    build_poll_request_for(&addresses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_request_is_idempotent() {
        let a = build_poll_request().unwrap();
        let b = build_poll_request().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn read_single_round_trips_its_address() {
        let frame = build_read_single(0x0034).unwrap();
        assert_eq!(frame[0], VENDOR_PREAMBLE);
        assert_eq!(frame[1], OP_READ_SINGLE);
        assert_eq!(frame[2], 2);
        assert_eq!(u16::from_le_bytes([frame[3], frame[4]]), 0x0034);
        super::super::crc::verify(&frame).unwrap();
    }

    #[test]
    fn write_single_shape_matches_s5_restart_scenario() {
        // spec.md §8 S5: write-register(0x0086, 0xA55A) ->
        // AA 0D 04 86 00 5A A5 CRC_LO CRC_HI
        let frame = build_write_single(0x0086, 0xA55A).unwrap();
        assert_eq!(&frame[..7], &[0xAA, 0x0D, 0x04, 0x86, 0x00, 0x5A, 0xA5]);
        assert_eq!(frame.len(), 9);
        super::super::crc::verify(&frame).unwrap();
    }

    #[test]
    fn s1_poll_request_shape_for_a_three_entry_catalogue() {
        // spec.md §8 S1: addresses {0x0000, 0x0001, 0x0024} ->
        // AA 09 06 00 00 01 00 24 00 CRC_LO CRC_HI, total length 11.
        let frame = build_poll_request_for(&[0x0000, 0x0001, 0x0024]).unwrap();
        assert_eq!(frame.len(), 11);
        assert_eq!(
            &frame[..9],
            &[0xAA, 0x09, 0x06, 0x00, 0x00, 0x01, 0x00, 0x24, 0x00]
        );
        super::super::crc::verify(&frame).unwrap();
    }

    #[test]
    fn read_events_rejects_zero_count() {
        assert!(matches!(
            build_read_events(0),
            Err(GatewayError::InvalidArgument(_))
        ));
    }
}
