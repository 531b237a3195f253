// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Response frame validation and word extraction.
//!
//! Validation happens here; semantic decoding (scaling, field routing,
//! derived fields) happens in [`crate::parser`]. This split mirrors
//! spec.md §4.1/§4.6: the codec validates and hands over a flat word
//! sequence in catalogue order, the parser turns that into a `LiveData`.

use nom::multi::many0;
use nom::number::complete::le_u16;
use nom::IResult;

use crate::constants::{MIN_RESPONSE_LEN, OP_READ_MULTI, VENDOR_PREAMBLE};
use crate::error::GatewayError;
use crate::registers::total_word_count;

use super::crc::verify as verify_crc;

fn words(input: &[u8]) -> IResult<&[u8], Vec<u16>> {
    many0(le_u16)(input)
}

/// Validates a complete poll response frame and returns its decoded 16-bit
/// words in wire order.
///
/// Errors per spec.md §4.1: too-short frames and bad preambles/opcodes are
/// `InvalidSize`/`InvalidArgument`; CRC mismatches are `InvalidCrc`; a
/// payload shorter than the catalogue's total word count is
/// `MissingRegister` and the caller must not emit a partial record.
pub fn parse_poll_response(frame: &[u8]) -> Result<Vec<u16>, GatewayError> {
    if frame.len() < MIN_RESPONSE_LEN {
        return Err(GatewayError::InvalidSize(format!(
            "response frame too short: {} bytes",
            frame.len()
        )));
    }
    if frame[0] != VENDOR_PREAMBLE {
        return Err(GatewayError::InvalidArgument(format!(
            "bad preamble: {:#04x}",
            frame[0]
        )));
    }
    if frame[1] != OP_READ_MULTI {
        return Err(GatewayError::InvalidArgument(format!(
            "unexpected opcode for poll response: {:#04x}",
            frame[1]
        )));
    }

    let declared_len = frame[2] as usize;
    if frame.len() != 3 + declared_len + 2 {
        return Err(GatewayError::InvalidSize(format!(
            "frame length {} does not match declared payload length {declared_len}",
            frame.len()
        )));
    }
    if declared_len % 2 != 0 {
        return Err(GatewayError::InvalidSize(
            "payload length must be even".to_string(),
        ));
    }

    verify_crc(frame)?;

    let payload = &frame[3..3 + declared_len];
    let num_words = declared_len / 2;
    let max_words = total_word_count();
    if num_words > max_words {
        return Err(GatewayError::InvalidSize(format!(
            "payload carries {num_words} words, catalogue only declares {max_words}"
        )));
    }

    let (_, decoded) =
        words(payload).map_err(|e| GatewayError::InvalidSize(format!("word decode failed: {e}")))?;

    if num_words < max_words {
        return Err(GatewayError::MissingRegister {
            expected: max_words,
            got: num_words,
        });
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crc::append_crc;

    fn minimal_single_register_frame(expected_words: usize) -> Vec<u8> {
        let mut frame = vec![VENDOR_PREAMBLE, OP_READ_MULTI, (expected_words * 2) as u8];
        for i in 0..expected_words {
            frame.extend_from_slice(&(i as u16).to_le_bytes());
        }
        append_crc(&mut frame);
        frame
    }

    #[test]
    fn rejects_frames_shorter_than_minimum() {
        assert!(matches!(
            parse_poll_response(&[0xAA, 0x09]),
            Err(GatewayError::InvalidSize(_))
        ));
    }

    #[test]
    fn rejects_bad_preamble() {
        let mut frame = minimal_single_register_frame(total_word_count());
        frame[0] = 0x00;
        assert!(matches!(
            parse_poll_response(&frame),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_bad_crc() {
        let mut frame = minimal_single_register_frame(total_word_count());
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(
            parse_poll_response(&frame),
            Err(GatewayError::InvalidCrc { .. })
        ));
    }

    #[test]
    fn missing_registers_is_reported_and_does_not_decode() {
        let frame = minimal_single_register_frame(total_word_count().saturating_sub(1));
        assert!(matches!(
            parse_poll_response(&frame),
            Err(GatewayError::MissingRegister { .. })
        ));
    }

    #[test]
    fn s2_valid_minimal_response_decodes_a_single_u16_register() {
        // spec.md §8 S2, adapted: a response whose payload has exactly the
        // catalogue's full word count decodes cleanly; this variant checks
        // the first word's value independent of the real catalogue shape.
        let frame = minimal_single_register_frame(total_word_count());
        let words = parse_poll_response(&frame).unwrap();
        assert_eq!(words.len(), total_word_count());
        assert_eq!(words[0], 0);
    }
}
