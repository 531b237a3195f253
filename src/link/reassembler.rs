// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Stream reassembler: turns a raw, possibly-interleaved-with-garbage byte
//! stream from the serial port into individual, CRC-valid frames.
//!
//! Holds at most [`REASSEMBLER_MAX_BUFFER`] bytes. Any byte that cannot
//! start a valid frame — wrong preamble, a declared length that would
//! overrun the frame cap, or a CRC mismatch once a full candidate frame is
//! buffered — is dropped one byte at a time until resync. This mirrors how
//! `util::iobuffer::IoBuffer` is meant to be driven for frame boundary
//! detection, generalised here to the TinyBMS dialects' variable-length
//! frames.

use crate::constants::{
    MAX_FRAME_LEN, OP_ACK, OP_NACK, REASSEMBLER_MAX_BUFFER, VENDOR_PREAMBLE,
};
use crate::error::GatewayError;
use crate::util::IoBuffer;

use crate::codec::crc;

/// Fixed length of an ACK/NACK frame: preamble, opcode, 2 CRC bytes. These
/// carry no length field since they have no payload.
const ACK_NACK_FRAME_LEN: usize = 4;

pub struct Reassembler {
    buffer: IoBuffer,
    bytes_dropped: u64,
}

impl Reassembler {
    pub fn new() -> Self {
        let mut buffer = IoBuffer::with_capacity(REASSEMBLER_MAX_BUFFER);
        buffer.set_capacity_limit(Some(REASSEMBLER_MAX_BUFFER));
        Self {
            buffer,
            bytes_dropped: 0,
        }
    }

    /// Total bytes discarded while resyncing, across the life of this
    /// reassembler. Surfaced to the poller's diagnostic counters.
    pub fn bytes_dropped(&self) -> u64 {
        self.bytes_dropped
    }

    fn drop_one(&mut self) {
        self.buffer.consume(1);
        self.bytes_dropped += 1;
    }

    /// Appends freshly read serial bytes. If the buffer would exceed its
    /// cap, the oldest bytes are dropped to make room — a stuck,
    /// never-synchronising stream cannot grow the buffer without bound.
    pub fn push(&mut self, data: &[u8]) -> Result<(), GatewayError> {
        for chunk in data.chunks(REASSEMBLER_MAX_BUFFER) {
            while self.buffer.len() + chunk.len() > REASSEMBLER_MAX_BUFFER && !self.buffer.is_empty()
            {
                self.drop_one();
            }
            self.buffer
                .write(chunk)
                .map_err(|e| GatewayError::NoMem(e.to_string()))?;
        }
        Ok(())
    }

    /// Attempts to pull one complete, CRC-valid frame out of the buffer.
    /// Returns `None` when there isn't enough data yet for a decision;
    /// invalid leading bytes are consumed internally before that point.
    pub fn try_extract_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buffer.is_empty() {
                return None;
            }
            if self.buffer.peek(1)[0] != VENDOR_PREAMBLE {
                self.drop_one();
                continue;
            }
            if self.buffer.len() < 2 {
                return None;
            }
            let opcode = self.buffer.peek_range(1, 1)[0];
            let frame_len = if opcode == OP_ACK || opcode == OP_NACK {
                ACK_NACK_FRAME_LEN
            } else {
                if self.buffer.len() < 3 {
                    return None;
                }
                let declared = self.buffer.peek_range(2, 1)[0] as usize;
                3 + declared + 2
            };

            if frame_len > MAX_FRAME_LEN {
                self.drop_one();
                continue;
            }
            if self.buffer.len() < frame_len {
                return None;
            }

            let candidate = self.buffer.peek(frame_len);
            if crc::verify(&candidate).is_err() {
                self.drop_one();
                continue;
            }

            self.buffer.consume(frame_len);
            return Some(candidate);
        }
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crc::append_crc;

    fn valid_poll_frame() -> Vec<u8> {
        let mut frame = vec![VENDOR_PREAMBLE, 0x09, 0x02, 0x10, 0x27];
        append_crc(&mut frame);
        frame
    }

    #[test]
    fn extracts_a_clean_frame_with_nothing_else_in_the_stream() {
        let frame = valid_poll_frame();
        let mut r = Reassembler::new();
        r.push(&frame).unwrap();
        assert_eq!(r.try_extract_frame(), Some(frame));
        assert_eq!(r.bytes_dropped(), 0);
    }

    #[test]
    fn resyncs_past_leading_garbage_bytes() {
        let frame = valid_poll_frame();
        let mut stream = vec![0x00, 0xFF, 0x12, 0xAA]; // last 0xAA is a decoy preamble
        stream.extend_from_slice(&frame);

        let mut r = Reassembler::new();
        r.push(&stream).unwrap();
        let extracted = r.try_extract_frame();
        assert_eq!(extracted, Some(frame));
        assert!(r.bytes_dropped() >= 4);
    }

    #[test]
    fn returns_none_on_a_partial_frame_and_extracts_once_completed() {
        let frame = valid_poll_frame();
        let mut r = Reassembler::new();
        r.push(&frame[..3]).unwrap();
        assert_eq!(r.try_extract_frame(), None);
        r.push(&frame[3..]).unwrap();
        assert_eq!(r.try_extract_frame(), Some(frame));
    }

    #[test]
    fn drops_a_frame_with_a_corrupted_crc_and_finds_the_next_one() {
        let mut bad = valid_poll_frame();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = {
            let mut f = vec![VENDOR_PREAMBLE, 0x09, 0x02, 0x00, 0x01];
            append_crc(&mut f);
            f
        };

        let mut stream = bad.clone();
        stream.extend_from_slice(&good);

        let mut r = Reassembler::new();
        r.push(&stream).unwrap();
        assert_eq!(r.try_extract_frame(), Some(good));
        assert!(r.bytes_dropped() > 0);
    }

    #[test]
    fn accepts_an_ack_frame_with_no_length_byte() {
        let mut ack = vec![VENDOR_PREAMBLE, OP_ACK];
        append_crc(&mut ack);
        let mut r = Reassembler::new();
        r.push(&ack).unwrap();
        assert_eq!(r.try_extract_frame(), Some(ack));
    }

    #[test]
    fn never_grows_past_its_capacity_even_under_sustained_garbage() {
        let mut r = Reassembler::new();
        let garbage = vec![0x00u8; REASSEMBLER_MAX_BUFFER * 4];
        r.push(&garbage).unwrap();
        assert!(r.try_extract_frame().is_none());
    }
}
