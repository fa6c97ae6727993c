//! Length‑prefixed stream framing for the Meshtastic serial API.
//!
//! Binary frames on the serial link are emitted as:
//!
//!   `0x94 0xC3 <len_hi> <len_lo> <protobuf bytes>`
//!
//! Debug console text from the firmware is interleaved with these frames, so the decoder
//! realigns on the magic header and drops anything in between. It can be fed arbitrary
//! chunks and yields whole frames when available.
use bytes::{Buf, BytesMut};

use crate::errors::TransportError;

pub const START1: u8 = 0x94;
pub const START2: u8 = 0xC3;
const HEADER_LEN: usize = 4;

/// Largest ToRadio/FromRadio payload the firmware will emit or accept.
pub const MAX_FRAME_SIZE: usize = 512;

pub struct StreamFramer {
    buf: BytesMut,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Attempt to extract the next complete frame payload. On a bogus length the
    /// leading byte is dropped and the search for a header continues.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buf.len() < HEADER_LEN {
                return None;
            }
            if !(self.buf[0] == START1 && self.buf[1] == START2) {
                match self.buf.iter().skip(1).position(|&b| b == START1) {
                    Some(pos) => self.buf.advance(pos + 1),
                    None => {
                        // keep a trailing START1 in case the header is split across reads
                        let keep = usize::from(self.buf.last() == Some(&START1));
                        let drop = self.buf.len() - keep;
                        self.buf.advance(drop);
                        return None;
                    }
                }
                continue;
            }

            let declared = ((self.buf[2] as usize) << 8) | (self.buf[3] as usize);
            if declared == 0 || declared > MAX_FRAME_SIZE {
                self.buf.advance(1);
                continue;
            }
            if self.buf.len() < HEADER_LEN + declared {
                return None;
            }
            self.buf.advance(HEADER_LEN);
            return Some(self.buf.split_to(declared).to_vec());
        }
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix an encoded ToRadio payload with the stream header.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge(payload.len()));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(START1);
    out.push(START2);
    out.push(((payload.len() >> 8) & 0xFF) as u8);
    out.push((payload.len() & 0xFF) as u8);
    out.extend_from_slice(payload);
    Ok(out)
}
