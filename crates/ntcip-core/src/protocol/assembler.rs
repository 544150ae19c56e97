//! Cuts a TCP byte stream into frame-sized chunks.
//!
//! TCP delivers bytes, not frames.  A single read may hold half a frame, one
//! frame, or several frames back to back.  [`FrameAssembler`] buffers bytes
//! and releases a chunk as soon as the header says how long the frame is and
//! that many bytes are present:
//!
//! | First bytes | Extent |
//! |-------------|--------|
//! | `DLE STX .. LEN` | `LEN + 1` |
//! | `DLE ACK` | 8 |
//! | `DLE NAK` | 9 |
//!
//! The assembler never validates a frame; that is the codec's job.  Bytes
//! that cannot possibly start a frame are released at once as one chunk so
//! the session can answer them with a Nak.  A frame whose header promises
//! more bytes than ever arrive is released by the caller through
//! [`take_partial`](FrameAssembler::take_partial) after an idle gap.
//!
//! # Example
//!
//! ```rust
//! use ntcip_core::protocol::{encode_ack, FrameAssembler};
//!
//! let ack = encode_ack(1, 1);
//! let mut assembler = FrameAssembler::new();
//!
//! assert!(assembler.push(&ack[..3]).is_empty());
//! let chunks = assembler.push(&ack[3..]);
//! assert_eq!(chunks, vec![ack]);
//! ```

use super::frame::{FrameKind, ACK_FRAME_LEN, DATA_OVERHEAD, DLE, HEADER_SIZE, NAK_FRAME_LEN};

/// What the buffered prefix tells us about the next chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extent {
    /// Not enough bytes to know yet.
    Unknown,
    /// The next frame is exactly this many bytes long.
    Frame(usize),
    /// The buffered bytes cannot start a frame.
    Garbage,
}

/// Buffer that accumulates stream bytes and yields whole-frame chunks.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data` and returns every chunk that is now complete, in order.
    ///
    /// Returns an empty vector while a frame is still incomplete; the partial
    /// bytes stay buffered for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);

        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk() {
            chunks.push(chunk);
        }
        chunks
    }

    /// Releases whatever is buffered as one chunk, or `None` if empty.
    ///
    /// Used when the peer has gone quiet in the middle of a frame.
    pub fn take_partial(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Number of bytes buffered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        match self.extent() {
            Extent::Unknown => None,
            Extent::Frame(n) if self.buffer.len() >= n => {
                let rest = self.buffer.split_off(n);
                Some(std::mem::replace(&mut self.buffer, rest))
            }
            Extent::Frame(_) => None,
            Extent::Garbage => self.take_partial(),
        }
    }

    fn extent(&self) -> Extent {
        let buf = &self.buffer;
        match buf.first() {
            None => return Extent::Unknown,
            Some(&b) if b != DLE => return Extent::Garbage,
            Some(_) => {}
        }
        let Some(&kind_byte) = buf.get(1) else {
            return Extent::Unknown;
        };
        match FrameKind::try_from(kind_byte) {
            Err(()) => Extent::Garbage,
            Ok(FrameKind::Ack) => Extent::Frame(ACK_FRAME_LEN),
            Ok(FrameKind::Nak) => Extent::Frame(NAK_FRAME_LEN),
            Ok(FrameKind::Data) => {
                if buf.len() < HEADER_SIZE {
                    return Extent::Unknown;
                }
                let total = u16::from_be_bytes([buf[5], buf[6]]) as usize + 1;
                if total < DATA_OVERHEAD {
                    Extent::Garbage
                } else {
                    Extent::Frame(total)
                }
            }
        }
    }
}
