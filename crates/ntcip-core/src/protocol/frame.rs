//! Frame types and wire constants.
//!
//! Wire format (all multi-byte integers big-endian):
//! ```text
//! Data: [DLE][STX][SEQ][ADDR:2][LEN:2][PAYLOAD:N][DLE][ETX][CKS]
//! Ack:  [DLE][ACK][SEQ][ADDR:2][LEN:2 = 8][CKS]
//! Nak:  [DLE][NAK][SEQ][ADDR:2][LEN:2 = 9][ERR][CKS]
//! ```
//!
//! # Length convention
//!
//! Historical implementations of this link disagreed on whether a Data
//! frame's `LEN` includes the trailing checksum byte.  This crate uses one
//! convention throughout: Data `LEN` counts every byte from the first `DLE`
//! through `ETX` inclusive, so a Data frame is exactly `LEN + 1` bytes long.
//! Ack and Nak frames carry the fixed values 8 and 9, which equal their total
//! size.  The Nak checksum covers only the 8 bytes actually present before
//! `CKS`.

use std::fmt;

// ── Control bytes ─────────────────────────────────────────────────────────────

/// Data link escape; first byte of every frame and of the Data trailer.
pub const DLE: u8 = 0xAA;
/// Start of text; marks a Data frame.
pub const STX: u8 = 0xBB;
/// End of text; closes the Data payload.
pub const ETX: u8 = 0xCC;
/// Positive acknowledgment.
pub const ACK: u8 = 0xDD;
/// Negative acknowledgment.
pub const NAK: u8 = 0xEE;

// ── Sizes ─────────────────────────────────────────────────────────────────────

/// Bytes shared by every frame kind before the kind-specific body:
/// `DLE kind SEQ ADDR(2) LEN(2)`.
pub const HEADER_SIZE: usize = 7;

/// Total size of an Ack frame, also the value of its `LEN` field.
pub const ACK_FRAME_LEN: usize = 8;

/// Total size of a Nak frame, also the value of its `LEN` field.
pub const NAK_FRAME_LEN: usize = 9;

/// Bytes a Data frame adds around its payload: header, `DLE ETX`, checksum.
pub const DATA_OVERHEAD: usize = HEADER_SIZE + 3;

/// Largest payload whose Data `LEN` still fits the 16-bit field.
pub const MAX_DATA_PAYLOAD: usize = u16::MAX as usize - (DATA_OVERHEAD - 1);

/// Reserved address that never names a real device.
///
/// Data frames addressed to it are answered with an address Nak.
pub const INVALID_ADDRESS: u16 = 0xFFFF;

// ── Frame kind ────────────────────────────────────────────────────────────────

/// The three frame kinds, identified solely by the second control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    Data = STX,
    Ack = ACK,
    Nak = NAK,
}

impl TryFrom<u8> for FrameKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            STX => Ok(FrameKind::Data),
            ACK => Ok(FrameKind::Ack),
            NAK => Ok(FrameKind::Nak),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Data => "Data",
            FrameKind::Ack => "Ack",
            FrameKind::Nak => "Nak",
        };
        f.write_str(name)
    }
}

// ── Nak error codes ───────────────────────────────────────────────────────────

/// Error code carried in the single payload byte of a Nak frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NakCode {
    /// Checksum (parity) did not match.
    Parity = 0x01,
    /// Frame structure was wrong, or the handshake broke down.
    Frame = 0x02,
    /// The frame was addressed to an invalid or foreign device.
    Address = 0x04,
    /// A length field or the received byte count was wrong.
    Length = 0x08,
}

impl TryFrom<u8> for NakCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(NakCode::Parity),
            0x02 => Ok(NakCode::Frame),
            0x04 => Ok(NakCode::Address),
            0x08 => Ok(NakCode::Length),
            _ => Err(()),
        }
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One decoded frame.
///
/// `payload` is empty for Ack, exactly one error-code byte for Nak, and the
/// message bytes (`type, code, data...`) for Data.  The `LEN` and `CKS` wire
/// fields are not stored: they are fully determined by the other fields and
/// are verified during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub seq: u8,
    pub addr: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Builds a Data frame value.
    pub fn data(seq: u8, addr: u16, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Data,
            seq,
            addr,
            payload,
        }
    }

    /// Builds an Ack frame value.
    pub fn ack(seq: u8, addr: u16) -> Self {
        Self {
            kind: FrameKind::Ack,
            seq,
            addr,
            payload: Vec::new(),
        }
    }

    /// Builds a Nak frame value.
    pub fn nak(seq: u8, addr: u16, code: NakCode) -> Self {
        Self {
            kind: FrameKind::Nak,
            seq,
            addr,
            payload: vec![code as u8],
        }
    }

    /// Value of the `LEN` field this frame carries on the wire.
    pub fn length_field(&self) -> usize {
        match self.kind {
            FrameKind::Data => self.payload.len() + DATA_OVERHEAD - 1,
            FrameKind::Ack => ACK_FRAME_LEN,
            FrameKind::Nak => NAK_FRAME_LEN,
        }
    }

    /// The raw error byte of a Nak frame.
    pub fn nak_byte(&self) -> Option<u8> {
        match self.kind {
            FrameKind::Nak => self.payload.first().copied(),
            _ => None,
        }
    }

    /// The error code of a Nak frame, if it is one of the known codes.
    pub fn nak_code(&self) -> Option<NakCode> {
        self.nak_byte().and_then(|b| NakCode::try_from(b).ok())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_try_from_maps_control_bytes() {
        assert_eq!(FrameKind::try_from(0xBB), Ok(FrameKind::Data));
        assert_eq!(FrameKind::try_from(0xDD), Ok(FrameKind::Ack));
        assert_eq!(FrameKind::try_from(0xEE), Ok(FrameKind::Nak));
        assert_eq!(FrameKind::try_from(0xCC), Err(()));
    }

    #[test]
    fn test_nak_code_values_match_wire_codes() {
        assert_eq!(NakCode::Parity as u8, 0x01);
        assert_eq!(NakCode::Frame as u8, 0x02);
        assert_eq!(NakCode::Address as u8, 0x04);
        assert_eq!(NakCode::Length as u8, 0x08);
        assert_eq!(NakCode::try_from(0x03), Err(()));
    }

    #[test]
    fn test_length_field_for_data_excludes_checksum_byte() {
        // Arrange – 7 payload bytes, as in the reference setting report
        let frame = Frame::data(1, 1, vec![0x0F, 0x80, 0x01, 0x02, 0x03, 0x04, 0x05]);

        // Act / Assert – 7 header + 7 payload + DLE ETX = 16
        assert_eq!(frame.length_field(), 16);
    }

    #[test]
    fn test_length_field_for_ack_and_nak_is_fixed() {
        assert_eq!(Frame::ack(0, 0).length_field(), 8);
        assert_eq!(Frame::nak(0, 0, NakCode::Frame).length_field(), 9);
    }

    #[test]
    fn test_nak_code_is_none_for_data_frame() {
        let frame = Frame::data(1, 1, vec![0x01]);
        assert_eq!(frame.nak_code(), None);
    }

    #[test]
    fn test_nak_code_reads_payload_byte() {
        let frame = Frame::nak(3, 7, NakCode::Address);
        assert_eq!(frame.nak_code(), Some(NakCode::Address));
        assert_eq!(frame.nak_byte(), Some(0x04));
    }

    #[test]
    fn test_max_data_payload_keeps_length_in_u16() {
        let frame_len = MAX_DATA_PAYLOAD + DATA_OVERHEAD - 1;
        assert_eq!(frame_len, u16::MAX as usize);
    }
}
