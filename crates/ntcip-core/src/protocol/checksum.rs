//! XOR checksum used by every frame kind.
//!
//! The checksum byte is the XOR of a kind-specific prefix of the frame:
//!
//! | Kind | Bytes covered |
//! |------|---------------|
//! | Data | `DLE` through the trailing `ETX` (everything but `CKS`) |
//! | Ack  | the 7 bytes before `CKS` |
//! | Nak  | the 8 bytes before `CKS` (no trailing `ETX` exists) |
//!
//! In every case the covered range is "all bytes before the checksum", but
//! the range is computed from the kind rather than from the buffer length so
//! a truncated or padded buffer can never widen or shrink it.

use super::frame::{FrameKind, ACK_FRAME_LEN, NAK_FRAME_LEN};

/// XOR of every byte in `bytes`.
pub fn xor(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Number of leading bytes the checksum covers for a frame of `kind` whose
/// total size is `frame_len`.
pub fn covered_len(kind: FrameKind, frame_len: usize) -> usize {
    match kind {
        FrameKind::Data => frame_len.saturating_sub(1),
        FrameKind::Ack => ACK_FRAME_LEN - 1,
        FrameKind::Nak => NAK_FRAME_LEN - 1,
    }
}

/// Checksum over the kind-specific range of `frame`.
///
/// `frame` must be at least as long as the covered range; shorter input is
/// checksummed over what is available.
pub fn frame_checksum(kind: FrameKind, frame: &[u8]) -> u8 {
    let end = covered_len(kind, frame.len()).min(frame.len());
    xor(&frame[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_of_empty_slice_is_zero() {
        assert_eq!(xor(&[]), 0);
    }

    #[test]
    fn test_xor_of_reference_data_frame() {
        // Arrange – DLE STX SEQ ADDR LEN INFO(7) DLE ETX
        let bytes = [
            0xAA, 0xBB, 0x01, 0x00, 0x01, 0x00, 0x10, 0x0F, 0x80, 0x01, 0x02, 0x03, 0x04, 0x05,
            0xAA, 0xCC,
        ];

        // Act
        let cks = xor(&bytes);

        // Assert – computed by hand
        assert_eq!(cks, 0xE9);
    }

    #[test]
    fn test_covered_len_for_fixed_kinds_ignores_buffer_length() {
        assert_eq!(covered_len(FrameKind::Ack, 100), 7);
        assert_eq!(covered_len(FrameKind::Nak, 3), 8);
    }

    #[test]
    fn test_covered_len_for_data_is_all_but_last_byte() {
        assert_eq!(covered_len(FrameKind::Data, 17), 16);
        assert_eq!(covered_len(FrameKind::Data, 0), 0);
    }

    #[test]
    fn test_frame_checksum_for_ack_covers_seven_bytes() {
        let ack = [0xAA, 0xDD, 0x01, 0x00, 0x01, 0x00, 0x08, 0xFF];
        assert_eq!(frame_checksum(FrameKind::Ack, &ack), xor(&ack[..7]));
    }
}
