//! Operator commands and what each one sends.

use std::fmt;

use chrono::NaiveDateTime;
use ntcip_core::message::{reset_request, time_sync_request, TimeSync};
use ntcip_core::protocol::{DLE, ETX, STX};
use thiserror::Error;

/// `LEN` value written into the corrupt test frame.  The frame itself is 14
/// bytes long, so a device waits for 7 bytes that never arrive.
pub const CORRUPT_FRAME_LEN_FIELD: u16 = 20;

/// Error returned by [`parse_hex`].
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid hex payload: {0}")]
pub struct HexError(#[from] hex::FromHexError);

/// One thing the operator can ask the center to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `0F 10 52 52`.
    Reset,
    /// `0F 12` with the given wall-clock time.
    TimeSync(TimeSync),
    /// A Data frame whose `LEN` overstates its size and whose checksum is
    /// wrong; the device should answer with a Nak.
    TestNak { seq: u8 },
    /// Any payload, sent through the normal handshake.
    Send(Vec<u8>),
}

impl Command {
    /// Time-sync request for `now`.
    pub fn time_sync_at(now: &NaiveDateTime) -> Self {
        Command::TimeSync(TimeSync::from_datetime(now))
    }

    /// The Data payload this command originates, or `None` for
    /// [`Command::TestNak`], which bypasses the handshake.
    pub fn payload(&self) -> Option<Vec<u8>> {
        match self {
            Command::Reset => Some(reset_request()),
            Command::TimeSync(time) => Some(time_sync_request(time)),
            Command::TestNak { .. } => None,
            Command::Send(payload) => Some(payload.clone()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Reset => write!(f, "reset"),
            Command::TimeSync(t) => write!(
                f,
                "time sync 20{:02}-{:02}-{:02} (weekday {}) {:02}:{:02}:{:02}",
                t.year, t.month, t.day, t.weekday, t.hour, t.minute, t.second
            ),
            Command::TestNak { seq } => write!(f, "corrupt test frame (seq {seq})"),
            Command::Send(payload) => write!(f, "payload {}", to_hex(payload)),
        }
    }
}

/// The deliberately broken reset frame used to provoke a Nak.
///
/// Header and body are those of a reset request, but `LEN` claims
/// [`CORRUPT_FRAME_LEN_FIELD`] and the checksum byte is `0xFF`.
pub fn corrupt_frame(seq: u8, addr: u16) -> Vec<u8> {
    let mut frame = vec![DLE, STX, seq];
    frame.extend_from_slice(&addr.to_be_bytes());
    frame.extend_from_slice(&CORRUPT_FRAME_LEN_FIELD.to_be_bytes());
    frame.extend_from_slice(&reset_request());
    frame.extend_from_slice(&[DLE, ETX, 0xFF]);
    frame
}

/// Parses hex such as `"0F 10 52 52"` or `"0f105252"`.  Whitespace is ignored.
///
/// # Errors
///
/// Returns [`HexError`] for a non-hex character or an odd digit count.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, HexError> {
    let digits: String = text.split_whitespace().collect();
    Ok(hex::decode(digits)?)
}

/// Space-separated upper-case hex, as operators read frames.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .chunks(1)
        .map(hex::encode_upper)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ntcip_core::protocol::{decode_frame, DecodeError};

    #[test]
    fn test_reset_payload() {
        assert_eq!(Command::Reset.payload(), Some(vec![0x0F, 0x10, 0x52, 0x52]));
    }

    #[test]
    fn test_time_sync_payload_from_wall_clock() {
        // Arrange – Sunday 2025-01-05 08:09:10
        let now = NaiveDate::from_ymd_opt(2025, 1, 5)
            .unwrap()
            .and_hms_opt(8, 9, 10)
            .unwrap();

        // Act
        let payload = Command::time_sync_at(&now).payload();

        // Assert
        assert_eq!(payload, Some(vec![0x0F, 0x12, 25, 1, 5, 7, 8, 9, 10]));
    }

    #[test]
    fn test_test_nak_has_no_payload() {
        assert_eq!(Command::TestNak { seq: 0 }.payload(), None);
    }

    #[test]
    fn test_corrupt_frame_layout() {
        assert_eq!(
            corrupt_frame(0, 1),
            vec![0xAA, 0xBB, 0x00, 0x00, 0x01, 0x00, 0x14, 0x0F, 0x10, 0x52, 0x52, 0xAA, 0xCC, 0xFF]
        );
    }

    #[test]
    fn test_corrupt_frame_fails_length_check() {
        let err = decode_frame(&corrupt_frame(3, 7)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                declared: 20,
                actual: 14
            }
        );
    }

    #[test]
    fn test_parse_hex_accepts_spaces_and_case() {
        assert_eq!(parse_hex("0f 10 52 52").unwrap(), vec![0x0F, 0x10, 0x52, 0x52]);
        assert_eq!(parse_hex("0F105252").unwrap(), vec![0x0F, 0x10, 0x52, 0x52]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("0F1"), Err(HexError(hex::FromHexError::OddLength)));
        assert_eq!(
            parse_hex("0F 1G"),
            Err(HexError(hex::FromHexError::InvalidHexCharacter { c: 'G', index: 3 }))
        );
    }

    #[test]
    fn test_parse_hex_accepts_digits_split_across_spaces() {
        assert_eq!(parse_hex("0 F1 0").unwrap(), vec![0x0F, 0x10]);
    }

    #[test]
    fn test_to_hex_formats_frames() {
        assert_eq!(to_hex(&[0xAA, 0xDD, 0x01]), "AA DD 01");
        assert_eq!(to_hex(&[]), "");
    }
}
