//! Messages carried inside Data frames.
//!
//! Every Data payload starts with a two-byte header, `(type, code)`, followed
//! by code-specific data.  The `type` byte names a message group; only the
//! general group has codes implemented here.
//!
//! ```text
//! payload: [type][code][data...]
//! ```

pub mod time_sync;

use std::fmt;

use thiserror::Error;

pub use time_sync::TimeSync;

/// Message codes of the general group.
pub mod code {
    /// Center → device: reset the device.
    pub const RESET: u8 = 0x10;
    /// Center → device: set the device clock.
    pub const TIME_SYNC: u8 = 0x12;
    /// Device → center: a setting command was accepted.
    pub const SETTING_ACCEPTED: u8 = 0x80;
    /// Device → center: a setting command was rejected.
    pub const SETTING_ERROR: u8 = 0x81;
    /// Device → center: reset acknowledged.
    pub const RESET_ACK: u8 = 0x90;
    /// Device → center: the requested time differed from the local clock.
    pub const TIME_DRIFT: u8 = 0x92;
}

/// Parameter bytes carried by a reset command and echoed by its reply ("RR").
pub const RESET_PARAM: [u8; 2] = [0x52, 0x52];

/// Largest drift value a drift report carries; larger drifts are clamped.
pub const MAX_REPORTED_DRIFT: u8 = 128;

/// Errors raised while interpreting a Data payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Fewer than the two header bytes.
    #[error("payload too short for a message header: {0} byte(s)")]
    MissingHeader(usize),

    /// Data section has the wrong size for this message.
    #[error("expected {expected} data bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// A field is outside its natural range.
    #[error("{field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: u8 },
}

// ── Message group ─────────────────────────────────────────────────────────────

/// The `type` byte of a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageGroup {
    /// Device-independent commands (reset, clock, reports).
    General = 0x0F,
    /// Signal-controller messages.
    SignalController = 0x5F,
    /// Vehicle-detector messages.
    Detector = 0x6F,
}

impl TryFrom<u8> for MessageGroup {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x0F => Ok(MessageGroup::General),
            0x5F => Ok(MessageGroup::SignalController),
            0x6F => Ok(MessageGroup::Detector),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MessageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageGroup::General => "general",
            MessageGroup::SignalController => "signal-controller",
            MessageGroup::Detector => "detector",
        };
        write!(f, "{name} (0x{:02X})", *self as u8)
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// A Data payload split into header and data.  Borrows the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub msg_type: u8,
    pub code: u8,
    pub data: &'a [u8],
}

impl<'a> Message<'a> {
    /// Splits `payload` into `(type, code, data)`.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::MissingHeader`] if `payload` is shorter than
    /// two bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self, MessageError> {
        match payload {
            [msg_type, code, data @ ..] => Ok(Self {
                msg_type: *msg_type,
                code: *code,
                data,
            }),
            _ => Err(MessageError::MissingHeader(payload.len())),
        }
    }

    /// The message group, if `msg_type` is a known one.
    pub fn group(&self) -> Option<MessageGroup> {
        MessageGroup::try_from(self.msg_type).ok()
    }

    /// Re-assembles the payload bytes.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 2);
        out.push(self.msg_type);
        out.push(self.code);
        out.extend_from_slice(self.data);
        out
    }
}

// ── Request builders ──────────────────────────────────────────────────────────

/// Payload of a reset command: `0F 10 52 52`.
pub fn reset_request() -> Vec<u8> {
    let mut out = vec![MessageGroup::General as u8, code::RESET];
    out.extend_from_slice(&RESET_PARAM);
    out
}

/// Payload of a time-sync command: `0F 12` followed by the 7 time bytes.
pub fn time_sync_request(time: &TimeSync) -> Vec<u8> {
    let mut out = vec![MessageGroup::General as u8, code::TIME_SYNC];
    out.extend_from_slice(&time.to_bytes());
    out
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// A reply payload as seen by the center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `0F 90 p1 p2`: reset acknowledged, echoing the reset parameter.
    ResetAck { param: [u8; 2] },
    /// `0F 80 group code`: the setting command `(group, code)` was accepted.
    SettingAccepted { group: u8, code: u8 },
    /// `0F 81 group code error [param]`: the setting command was rejected.
    SettingError {
        group: u8,
        code: u8,
        error: u8,
        param: u8,
    },
    /// `0F 92 drift`: the requested time was `drift` seconds off (clamped).
    TimeDrift { seconds: u8 },
    /// Anything this crate does not interpret.
    Other(Vec<u8>),
}

impl Reply {
    /// Interprets a reply payload.  Unknown or short payloads become
    /// [`Reply::Other`] rather than an error.
    pub fn parse(payload: &[u8]) -> Self {
        let general = MessageGroup::General as u8;
        match payload {
            [t, code::RESET_ACK, a, b, ..] if *t == general => Reply::ResetAck { param: [*a, *b] },
            [t, code::SETTING_ACCEPTED, group, c, ..] if *t == general => Reply::SettingAccepted {
                group: *group,
                code: *c,
            },
            [t, code::SETTING_ERROR, group, c, error, rest @ ..] if *t == general => {
                Reply::SettingError {
                    group: *group,
                    code: *c,
                    error: *error,
                    param: rest.first().copied().unwrap_or(0),
                }
            }
            [t, code::TIME_DRIFT, seconds, ..] if *t == general => Reply::TimeDrift { seconds: *seconds },
            other => Reply::Other(other.to_vec()),
        }
    }

    /// Encodes this reply as a payload.
    pub fn to_payload(&self) -> Vec<u8> {
        let general = MessageGroup::General as u8;
        match self {
            Reply::ResetAck { param } => vec![general, code::RESET_ACK, param[0], param[1]],
            Reply::SettingAccepted { group, code: c } => {
                vec![general, code::SETTING_ACCEPTED, *group, *c]
            }
            Reply::SettingError {
                group,
                code: c,
                error,
                param,
            } => vec![general, code::SETTING_ERROR, *group, *c, *error, *param],
            Reply::TimeDrift { seconds } => vec![general, code::TIME_DRIFT, *seconds],
            Reply::Other(bytes) => bytes.clone(),
        }
    }

    /// Drift report for `drift` seconds, clamped to [`MAX_REPORTED_DRIFT`].
    pub fn time_drift(drift: u32) -> Self {
        let seconds = drift.min(MAX_REPORTED_DRIFT as u32) as u8;
        Reply::TimeDrift { seconds }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::ResetAck { param } => write!(f, "reset acknowledged (param {:02X}{:02X})", param[0], param[1]),
            Reply::SettingAccepted { group, code } => {
                write!(f, "setting 0x{group:02X}/0x{code:02X} accepted")
            }
            Reply::SettingError {
                group,
                code,
                error,
                param,
            } => write!(
                f,
                "setting 0x{group:02X}/0x{code:02X} rejected: error 0x{error:02X}, param {param}"
            ),
            Reply::TimeDrift { seconds } => write!(f, "clock drift {seconds}s"),
            Reply::Other(bytes) => write!(f, "unrecognised reply {bytes:02X?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_parse_splits_header_and_data() {
        // Arrange
        let payload = [0x0F, 0x12, 24, 1, 2, 3, 4, 5, 6];

        // Act
        let msg = Message::parse(&payload).unwrap();

        // Assert
        assert_eq!(msg.msg_type, 0x0F);
        assert_eq!(msg.code, 0x12);
        assert_eq!(msg.data, &[24, 1, 2, 3, 4, 5, 6]);
        assert_eq!(msg.group(), Some(MessageGroup::General));
        assert_eq!(msg.to_payload(), payload.to_vec());
    }

    #[test]
    fn test_message_parse_accepts_header_without_data() {
        let msg = Message::parse(&[0x5F, 0x01]).unwrap();
        assert!(msg.data.is_empty());
        assert_eq!(msg.group(), Some(MessageGroup::SignalController));
    }

    #[test]
    fn test_message_parse_rejects_short_payload() {
        assert_eq!(Message::parse(&[0x0F]), Err(MessageError::MissingHeader(1)));
        assert_eq!(Message::parse(&[]), Err(MessageError::MissingHeader(0)));
    }

    #[test]
    fn test_unknown_group_byte() {
        let msg = Message::parse(&[0x7F, 0x01]).unwrap();
        assert_eq!(msg.group(), None);
    }

    #[test]
    fn test_reset_request_payload() {
        assert_eq!(reset_request(), vec![0x0F, 0x10, 0x52, 0x52]);
    }

    #[test]
    fn test_reply_parse_reset_ack() {
        assert_eq!(
            Reply::parse(&[0x0F, 0x90, 0x52, 0x52]),
            Reply::ResetAck { param: RESET_PARAM }
        );
    }

    #[test]
    fn test_reply_parse_setting_accepted() {
        assert_eq!(
            Reply::parse(&[0x0F, 0x80, 0x0F, 0x12]),
            Reply::SettingAccepted { group: 0x0F, code: 0x12 }
        );
    }

    #[test]
    fn test_reply_parse_setting_error_defaults_param() {
        assert_eq!(
            Reply::parse(&[0x0F, 0x81, 0x0F, 0x12, 0x04]),
            Reply::SettingError {
                group: 0x0F,
                code: 0x12,
                error: 0x04,
                param: 0
            }
        );
    }

    #[test]
    fn test_reply_parse_time_drift() {
        assert_eq!(Reply::parse(&[0x0F, 0x92, 0x05]), Reply::TimeDrift { seconds: 5 });
    }

    #[test]
    fn test_reply_parse_unknown_is_other() {
        assert_eq!(Reply::parse(&[0x5F, 0x80]), Reply::Other(vec![0x5F, 0x80]));
        assert_eq!(Reply::parse(&[0x0F, 0x90]), Reply::Other(vec![0x0F, 0x90]));
    }

    #[test]
    fn test_time_drift_clamps_at_128() {
        assert_eq!(Reply::time_drift(4), Reply::TimeDrift { seconds: 4 });
        assert_eq!(Reply::time_drift(128), Reply::TimeDrift { seconds: 128 });
        assert_eq!(Reply::time_drift(200), Reply::TimeDrift { seconds: 128 });
        assert_eq!(Reply::time_drift(86_399), Reply::TimeDrift { seconds: 128 });
    }

    #[test]
    fn test_reply_to_payload_matches_wire_bytes() {
        assert_eq!(
            Reply::SettingAccepted { group: 0x0F, code: 0x12 }.to_payload(),
            vec![0x0F, 0x80, 0x0F, 0x12]
        );
        assert_eq!(Reply::time_drift(200).to_payload(), vec![0x0F, 0x92, 0x80]);
    }

    #[test]
    fn test_group_display_includes_hex() {
        assert_eq!(MessageGroup::Detector.to_string(), "detector (0x6F)");
    }
}
