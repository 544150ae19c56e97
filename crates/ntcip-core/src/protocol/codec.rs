//! Binary codec for Data, Ack, and Nak frames.
//!
//! Encoding is infallible for Ack and Nak; Data encoding fails only when the
//! payload is too large for the 16-bit `LEN` field.  Decoding validates the
//! structure step by step and reports the first problem found as a
//! [`DecodeError`].  Every decode failure is recoverable: the session turns
//! it into an outbound Nak via [`DecodeError::nak_code`].

use thiserror::Error;

use super::checksum::{frame_checksum, xor};
use super::frame::{
    Frame, FrameKind, NakCode, ACK, ACK_FRAME_LEN, DATA_OVERHEAD, DLE, ETX, HEADER_SIZE,
    MAX_DATA_PAYLOAD, NAK, NAK_FRAME_LEN, STX,
};

/// Minimum number of bytes `decode_frame` will look at.
pub const MIN_DECODE_LEN: usize = 6;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the smallest possible frame of this kind.
    #[error("frame too short: need at least {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },

    /// The first byte is not `DLE`.
    #[error("bad start code: 0x{0:02X}")]
    BadStartCode(u8),

    /// The second byte is not `STX`, `ACK`, or `NAK`.
    #[error("unknown frame kind: 0x{0:02X}")]
    UnknownFrameKind(u8),

    /// A Data frame's `LEN` field disagrees with the number of bytes received.
    #[error("length mismatch: LEN field says {declared}, frame has {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    /// The two bytes before the checksum are not `DLE ETX`.
    #[error("bad end code: 0x{dle:02X} 0x{etx:02X}")]
    BadEndCode { dle: u8, etx: u8 },

    /// The trailing checksum byte does not match the recomputed XOR.
    #[error("checksum mismatch: computed 0x{expected:02X}, frame carries 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// An Ack or Nak frame is not exactly its fixed size, or its `LEN`
    /// field does not carry that size.
    #[error("bad {kind} length: LEN field {declared:?}, frame has {actual} bytes")]
    BadLength {
        kind: FrameKind,
        declared: Option<usize>,
        actual: usize,
    },
}

impl DecodeError {
    /// Nak error code reported to the peer for this failure.
    pub fn nak_code(&self) -> NakCode {
        match self {
            DecodeError::ChecksumMismatch { .. } => NakCode::Parity,
            DecodeError::TooShort { .. }
            | DecodeError::LengthMismatch { .. }
            | DecodeError::BadLength { .. } => NakCode::Length,
            DecodeError::BadStartCode(_)
            | DecodeError::UnknownFrameKind(_)
            | DecodeError::BadEndCode { .. } => NakCode::Frame,
        }
    }
}

/// Errors that can occur while encoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The payload does not fit the 16-bit `LEN` field.
    #[error("payload too large: {len} bytes (max {MAX_DATA_PAYLOAD})")]
    PayloadTooLarge { len: usize },

    /// A Nak frame value whose payload is not exactly one error byte.
    #[error("Nak frame must carry exactly one error byte, got {0}")]
    MalformedNak(usize),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a Data frame: `DLE STX seq addr LEN payload DLE ETX CKS`.
///
/// # Errors
///
/// Returns [`EncodeError::PayloadTooLarge`] if `payload` is longer than
/// [`MAX_DATA_PAYLOAD`].
///
/// # Examples
///
/// ```rust
/// use ntcip_core::protocol::{decode_frame, encode_data};
///
/// let bytes = encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap();
/// let frame = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.payload, vec![0x0F, 0x10, 0x52, 0x52]);
/// ```
pub fn encode_data(seq: u8, addr: u16, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    if payload.len() > MAX_DATA_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge { len: payload.len() });
    }
    let length = (payload.len() + DATA_OVERHEAD - 1) as u16;

    let mut buf = Vec::with_capacity(payload.len() + DATA_OVERHEAD);
    buf.extend_from_slice(&[DLE, STX, seq]);
    buf.extend_from_slice(&addr.to_be_bytes());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&[DLE, ETX]);
    buf.push(xor(&buf));
    Ok(buf)
}

/// Encodes an Ack frame: `DLE ACK seq addr 0x0008 CKS`.
pub fn encode_ack(seq: u8, addr: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ACK_FRAME_LEN);
    buf.extend_from_slice(&[DLE, ACK, seq]);
    buf.extend_from_slice(&addr.to_be_bytes());
    buf.extend_from_slice(&(ACK_FRAME_LEN as u16).to_be_bytes());
    buf.push(xor(&buf));
    buf
}

/// Encodes a Nak frame: `DLE NAK seq addr 0x0009 ERR CKS`.
pub fn encode_nak(seq: u8, addr: u16, code: NakCode) -> Vec<u8> {
    encode_nak_byte(seq, addr, code as u8)
}

/// Encodes any [`Frame`] value.
///
/// # Errors
///
/// Returns [`EncodeError`] if a Data payload is too large or a Nak payload is
/// not exactly one byte.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    match frame.kind {
        FrameKind::Data => encode_data(frame.seq, frame.addr, &frame.payload),
        FrameKind::Ack => Ok(encode_ack(frame.seq, frame.addr)),
        FrameKind::Nak => match frame.payload.as_slice() {
            [err] => Ok(encode_nak_byte(frame.seq, frame.addr, *err)),
            other => Err(EncodeError::MalformedNak(other.len())),
        },
    }
}

fn encode_nak_byte(seq: u8, addr: u16, err: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(NAK_FRAME_LEN);
    buf.extend_from_slice(&[DLE, NAK, seq]);
    buf.extend_from_slice(&addr.to_be_bytes());
    buf.extend_from_slice(&(NAK_FRAME_LEN as u16).to_be_bytes());
    buf.push(err);
    buf.push(xor(&buf));
    buf
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes exactly one frame from `bytes`.
///
/// `bytes` must hold one complete frame and nothing else; trailing or missing
/// bytes are reported as length errors.
///
/// # Errors
///
/// Returns the first [`DecodeError`] found, checked in this order: minimum
/// size, start code, frame kind, then the kind-specific length, end code, and
/// checksum checks.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.len() < MIN_DECODE_LEN {
        return Err(DecodeError::TooShort {
            needed: MIN_DECODE_LEN,
            available: bytes.len(),
        });
    }
    if bytes[0] != DLE {
        return Err(DecodeError::BadStartCode(bytes[0]));
    }
    let kind = FrameKind::try_from(bytes[1]).map_err(|_| DecodeError::UnknownFrameKind(bytes[1]))?;

    match kind {
        FrameKind::Data => decode_data(bytes),
        FrameKind::Ack => decode_fixed(bytes, FrameKind::Ack, ACK_FRAME_LEN),
        FrameKind::Nak => decode_fixed(bytes, FrameKind::Nak, NAK_FRAME_LEN),
    }
}

fn decode_data(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort {
            needed: DATA_OVERHEAD,
            available: bytes.len(),
        });
    }
    let declared = read_u16(bytes, 5) as usize;
    if bytes.len() != declared + 1 {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    if bytes.len() < DATA_OVERHEAD {
        return Err(DecodeError::TooShort {
            needed: DATA_OVERHEAD,
            available: bytes.len(),
        });
    }

    let end = bytes.len();
    let (dle, etx) = (bytes[end - 3], bytes[end - 2]);
    if dle != DLE || etx != ETX {
        return Err(DecodeError::BadEndCode { dle, etx });
    }
    verify_checksum(FrameKind::Data, bytes)?;

    Ok(Frame::data(
        bytes[2],
        read_u16(bytes, 3),
        bytes[HEADER_SIZE..end - 3].to_vec(),
    ))
}

fn decode_fixed(bytes: &[u8], kind: FrameKind, size: usize) -> Result<Frame, DecodeError> {
    let declared = (bytes.len() >= HEADER_SIZE).then(|| read_u16(bytes, 5) as usize);
    if bytes.len() != size || declared != Some(size) {
        return Err(DecodeError::BadLength {
            kind,
            declared,
            actual: bytes.len(),
        });
    }
    verify_checksum(kind, bytes)?;

    let payload = match kind {
        FrameKind::Nak => vec![bytes[HEADER_SIZE]],
        _ => Vec::new(),
    };
    Ok(Frame {
        kind,
        seq: bytes[2],
        addr: read_u16(bytes, 3),
        payload,
    })
}

fn verify_checksum(kind: FrameKind, bytes: &[u8]) -> Result<(), DecodeError> {
    let expected = frame_checksum(kind, bytes);
    let actual = bytes[bytes.len() - 1];
    if expected != actual {
        return Err(DecodeError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Best-effort `(seq, addr)` from bytes that failed to decode.
///
/// Only trusted when the buffer at least starts with `DLE`; otherwise the
/// field positions mean nothing and `(0, 0)` is returned.  Missing fields
/// default to zero.
pub fn salvage_header(bytes: &[u8]) -> (u8, u16) {
    if bytes.first() != Some(&DLE) {
        return (0, 0);
    }
    let seq = bytes.get(2).copied().unwrap_or(0);
    let addr = if bytes.len() >= 5 { read_u16(bytes, 3) } else { 0 };
    (seq, addr)
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
