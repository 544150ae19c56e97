//! # ntcip-core
//!
//! Shared library for the NTCIP field link between a traffic-control center
//! and a field device.  It contains the binary frame codec, the message model
//! carried inside Data frames, and the socket-free protocol session state
//! machine.
//!
//! # Architecture overview
//!
//! A control center talks to a field device over one persistent TCP
//! connection.  Every exchange is a four-step handshake:
//!
//! ```text
//! Center                                Device
//! ──────                                ──────
//! Data(seq=n, request)      ───────►
//!                           ◄───────    Ack(seq=n)
//!                           ◄───────    Data(seq=n, reply)
//! Ack(seq=n)                ───────►
//! ```
//!
//! Any structural failure along the way is answered with a Nak frame carrying
//! a one-byte error code.
//!
//! - **`protocol`** – The bytes on the wire: control bytes, [`Frame`], the XOR
//!   checksum, the encode/decode functions, the sequence counter, and the
//!   assembler that cuts a TCP byte stream into frame-sized chunks.
//!
//! - **`message`** – What travels inside a Data frame: the `(type, code)`
//!   header, the reply payloads, and the time-sync payload.
//!
//! - **`session`** – The per-connection state machine that correlates requests,
//!   acknowledgments and replies by sequence number.  It never touches a
//!   socket; callers feed it byte chunks and timeouts and it answers with
//!   actions.

pub mod message;
pub mod protocol;
pub mod session;

pub use message::{Message, MessageError, MessageGroup, Reply, TimeSync};
pub use protocol::codec::{
    decode_frame, encode_ack, encode_data, encode_frame, encode_nak, DecodeError, EncodeError,
};
pub use protocol::frame::{Frame, FrameKind, NakCode, INVALID_ADDRESS};
pub use session::{
    AddressCheck, EventSink, NoReply, ProtocolSession, Responder, SessionAction, SessionError,
    SessionEvent, SessionState, TracingSink,
};
