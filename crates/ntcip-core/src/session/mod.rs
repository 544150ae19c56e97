//! Socket-free protocol session state machine.
//!
//! A [`ProtocolSession`] correlates frames on one connection by sequence
//! number.  It is fed frame-sized byte chunks and read timeouts, and answers
//! with [`SessionAction`]s: bytes to write, and outcomes of exchanges this
//! side originated.  It never performs I/O itself, so every transition can
//! be tested with plain byte vectors.
//!
//! # Responding (device side)
//!
//! | State | Event | Action | Next |
//! |---|---|---|---|
//! | Idle | Data, address accepted | Ack, then dispatch | AwaitFinalAck if a reply was sent, else Idle |
//! | Idle | Data, address rejected | Nak(Address) | Idle |
//! | Idle | decode failure | Nak(mapped code) with salvaged seq/addr | Idle |
//! | Idle | Ack or Nak | ignore | Idle |
//! | AwaitFinalAck | Ack, seq matches | none | Idle |
//! | AwaitFinalAck | Nak | none | Idle |
//! | AwaitFinalAck | new Data frame | Nak(Frame) with pending seq/addr; the request is not dispatched | Idle |
//! | AwaitFinalAck | anything else, or timeout | Nak(Frame) with pending seq/addr | Idle |
//!
//! # Originating (center side)
//!
//! | State | Event | Action | Next |
//! |---|---|---|---|
//! | AwaitAck | Ack, seq matches | none | AwaitResponse |
//! | AwaitAck | Nak, seq matches | report `Rejected` | Idle |
//! | AwaitAck / AwaitResponse | anything unexpected, or timeout | Nak with pending seq/addr, report `Failed` | Idle |
//! | AwaitResponse | Data, seq matches | Ack, report `Response` | Idle |

pub mod events;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::codec::{decode_frame, encode_ack, encode_data, encode_nak, salvage_header, DecodeError, EncodeError};
use crate::protocol::frame::{Frame, FrameKind, NakCode, INVALID_ADDRESS};
use crate::protocol::sequence::SequenceCounter;

pub use events::{EventSink, MemorySink, SessionEvent, TracingSink};

/// Default bound on how long the session waits for the peer's Ack or reply.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

// ── Collaborators ─────────────────────────────────────────────────────────────

/// Produces the reply payload for an inbound Data frame.
///
/// Returning `None` means "no reply": the request is acknowledged and the
/// exchange ends there.
pub trait Responder {
    fn respond(&self, request: &Frame) -> Option<Vec<u8>>;
}

impl<T: Responder + ?Sized> Responder for Arc<T> {
    fn respond(&self, request: &Frame) -> Option<Vec<u8>> {
        (**self).respond(request)
    }
}

/// Responder that never replies.  Used by sessions that only originate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReply;

impl Responder for NoReply {
    fn respond(&self, _request: &Frame) -> Option<Vec<u8>> {
        None
    }
}

/// Decides which Data frame addresses this end answers.
///
/// [`INVALID_ADDRESS`] is always rejected, whatever the check says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressCheck {
    /// Any address except the invalid sentinel.
    #[default]
    Any,
    /// Only this device address.
    Device(u16),
}

impl AddressCheck {
    pub fn accepts(&self, addr: u16) -> bool {
        if addr == INVALID_ADDRESS {
            return false;
        }
        match self {
            AddressCheck::Any => true,
            AddressCheck::Device(own) => addr == *own,
        }
    }
}

// ── State, actions, errors ────────────────────────────────────────────────────

/// Where the session is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    /// Sent a request; waiting for the peer's Ack.
    AwaitAck,
    /// The peer acknowledged our request; waiting for its reply.
    AwaitResponse,
    /// Sent a reply; waiting for the peer's Ack.
    AwaitFinalAck,
}

/// Errors and failed outcomes of a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `originate` was called while an exchange is in progress.
    #[error("session busy in state {0:?}")]
    Busy(SessionState),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("peer did not answer in time")]
    Timeout,

    #[error("undecodable frame from peer: {0}")]
    Decode(DecodeError),

    #[error("unexpected {kind} frame with seq {seq}")]
    UnexpectedFrame { kind: FrameKind, seq: u8 },
}

/// What the caller must do after feeding the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write these bytes to the peer, in order.
    Send(Vec<u8>),
    /// An originated exchange finished with the peer's reply.
    Response(Frame),
    /// The peer refused an originated request with this Nak code.
    Rejected(u8),
    /// An originated exchange broke down; a Nak has already been queued.
    Failed(SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    seq: u8,
    addr: u16,
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Per-connection protocol state machine.
pub struct ProtocolSession<R> {
    responder: R,
    events: Arc<dyn EventSink>,
    address: AddressCheck,
    ack_timeout: Duration,
    sequence: SequenceCounter,
    state: SessionState,
    pending: Option<Pending>,
}

impl<R: Responder> ProtocolSession<R> {
    /// Creates an idle session that answers requests with `responder`.
    pub fn new(responder: R, events: Arc<dyn EventSink>) -> Self {
        Self {
            responder,
            events,
            address: AddressCheck::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            sequence: SequenceCounter::new(),
            state: SessionState::Idle,
            pending: None,
        }
    }

    pub fn with_address_check(mut self, address: AddressCheck) -> Self {
        self.address = address;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_sequence(mut self, sequence: SequenceCounter) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `(seq, addr)` of the frame the session is waiting on, if any.
    pub fn pending(&self) -> Option<(u8, u16)> {
        self.pending.map(|p| (p.seq, p.addr))
    }

    /// How long the caller should wait for the next chunk before calling
    /// [`on_timeout`](Self::on_timeout).  `None` in `Idle`: wait forever.
    pub fn read_timeout(&self) -> Option<Duration> {
        match self.state {
            SessionState::Idle => None,
            _ => Some(self.ack_timeout),
        }
    }

    /// Starts an exchange: encodes a Data frame with the next sequence
    /// number and returns the bytes to send.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Busy`] unless the session is idle, or
    /// [`SessionError::Encode`] if the payload is too large.
    pub fn originate(&mut self, addr: u16, payload: &[u8]) -> Result<Vec<u8>, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::Busy(self.state));
        }
        let seq = self.sequence.peek();
        let bytes = encode_data(seq, addr, payload)?;
        self.sequence.skip();
        self.pending = Some(Pending { seq, addr });
        self.state = SessionState::AwaitAck;
        Ok(bytes)
    }

    /// Feeds one frame-sized chunk.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Vec<SessionAction> {
        let decoded = decode_frame(bytes);
        if let Ok(frame) = &decoded {
            self.record(SessionEvent::FrameReceived {
                kind: frame.kind,
                seq: frame.seq,
                addr: frame.addr,
            });
        }

        match self.state {
            SessionState::Idle => self.idle(decoded, bytes),
            SessionState::AwaitFinalAck => self.await_final_ack(decoded),
            SessionState::AwaitAck => self.await_ack(decoded),
            SessionState::AwaitResponse => self.await_response(decoded),
        }
    }

    /// Reports that the wait returned by [`read_timeout`](Self::read_timeout)
    /// expired.
    pub fn on_timeout(&mut self) -> Vec<SessionAction> {
        let state = self.state;
        if state == SessionState::Idle {
            return Vec::new();
        }
        self.record(SessionEvent::TimedOut { state });
        let mut actions = vec![self.fail_pending(NakCode::Frame)];
        if state != SessionState::AwaitFinalAck {
            actions.push(SessionAction::Failed(SessionError::Timeout));
        }
        actions
    }

    // ── Per-state handlers ──────────────────────────────────────────────────

    fn idle(&mut self, decoded: Result<Frame, DecodeError>, raw: &[u8]) -> Vec<SessionAction> {
        let frame = match decoded {
            Ok(frame) => frame,
            Err(error) => {
                let (seq, addr) = salvage_header(raw);
                let code = error.nak_code();
                self.record(SessionEvent::DecodeFailed { error, seq, addr });
                return vec![SessionAction::Send(encode_nak(seq, addr, code))];
            }
        };

        if frame.kind != FrameKind::Data {
            self.stray(&frame);
            return Vec::new();
        }
        if !self.address.accepts(frame.addr) {
            self.record(SessionEvent::AddressRejected {
                seq: frame.seq,
                addr: frame.addr,
            });
            return vec![SessionAction::Send(encode_nak(frame.seq, frame.addr, NakCode::Address))];
        }

        let mut actions = vec![SessionAction::Send(encode_ack(frame.seq, frame.addr))];
        let reply = self.responder.respond(&frame);
        self.record(SessionEvent::RequestHandled {
            seq: frame.seq,
            addr: frame.addr,
            replied: reply.is_some(),
        });

        if let Some(payload) = reply {
            match encode_data(frame.seq, frame.addr, &payload) {
                Ok(bytes) => {
                    self.sequence.skip();
                    self.pending = Some(Pending {
                        seq: frame.seq,
                        addr: frame.addr,
                    });
                    self.state = SessionState::AwaitFinalAck;
                    actions.push(SessionAction::Send(bytes));
                }
                Err(e) => self.record(SessionEvent::ReplyDropped {
                    seq: frame.seq,
                    reason: e.to_string(),
                }),
            }
        }
        actions
    }

    fn await_final_ack(&mut self, decoded: Result<Frame, DecodeError>) -> Vec<SessionAction> {
        let Some(pending) = self.pending else {
            self.reset();
            return Vec::new();
        };
        match decoded {
            Ok(frame) if frame.kind == FrameKind::Ack && frame.seq == pending.seq => {
                self.record(SessionEvent::FinalAckReceived { seq: frame.seq });
                self.reset();
                Vec::new()
            }
            Ok(frame) if frame.kind == FrameKind::Nak => {
                self.peer_nak(&frame);
                self.reset();
                Vec::new()
            }
            Ok(_) | Err(_) => vec![self.fail_pending(NakCode::Frame)],
        }
    }

    fn await_ack(&mut self, decoded: Result<Frame, DecodeError>) -> Vec<SessionAction> {
        let Some(pending) = self.pending else {
            self.reset();
            return Vec::new();
        };
        match decoded {
            Ok(frame) if frame.kind == FrameKind::Ack && frame.seq == pending.seq => {
                self.record(SessionEvent::AckReceived { seq: frame.seq });
                self.state = SessionState::AwaitResponse;
                Vec::new()
            }
            Ok(frame) if frame.kind == FrameKind::Nak && frame.seq == pending.seq => {
                self.peer_nak(&frame);
                self.reset();
                vec![SessionAction::Rejected(frame.nak_byte().unwrap_or(0))]
            }
            other => self.originated_failure(other),
        }
    }

    fn await_response(&mut self, decoded: Result<Frame, DecodeError>) -> Vec<SessionAction> {
        let Some(pending) = self.pending else {
            self.reset();
            return Vec::new();
        };
        match decoded {
            Ok(frame) if frame.kind == FrameKind::Data && frame.seq == pending.seq => {
                self.record(SessionEvent::ResponseReceived {
                    seq: frame.seq,
                    addr: frame.addr,
                });
                self.reset();
                vec![
                    SessionAction::Send(encode_ack(frame.seq, frame.addr)),
                    SessionAction::Response(frame),
                ]
            }
            other => self.originated_failure(other),
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    fn originated_failure(&mut self, decoded: Result<Frame, DecodeError>) -> Vec<SessionAction> {
        let (code, error) = match decoded {
            Err(e) => (e.nak_code(), SessionError::Decode(e)),
            Ok(frame) => {
                if frame.kind == FrameKind::Nak {
                    self.peer_nak(&frame);
                }
                (
                    NakCode::Frame,
                    SessionError::UnexpectedFrame {
                        kind: frame.kind,
                        seq: frame.seq,
                    },
                )
            }
        };
        vec![self.fail_pending(code), SessionAction::Failed(error)]
    }

    /// Naks the pending frame and returns to idle.
    fn fail_pending(&mut self, code: NakCode) -> SessionAction {
        let (seq, addr) = self.pending().unwrap_or((0, 0));
        self.record(SessionEvent::HandshakeFailed {
            state: self.state,
            seq,
            addr,
            code,
        });
        self.reset();
        SessionAction::Send(encode_nak(seq, addr, code))
    }

    fn peer_nak(&self, frame: &Frame) {
        self.record(SessionEvent::PeerNak {
            seq: frame.seq,
            addr: frame.addr,
            code: frame.nak_byte().unwrap_or(0),
        });
    }

    fn stray(&self, frame: &Frame) {
        self.record(SessionEvent::StrayFrame {
            state: self.state,
            kind: frame.kind,
            seq: frame.seq,
        });
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.pending = None;
    }

    fn record(&self, event: SessionEvent) {
        self.events.record(&event);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
