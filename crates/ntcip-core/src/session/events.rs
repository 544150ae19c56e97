//! Protocol events reported by a session.
//!
//! The session never logs directly.  It reports what happened to an
//! [`EventSink`] passed in at construction, so tests can capture events and
//! binaries can route them to `tracing`.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::SessionState;
use crate::protocol::codec::DecodeError;
use crate::protocol::frame::{FrameKind, NakCode};

/// Something noteworthy that happened inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A chunk decoded into a frame.
    FrameReceived { kind: FrameKind, seq: u8, addr: u16 },
    /// A chunk failed to decode and was answered with a Nak.
    DecodeFailed {
        error: DecodeError,
        seq: u8,
        addr: u16,
    },
    /// A Data frame was addressed to an invalid or foreign address.
    AddressRejected { seq: u8, addr: u16 },
    /// A request was handed to the responder.
    RequestHandled { seq: u8, addr: u16, replied: bool },
    /// The responder's reply could not be encoded and was dropped.
    ReplyDropped { seq: u8, reason: String },
    /// The peer acknowledged our reply; the exchange is complete.
    FinalAckReceived { seq: u8 },
    /// The peer acknowledged a request we originated.
    AckReceived { seq: u8 },
    /// The peer answered a request we originated.
    ResponseReceived { seq: u8, addr: u16 },
    /// The peer sent a Nak.
    PeerNak { seq: u8, addr: u16, code: u8 },
    /// A handshake broke down and a Nak was sent.
    HandshakeFailed {
        state: SessionState,
        seq: u8,
        addr: u16,
        code: NakCode,
    },
    /// A frame arrived that nothing was waiting for; it was ignored.
    StrayFrame {
        state: SessionState,
        kind: FrameKind,
        seq: u8,
    },
    /// The wait for the peer expired.
    TimedOut { state: SessionState },
}

/// Receives session events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &SessionEvent);
}

/// Forwards events to `tracing`.
///
/// Normal traffic goes to `debug`, completed exchanges to `info`, and
/// anything that produced a Nak or was dropped to `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &SessionEvent) {
        match event {
            SessionEvent::FrameReceived { kind, seq, addr } => {
                debug!(%kind, seq, addr, "frame received");
            }
            SessionEvent::DecodeFailed { error, seq, addr } => {
                warn!(seq, addr, code = ?error.nak_code(), "decode failed: {error}");
            }
            SessionEvent::AddressRejected { seq, addr } => {
                warn!(seq, addr = format_args!("0x{addr:04X}"), "address rejected");
            }
            SessionEvent::RequestHandled { seq, addr, replied } => {
                info!(seq, addr, replied, "request handled");
            }
            SessionEvent::ReplyDropped { seq, reason } => {
                warn!(seq, "reply dropped: {reason}");
            }
            SessionEvent::FinalAckReceived { seq } => {
                info!(seq, "exchange complete");
            }
            SessionEvent::AckReceived { seq } => {
                debug!(seq, "request acknowledged");
            }
            SessionEvent::ResponseReceived { seq, addr } => {
                info!(seq, addr, "response received");
            }
            SessionEvent::PeerNak { seq, addr, code } => {
                warn!(seq, addr, code = format_args!("0x{code:02X}"), "peer sent Nak");
            }
            SessionEvent::HandshakeFailed {
                state,
                seq,
                addr,
                code,
            } => {
                warn!(?state, seq, addr, ?code, "handshake failed; Nak sent");
            }
            SessionEvent::StrayFrame { state, kind, seq } => {
                debug!(?state, %kind, seq, "stray frame ignored");
            }
            SessionEvent::TimedOut { state } => {
                warn!(?state, "timed out waiting for peer");
            }
        }
    }
}

/// Keeps every event in memory.  Useful in tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SessionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every event recorded so far.
    pub fn events(&self) -> Vec<SessionEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &SessionEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}
