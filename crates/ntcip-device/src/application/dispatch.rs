//! MessageDispatcher: routes a request's `(type, code)` to a handler.
//!
//! The routing table is built once at startup and never changes afterwards,
//! so one dispatcher is shared by every connection behind an `Arc`.
//! Handlers are plain functions: given the request data and a small context
//! (sequence number, address, clock) they return a reply payload, "no reply",
//! or a [`ValidationError`].  A validation error never becomes a Nak; the
//! frame was structurally fine, so the request is acknowledged, logged, and
//! left unanswered.

use std::collections::HashMap;
use std::sync::Arc;

use ntcip_core::message::{code, Message, MessageError, MessageGroup};
use ntcip_core::protocol::Frame;
use ntcip_core::session::Responder;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::handlers;

/// Why a handler refused a structurally valid request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed message: {0}")]
    Malformed(#[from] MessageError),
}

/// What a handler sees besides the request data.
pub struct HandlerContext<'a> {
    /// Sequence number of the request; the reply echoes it.
    pub seq: u8,
    pub addr: u16,
    pub clock: &'a dyn Clock,
}

/// A message handler.  `Ok(None)` means "no reply".
pub type Handler = fn(&HandlerContext<'_>, &[u8]) -> Result<Option<Vec<u8>>, ValidationError>;

/// Routing table from `(type, code)` to handler.
pub struct Dispatcher {
    routes: HashMap<(u8, u8), Handler>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// An empty table.  Every request goes unanswered until routes are added.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            routes: HashMap::new(),
            clock,
        }
    }

    /// The table with every implemented route: reset and time-sync.
    pub fn with_default_routes(clock: Arc<dyn Clock>) -> Self {
        let mut dispatcher = Self::new(clock);
        dispatcher.register(MessageGroup::General, code::RESET, handlers::reset);
        dispatcher.register(MessageGroup::General, code::TIME_SYNC, handlers::time_sync);
        dispatcher
    }

    /// Adds or replaces the handler for `(group, code)`.
    pub fn register(&mut self, group: MessageGroup, code: u8, handler: Handler) {
        self.routes.insert((group as u8, code), handler);
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Runs the handler for `(msg_type, msg_code)` and returns its reply.
    ///
    /// Unknown types, unrouted codes, the reserved signal-controller and
    /// detector groups, and validation failures all yield `None`.
    pub fn dispatch(
        &self,
        msg_type: u8,
        msg_code: u8,
        data: &[u8],
        seq: u8,
        addr: u16,
    ) -> Option<Vec<u8>> {
        let Ok(group) = MessageGroup::try_from(msg_type) else {
            info!(
                msg_type = format_args!("0x{msg_type:02X}"),
                msg_code = format_args!("0x{msg_code:02X}"),
                "unknown message type; no reply"
            );
            return None;
        };

        let Some(handler) = self.routes.get(&(msg_type, msg_code)) else {
            match group {
                MessageGroup::SignalController | MessageGroup::Detector => debug!(
                    %group,
                    msg_code = format_args!("0x{msg_code:02X}"),
                    "reserved group has no handler; no reply"
                ),
                MessageGroup::General => info!(
                    msg_code = format_args!("0x{msg_code:02X}"),
                    "unsupported general command; no reply"
                ),
            }
            return None;
        };

        let ctx = HandlerContext {
            seq,
            addr,
            clock: self.clock.as_ref(),
        };
        match handler(&ctx, data) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    seq,
                    %group,
                    msg_code = format_args!("0x{msg_code:02X}"),
                    "request rejected: {e}"
                );
                None
            }
        }
    }
}

impl Responder for Dispatcher {
    fn respond(&self, request: &Frame) -> Option<Vec<u8>> {
        match Message::parse(&request.payload) {
            Ok(msg) => self.dispatch(msg.msg_type, msg.code, msg.data, request.seq, request.addr),
            Err(e) => {
                warn!(seq = request.seq, "request without message header: {e}");
                None
            }
        }
    }
}
