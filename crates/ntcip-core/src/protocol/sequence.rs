//! Per-session sequence counter for originated Data frames.
//!
//! Every Data frame a session originates carries a one-byte sequence number.
//! The peer echoes it in its Ack and in its reply, which is the only way the
//! two ends correlate a request with its answers.  Replies echo the inbound
//! number rather than drawing a fresh one, but the counter still advances for
//! them so the next originated frame never reuses a number the peer has just
//! seen.
//!
//! A session is owned by exactly one connection task, so the counter is a
//! plain value behind `&mut self`; no atomics are needed.

/// Monotonic sequence counter that wraps from 255 back to 0.
///
/// # Examples
///
/// ```rust
/// use ntcip_core::protocol::SequenceCounter;
///
/// let mut counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// Creates a counter whose first value is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a counter whose first value is `first`.
    pub fn starting_at(first: u8) -> Self {
        Self { next: first }
    }

    /// Returns the next sequence number and advances the counter.
    ///
    /// Wraps from `u8::MAX` to 0 without panicking.
    pub fn next(&mut self) -> u8 {
        let value = self.next;
        self.next = self.next.wrapping_add(1);
        value
    }

    /// Advances the counter without using the value.
    ///
    /// Called when a reply is sent: the reply carries the inbound number, but
    /// the session has still originated a frame.
    pub fn skip(&mut self) {
        self.next = self.next.wrapping_add(1);
    }

    /// Returns the value the next call to [`next`](Self::next) will yield.
    pub fn peek(&self) -> u8 {
        self.next
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
