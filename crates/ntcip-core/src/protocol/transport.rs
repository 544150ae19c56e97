//! Async frame I/O over any byte stream.
//!
//! TCP is a stream protocol: one `read()` may return part of a frame or
//! several frames at once.  [`FrameReader`] pairs an [`AsyncRead`] with a
//! [`FrameAssembler`] and hands out one frame-sized chunk per call.  It also
//! owns the two clocks that matter on this link:
//!
//! - **assembly gap** – if the peer stops sending in the middle of a frame for
//!   longer than the gap, the partial bytes are released as a chunk so the
//!   session can Nak them instead of waiting forever;
//! - **overall wait** – an optional bound on how long a single call may wait
//!   for a chunk at all (used while waiting for a peer's Ack or reply).
//!
//! Both are built on `tokio::time`, so they work with real sockets,
//! `tokio::io::duplex` pipes, and paused test clocks alike.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

use super::assembler::FrameAssembler;

/// Default time a partial frame may sit idle before it is released.
pub const DEFAULT_ASSEMBLY_GAP: Duration = Duration::from_millis(200);

const READ_CHUNK: usize = 4096;

/// Errors raised by the frame transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result of one [`FrameReader::read_chunk`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One frame-sized chunk.  It has not been validated.
    Frame(Vec<u8>),
    /// The overall wait expired before any chunk was ready.
    TimedOut,
    /// The peer closed the stream and no buffered bytes remain.
    Closed,
}

/// Reads frame-sized chunks from an async byte stream.
pub struct FrameReader<R> {
    reader: R,
    assembler: FrameAssembler,
    ready: VecDeque<Vec<u8>>,
    gap: Duration,
    last_rx: Instant,
    eof: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wraps `reader` with the default assembly gap.
    pub fn new(reader: R) -> Self {
        Self::with_gap(reader, DEFAULT_ASSEMBLY_GAP)
    }

    /// Wraps `reader` with a custom assembly gap.
    pub fn with_gap(reader: R, gap: Duration) -> Self {
        Self {
            reader,
            assembler: FrameAssembler::new(),
            ready: VecDeque::new(),
            gap,
            last_rx: Instant::now(),
            eof: false,
        }
    }

    /// Waits for the next chunk.
    ///
    /// With `wait = None` the call waits as long as it takes; with
    /// `Some(d)` it returns [`ReadOutcome::TimedOut`] once `d` has elapsed
    /// without a chunk becoming ready.  A stalled partial frame is released
    /// after the assembly gap regardless of `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the underlying read fails.
    pub async fn read_chunk(&mut self, wait: Option<Duration>) -> Result<ReadOutcome, TransportError> {
        let deadline = wait.map(|w| Instant::now() + w);
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Ok(ReadOutcome::Frame(chunk));
            }
            if self.eof {
                return Ok(match self.assembler.take_partial() {
                    Some(partial) => ReadOutcome::Frame(partial),
                    None => ReadOutcome::Closed,
                });
            }

            let gap_deadline = (!self.assembler.is_empty()).then(|| self.last_rx + self.gap);
            let (limit, is_gap) = match (deadline, gap_deadline) {
                (Some(d), Some(g)) if g <= d => (Some(g), true),
                (Some(d), _) => (Some(d), false),
                (None, Some(g)) => (Some(g), true),
                (None, None) => (None, false),
            };

            let read = match limit {
                None => self.reader.read(&mut buf).await,
                Some(at) => match timeout_at(at, self.reader.read(&mut buf)).await {
                    Ok(read) => read,
                    Err(_) if is_gap => {
                        if let Some(partial) = self.assembler.take_partial() {
                            return Ok(ReadOutcome::Frame(partial));
                        }
                        continue;
                    }
                    Err(_) => return Ok(ReadOutcome::TimedOut),
                },
            };

            match read? {
                0 => self.eof = true,
                n => {
                    self.last_rx = Instant::now();
                    self.ready.extend(self.assembler.push(&buf[..n]));
                }
            }
        }
    }

    /// Number of bytes held in the assembler and not yet released.
    pub fn buffered(&self) -> usize {
        self.assembler.len() + self.ready.iter().map(Vec::len).sum::<usize>()
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes one encoded frame and flushes it.
///
/// # Errors
///
/// Returns [`TransportError::Io`] if the write or flush fails.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), TransportError> {
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}
