//! TCP client for the control center.
//!
//! A [`CenterClient`] owns one connection to a device and one originating
//! `ProtocolSession`.  Each request runs the whole handshake before the call
//! returns: send Data, wait for the device's Ack, wait for its reply, send
//! the final Ack.  The client never retries; a failed exchange is reported to
//! the caller and the session is ready for the next request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use ntcip_core::message::Reply;
use ntcip_core::protocol::{
    decode_frame, write_frame, DecodeError, Frame, FrameKind, FrameReader, ReadOutcome,
    TransportError,
};
use ntcip_core::session::{
    EventSink, NoReply, ProtocolSession, SessionAction, SessionError, TracingSink,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::application::commands::{corrupt_frame, to_hex, Command};

/// Default bound on connecting and on each handshake step.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur in the center's network layer.
#[derive(Debug, Error)]
pub enum CenterError {
    /// TCP connection to the device failed.
    #[error("failed to connect to device at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Connecting took longer than the configured timeout.
    #[error("timed out connecting to device at {0}")]
    ConnectTimeout(SocketAddr),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The handshake broke down; a Nak has already been sent.
    #[error("exchange failed: {0}")]
    Session(#[from] SessionError),

    /// The device refused the request with a Nak.
    #[error("device rejected the request with Nak code 0x{0:02X}")]
    Rejected(u8),

    /// The device closed the connection mid-exchange.
    #[error("connection closed by device")]
    Closed,

    /// The device answered the corrupt test frame with something that does
    /// not decode.
    #[error("undecodable answer to test frame: {0}")]
    Decode(#[from] DecodeError),

    /// The device did not answer the corrupt test frame at all.
    #[error("device did not answer the test frame")]
    NoAnswer,
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The device replied to an originated request.
    Reply(Reply),
    /// The device answered the corrupt test frame with this frame
    /// (normally a Nak).
    TestAnswer(Frame),
}

/// Connection from the center to one device.
pub struct CenterClient<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    session: ProtocolSession<NoReply>,
    step_timeout: Duration,
}

impl CenterClient<TcpStream> {
    /// Connects to the device at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`CenterError::ConnectFailed`] or [`CenterError::ConnectTimeout`].
    pub async fn connect(addr: SocketAddr, step_timeout: Duration) -> Result<Self, CenterError> {
        let stream = match timeout(step_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(CenterError::ConnectFailed { addr, source }),
            Err(_) => return Err(CenterError::ConnectTimeout(addr)),
        };
        info!("connected to device at {addr}");
        Ok(Self::from_stream(stream, step_timeout, Arc::new(TracingSink)))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> CenterClient<S> {
    /// Wraps an already-connected stream.
    pub fn from_stream(stream: S, step_timeout: Duration, events: Arc<dyn EventSink>) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read_half),
            writer,
            session: ProtocolSession::new(NoReply, events).with_ack_timeout(step_timeout),
            step_timeout,
        }
    }

    /// Runs `command` against device `addr`.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request) and [`test_nak`](Self::test_nak).
    pub async fn execute(&mut self, addr: u16, command: &Command) -> Result<Outcome, CenterError> {
        info!(addr, "sending {command}");
        match command {
            Command::TestNak { seq } => self.test_nak(*seq, addr).await.map(Outcome::TestAnswer),
            other => {
                let payload = other.payload().unwrap_or_default();
                let frame = self.request(addr, &payload).await?;
                Ok(Outcome::Reply(Reply::parse(&frame.payload)))
            }
        }
    }

    /// Sends a reset request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn reset(&mut self, addr: u16) -> Result<Reply, CenterError> {
        self.reply_to(addr, &Command::Reset).await
    }

    /// Sends a time-sync request carrying the local wall-clock time.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn sync_time(&mut self, addr: u16) -> Result<Reply, CenterError> {
        let command = Command::time_sync_at(&Local::now().naive_local());
        self.reply_to(addr, &command).await
    }

    async fn reply_to(&mut self, addr: u16, command: &Command) -> Result<Reply, CenterError> {
        let payload = command.payload().unwrap_or_default();
        let frame = self.request(addr, &payload).await?;
        Ok(Reply::parse(&frame.payload))
    }

    /// Runs one full handshake and returns the device's reply frame.
    ///
    /// # Errors
    ///
    /// - [`CenterError::Rejected`] if the device Naks the request.
    /// - [`CenterError::Session`] if the device's Ack or reply is missing,
    ///   late, or malformed.
    /// - [`CenterError::Closed`] / [`CenterError::Transport`] on connection loss.
    pub async fn request(&mut self, addr: u16, payload: &[u8]) -> Result<Frame, CenterError> {
        let bytes = self.session.originate(addr, payload)?;
        debug!("sending request {}", to_hex(&bytes));
        write_frame(&mut self.writer, &bytes).await?;

        loop {
            let actions = match self.reader.read_chunk(self.session.read_timeout()).await? {
                ReadOutcome::Frame(chunk) => {
                    debug!("received {}", to_hex(&chunk));
                    self.session.on_bytes(&chunk)
                }
                ReadOutcome::TimedOut => self.session.on_timeout(),
                ReadOutcome::Closed => return Err(CenterError::Closed),
            };

            let mut outcome = None;
            for action in actions {
                match action {
                    SessionAction::Send(bytes) => {
                        debug!("sending {}", to_hex(&bytes));
                        write_frame(&mut self.writer, &bytes).await?;
                    }
                    SessionAction::Response(frame) => outcome = Some(Ok(frame)),
                    SessionAction::Rejected(code) => {
                        warn!(addr, "request rejected with Nak code 0x{code:02X}");
                        outcome = Some(Err(CenterError::Rejected(code)));
                    }
                    SessionAction::Failed(e) => {
                        warn!(addr, "exchange failed: {e}");
                        outcome = Some(Err(CenterError::Session(e)));
                    }
                }
            }
            if let Some(outcome) = outcome {
                return outcome;
            }
        }
    }

    /// Sends the corrupt test frame and returns whatever the device answers.
    ///
    /// The frame's `LEN` claims more bytes than are sent, so the device only
    /// answers once its assembly gap has passed.
    ///
    /// # Errors
    ///
    /// Returns [`CenterError::NoAnswer`] if nothing arrives within the step
    /// timeout, or [`CenterError::Decode`] if the answer is malformed.
    pub async fn test_nak(&mut self, seq: u8, addr: u16) -> Result<Frame, CenterError> {
        let bytes = corrupt_frame(seq, addr);
        debug!("sending test frame {}", to_hex(&bytes));
        write_frame(&mut self.writer, &bytes).await?;

        match self.reader.read_chunk(Some(self.step_timeout)).await? {
            ReadOutcome::Frame(chunk) => {
                debug!("received {}", to_hex(&chunk));
                let frame = decode_frame(&chunk)?;
                if frame.kind != FrameKind::Nak {
                    warn!(kind = %frame.kind, "test frame was not answered with a Nak");
                }
                Ok(frame)
            }
            ReadOutcome::TimedOut => Err(CenterError::NoAnswer),
            ReadOutcome::Closed => Err(CenterError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntcip_core::protocol::{encode_ack, encode_data, encode_nak, NakCode};
    use ntcip_core::session::{MemorySink, SessionEvent};
    use tokio::io::{duplex, AsyncWriteExt};

    fn client<S: AsyncRead + AsyncWrite + Unpin>(stream: S, step: Duration) -> CenterClient<S> {
        CenterClient::from_stream(stream, step, Arc::new(MemorySink::new()))
    }

    #[tokio::test]
    async fn test_reset_runs_full_handshake() {
        // Arrange – the device answers Ack then reply, and expects the final Ack
        let mock = tokio_test::io::Builder::new()
            .write(&encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .read(&encode_ack(1, 1))
            .read(&encode_data(1, 1, &[0x0F, 0x90, 0x52, 0x52]).unwrap())
            .write(&encode_ack(1, 1))
            .build();
        let mut center = client(mock, Duration::from_secs(1));

        // Act
        let reply = center.reset(1).await.unwrap();

        // Assert
        assert_eq!(reply, Reply::ResetAck { param: [0x52, 0x52] });
    }

    #[tokio::test]
    async fn test_ack_and_reply_in_one_segment() {
        let mut segment = encode_ack(1, 1);
        segment.extend(encode_data(1, 1, &[0x0F, 0x90, 0x52, 0x52]).unwrap());
        let mock = tokio_test::io::Builder::new()
            .write(&encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .read(&segment)
            .write(&encode_ack(1, 1))
            .build();
        let mut center = client(mock, Duration::from_secs(1));

        let outcome = center.execute(1, &Command::Reset).await.unwrap();

        assert_eq!(outcome, Outcome::Reply(Reply::ResetAck { param: [0x52, 0x52] }));
    }

    #[tokio::test]
    async fn test_nak_instead_of_ack_is_a_rejection() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_data(1, 0xFFFF, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .read(&encode_nak(1, 0xFFFF, NakCode::Address))
            .build();
        let mut center = client(mock, Duration::from_secs(1));

        let err = center.reset(0xFFFF).await.unwrap_err();

        assert!(matches!(err, CenterError::Rejected(0x04)));
    }

    #[tokio::test]
    async fn test_silent_device_times_out_and_is_naked() {
        // Arrange
        let (center_side, device_side) = duplex(1024);
        let mut center = client(center_side, Duration::from_millis(50));
        let mut device = FrameReader::new(device_side);

        // Act
        let err = center.reset(1).await.unwrap_err();
        let request = device.read_chunk(Some(Duration::from_secs(1))).await.unwrap();
        let nak = device.read_chunk(Some(Duration::from_secs(1))).await.unwrap();

        // Assert
        assert!(matches!(err, CenterError::Session(SessionError::Timeout)));
        assert!(matches!(request, ReadOutcome::Frame(_)));
        assert_eq!(nak, ReadOutcome::Frame(encode_nak(1, 1, NakCode::Frame)));
    }

    #[tokio::test]
    async fn test_corrupt_reply_is_naked_with_parity_code() {
        // Arrange
        let mut bad_reply = encode_data(1, 1, &[0x0F, 0x90, 0x52, 0x52]).unwrap();
        let last = bad_reply.len() - 1;
        bad_reply[last] ^= 0x01;
        let mock = tokio_test::io::Builder::new()
            .write(&encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .read(&encode_ack(1, 1))
            .read(&bad_reply)
            .write(&encode_nak(1, 1, NakCode::Parity))
            .build();
        let mut center = client(mock, Duration::from_secs(1));

        // Act
        let err = center.reset(1).await.unwrap_err();

        // Assert
        assert!(matches!(
            err,
            CenterError::Session(SessionError::Decode(DecodeError::ChecksumMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_sequence_advances_between_requests() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .read(&encode_ack(1, 1))
            .read(&encode_data(1, 1, &[0x0F, 0x90, 0x52, 0x52]).unwrap())
            .write(&encode_ack(1, 1))
            .write(&encode_data(2, 1, &[0x6F, 0x10]).unwrap())
            .read(&encode_ack(2, 1))
            .read(&encode_data(2, 1, &[0x0F, 0x80, 0x6F, 0x10]).unwrap())
            .write(&encode_ack(2, 1))
            .build();
        let mut center = client(mock, Duration::from_secs(1));

        center.reset(1).await.unwrap();
        let outcome = center
            .execute(1, &Command::Send(vec![0x6F, 0x10]))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Reply(Reply::SettingAccepted {
                group: 0x6F,
                code: 0x10
            })
        );
    }

    #[tokio::test]
    async fn test_test_nak_returns_device_answer() {
        // Arrange
        let (center_side, device_side) = duplex(1024);
        let mut center = client(center_side, Duration::from_secs(1));
        let (device_read, mut device_write) = tokio::io::split(device_side);
        let mut device = FrameReader::with_gap(device_read, Duration::from_millis(20));
        let device_task = tokio::spawn(async move {
            let chunk = device.read_chunk(Some(Duration::from_secs(1))).await.unwrap();
            device_write
                .write_all(&encode_nak(0, 1, NakCode::Length))
                .await
                .unwrap();
            chunk
        });

        // Act
        let answer = center.test_nak(0, 1).await.unwrap();

        // Assert
        assert_eq!(answer, Frame::nak(0, 1, NakCode::Length));
        assert_eq!(
            device_task.await.unwrap(),
            ReadOutcome::Frame(corrupt_frame(0, 1))
        );
    }

    #[tokio::test]
    async fn test_test_nak_without_answer() {
        let (center_side, _device_side) = duplex(1024);
        let mut center = client(center_side, Duration::from_millis(30));

        let err = center.test_nak(0, 1).await.unwrap_err();

        assert!(matches!(err, CenterError::NoAnswer));
    }

    #[tokio::test]
    async fn test_session_events_are_recorded() {
        let sink = Arc::new(MemorySink::new());
        let mock = tokio_test::io::Builder::new()
            .write(&encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .read(&encode_ack(1, 1))
            .read(&encode_data(1, 1, &[0x0F, 0x90, 0x52, 0x52]).unwrap())
            .write(&encode_ack(1, 1))
            .build();
        let mut center = CenterClient::from_stream(mock, Duration::from_secs(1), sink.clone());

        center.reset(1).await.unwrap();

        let events = sink.events();
        assert!(events.contains(&SessionEvent::AckReceived { seq: 1 }));
        assert!(events.contains(&SessionEvent::ResponseReceived { seq: 1, addr: 1 }));
    }
}
