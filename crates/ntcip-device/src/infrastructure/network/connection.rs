//! Per-connection driver: runs one `ProtocolSession` over one byte stream.
//!
//! The session is pure; this module does the I/O around it.  Each step is
//! strictly sequential: read one chunk (bounded by the session's current
//! timeout), feed it to the session, write whatever the session asks for,
//! read the next chunk.  Nothing is shared with other connections.

use std::time::Duration;

use ntcip_core::protocol::{write_frame, FrameReader, ReadOutcome, TransportError};
use ntcip_core::session::{ProtocolSession, Responder, SessionAction};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Drives `session` over `stream` until the peer closes it.
///
/// Returns `Ok(())` on a clean EOF.
///
/// # Errors
///
/// Returns [`TransportError`] if a read or write fails; the caller drops the
/// connection.
pub async fn run_session<S, R>(
    stream: S,
    mut session: ProtocolSession<R>,
    assembly_gap: Duration,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Responder,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = FrameReader::with_gap(read_half, assembly_gap);

    loop {
        let actions = match reader.read_chunk(session.read_timeout()).await? {
            ReadOutcome::Frame(chunk) => {
                debug!(len = chunk.len(), bytes = ?chunk, "chunk received");
                session.on_bytes(&chunk)
            }
            ReadOutcome::TimedOut => session.on_timeout(),
            ReadOutcome::Closed => {
                info!(state = ?session.state(), "peer closed connection");
                return Ok(());
            }
        };

        for action in actions {
            match action {
                SessionAction::Send(bytes) => {
                    debug!(bytes = ?bytes, "sending frame");
                    write_frame(&mut write_half, &bytes).await?;
                }
                other => debug!(?other, "outcome of originated exchange"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ntcip_core::protocol::{decode_frame, encode_ack, encode_data, Frame, NakCode};
    use ntcip_core::session::{MemorySink, SessionEvent};
    use tokio::io::{duplex, AsyncWriteExt};

    use crate::application::clock::MockClock;
    use crate::application::dispatch::Dispatcher;

    fn session(sink: Arc<MemorySink>, ack_timeout: Duration) -> ProtocolSession<Arc<Dispatcher>> {
        let dispatcher = Arc::new(Dispatcher::with_default_routes(Arc::new(MockClock::new())));
        ProtocolSession::new(dispatcher, sink).with_ack_timeout(ack_timeout)
    }

    async fn next_frame<R: AsyncRead + Unpin>(reader: &mut FrameReader<R>) -> Frame {
        match reader.read_chunk(Some(Duration::from_secs(2))).await.unwrap() {
            ReadOutcome::Frame(bytes) => decode_frame(&bytes).unwrap(),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reset_exchange_over_duplex() {
        // Arrange
        let (device_side, center_side) = duplex(1024);
        let sink = Arc::new(MemorySink::new());
        let driver = tokio::spawn(run_session(
            device_side,
            session(sink.clone(), Duration::from_secs(2)),
            Duration::from_millis(50),
        ));
        let (center_read, mut center_write) = tokio::io::split(center_side);
        let mut center = FrameReader::new(center_read);

        // Act
        center_write
            .write_all(&encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .await
            .unwrap();
        let ack = next_frame(&mut center).await;
        let reply = next_frame(&mut center).await;
        center_write.write_all(&encode_ack(1, 1)).await.unwrap();
        drop(center_write);
        drop(center);

        // Assert
        assert_eq!(ack, Frame::ack(1, 1));
        assert_eq!(reply, Frame::data(1, 1, vec![0x0F, 0x90, 0x52, 0x52]));
        driver.await.unwrap().unwrap();
        assert!(sink
            .events()
            .contains(&SessionEvent::FinalAckReceived { seq: 1 }));
    }

    #[tokio::test]
    async fn test_missing_final_ack_is_naked_after_timeout() {
        // Arrange
        let (device_side, center_side) = duplex(1024);
        let sink = Arc::new(MemorySink::new());
        tokio::spawn(run_session(
            device_side,
            session(sink, Duration::from_millis(50)),
            Duration::from_millis(50),
        ));
        let (center_read, mut center_write) = tokio::io::split(center_side);
        let mut center = FrameReader::new(center_read);

        // Act – send a reset, read Ack and reply, then stay silent
        center_write
            .write_all(&encode_data(3, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap())
            .await
            .unwrap();
        next_frame(&mut center).await;
        next_frame(&mut center).await;
        let nak = next_frame(&mut center).await;

        // Assert
        assert_eq!(nak, Frame::nak(3, 1, NakCode::Frame));
    }

    #[tokio::test]
    async fn test_stalled_partial_frame_is_naked_with_length_code() {
        // Arrange – LEN claims 20 bytes, only 14 arrive
        let (device_side, center_side) = duplex(1024);
        tokio::spawn(run_session(
            device_side,
            session(Arc::new(MemorySink::new()), Duration::from_secs(1)),
            Duration::from_millis(30),
        ));
        let (center_read, mut center_write) = tokio::io::split(center_side);
        let mut center = FrameReader::new(center_read);
        let broken = [
            0xAA, 0xBB, 0x00, 0x00, 0x01, 0x00, 0x14, 0x0F, 0x10, 0x52, 0x52, 0xAA, 0xCC, 0xFF,
        ];

        // Act
        center_write.write_all(&broken).await.unwrap();
        let nak = next_frame(&mut center).await;

        // Assert
        assert_eq!(nak, Frame::nak(0, 1, NakCode::Length));
    }

    #[tokio::test]
    async fn test_scripted_peer_with_mock_io() {
        // Arrange – a peer that sends a reset, expects Ack + reply, then acks
        let request = encode_data(1, 1, &[0x0F, 0x10, 0x52, 0x52]).unwrap();
        let reply = encode_data(1, 1, &[0x0F, 0x90, 0x52, 0x52]).unwrap();
        let mock = tokio_test::io::Builder::new()
            .read(&request)
            .write(&encode_ack(1, 1))
            .write(&reply)
            .read(&encode_ack(1, 1))
            .build();

        // Act
        let result = run_session(
            mock,
            session(Arc::new(MemorySink::new()), Duration::from_secs(1)),
            Duration::from_millis(50),
        )
        .await;

        // Assert
        assert!(result.is_ok());
    }
}
