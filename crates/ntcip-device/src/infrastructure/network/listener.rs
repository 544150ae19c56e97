//! TCP listener: accept loop, control-center allow-list, one task per
//! connection.
//!
//! The accept loop polls a shared `AtomicBool` between accepts, using a short
//! accept timeout so a cleared flag is noticed promptly even when nobody is
//! connecting.  Clearing the flag stops new connections only; sessions already
//! running keep going until their own peer disconnects.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ntcip_core::session::{AddressCheck, EventSink, ProtocolSession};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::connection::run_session;
use crate::application::dispatch::Dispatcher;

const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Error type for the listener.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Control centers allowed to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    centers: Vec<IpAddr>,
    allow_any: bool,
}

impl AllowList {
    /// Only the given addresses may connect.
    pub fn only(centers: Vec<IpAddr>) -> Self {
        Self {
            centers,
            allow_any: false,
        }
    }

    /// Test mode: anyone may connect.
    pub fn any() -> Self {
        Self {
            centers: Vec::new(),
            allow_any: true,
        }
    }

    pub fn permits(&self, ip: IpAddr) -> bool {
        self.allow_any || self.centers.contains(&ip.to_canonical())
    }
}

/// Per-session settings applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub address: AddressCheck,
    pub ack_timeout: Duration,
    pub assembly_gap: Duration,
}

/// Bound TCP listener for the device.
pub struct Listener {
    listener: TcpListener,
    allow: AllowList,
    dispatcher: Arc<Dispatcher>,
    events: Arc<dyn EventSink>,
    settings: SessionSettings,
}

impl Listener {
    /// Binds `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address is in use or not
    /// permitted.
    pub async fn bind(
        addr: SocketAddr,
        allow: AllowList,
        dispatcher: Arc<Dispatcher>,
        events: Arc<dyn EventSink>,
        settings: SessionSettings,
    ) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        Ok(Self {
            listener,
            allow,
            dispatcher,
            events,
            settings,
        })
    }

    /// The address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Io`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Accept errors are logged and the loop continues, so this only returns
    /// `Ok(())` today; the `Result` leaves room for fatal listener errors.
    pub async fn run(self, running: Arc<AtomicBool>) -> Result<(), NetworkError> {
        info!(addr = ?self.listener.local_addr().ok(), "listening for control centers");

        while running.load(Ordering::Relaxed) {
            let (stream, peer) = match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok(accepted)) => accepted,
                Ok(Err(e)) => {
                    error!("accept error: {e}");
                    continue;
                }
                Err(_) => continue,
            };

            if !self.allow.permits(peer.ip()) {
                warn!(%peer, "connection from address not on allow-list; dropped");
                drop(stream);
                continue;
            }

            let conn_id = Uuid::new_v4();
            let session = ProtocolSession::new(Arc::clone(&self.dispatcher), Arc::clone(&self.events))
                .with_address_check(self.settings.address)
                .with_ack_timeout(self.settings.ack_timeout);
            let gap = self.settings.assembly_gap;
            let span = info_span!("connection", id = %conn_id, %peer);

            tokio::spawn(
                async move {
                    info!("control center connected");
                    match run_session(stream, session, gap).await {
                        Ok(()) => info!("session closed"),
                        Err(e) => warn!("session ended with error: {e}"),
                    }
                }
                .instrument(span),
            );
        }

        info!("shutdown flag set; stopping accept loop");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_permits_listed_address_only() {
        // Arrange
        let allow = AllowList::only(vec!["10.0.0.5".parse().unwrap()]);

        // Act / Assert
        assert!(allow.permits("10.0.0.5".parse().unwrap()));
        assert!(!allow.permits("10.0.0.6".parse().unwrap()));
    }

    #[test]
    fn test_allow_list_accepts_ipv4_mapped_peer() {
        let allow = AllowList::only(vec!["127.0.0.1".parse().unwrap()]);
        assert!(allow.permits("::ffff:127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_allow_any_permits_everyone() {
        let allow = AllowList::any();
        assert!(allow.permits("192.168.100.200".parse().unwrap()));
        assert!(allow.permits("::1".parse().unwrap()));
    }

    #[test]
    fn test_empty_allow_list_permits_nobody() {
        assert!(!AllowList::only(Vec::new()).permits("127.0.0.1".parse().unwrap()));
    }
}
