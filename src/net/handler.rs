//! Datagram handler module
//!
//! Runs the receive loop:
//! - Reads one datagram at a time from the UDP transport
//! - Rejects oversized or empty payloads
//! - Hands each command line to the dispatcher
//! - Sends every resulting message (fire-and-forget, fragmented)
//! - Stops on the shutdown broadcast

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::config::MAX_UDP_PAYLOAD;
use crate::error::NetworkError;
use crate::net::dispatcher::{Dispatcher, Outbound};
use crate::net::transport::UdpTransport;
use crate::AppState;

/// Receive loop for one UDP socket
pub struct DatagramHandler {
    /// Shared application state
    state: Arc<AppState>,
    transport: UdpTransport,
    dispatcher: Dispatcher,
}

impl DatagramHandler {
    /// Create a new handler
    pub fn new(state: Arc<AppState>, transport: UdpTransport) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&state.world));
        Self {
            state,
            transport,
            dispatcher,
        }
    }

    /// Local address of the socket
    pub fn local_addr(&self) -> crate::error::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Receive until shutdown is signalled
    pub async fn run(&self, shutdown_rx: &mut broadcast::Receiver<()>) {
        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];

        loop {
            let (n, from) = tokio::select! {
                result = self.transport.recv(&mut buf) => {
                    match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!(error = %e, "Failed to receive datagram");
                            continue;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Datagram handler shutting down");
                    break;
                }
            };

            self.handle_datagram(&buf[..n], from).await;
        }
    }

    /// Process one datagram
    pub async fn handle_datagram(&self, payload: &[u8], from: SocketAddr) {
        let max = self.state.config.max_payload_bytes;
        if payload.len() > max {
            let error = NetworkError::PayloadTooLarge {
                size: payload.len(),
                max,
            };
            warn!(address = %from, error = %error, "Dropping oversized datagram");
            self.send(&[Outbound::new(from, error.to_string())]).await;
            return;
        }

        let text = String::from_utf8_lossy(payload);
        trace!(address = %from, bytes = payload.len(), "Datagram received");

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let outbound = self.dispatcher.dispatch(from, line);
            self.send(&outbound).await;
        }
    }

    async fn send(&self, outbound: &[Outbound]) {
        for message in outbound {
            match self.transport.send_text(message.to, &message.text).await {
                Ok(fragments) => {
                    debug!(to = %message.to, fragments, "Reply sent");
                }
                Err(e) => {
                    warn!(to = %message.to, error = %e, "Failed to send reply");
                }
            }
        }
    }
}
