//! Transport module
//!
//! UDP socket wrapper used by the receive loop. Outbound text longer than the
//! configured payload ceiling is split into ordered fragments, each sent as
//! its own datagram to the same address.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::{NetworkError, Result, ServerError};

/// Smallest ceiling `fragment` honors, enough for any UTF-8 character
const MIN_FRAGMENT: usize = 4;

/// Split `text` into pieces of at most `max` bytes.
///
/// Cuts fall on UTF-8 character boundaries and, where the window contains
/// one, just after the last newline. Empty text yields one empty fragment.
pub fn fragment(text: &str, max: usize) -> Vec<&str> {
    let max = max.max(MIN_FRAGMENT);
    let mut fragments = Vec::with_capacity(text.len() / max + 1);
    let mut rest = text;

    while rest.len() > max {
        let mut cut = max;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if let Some(newline) = rest[..cut].rfind('\n') {
            if newline > 0 {
                cut = newline + 1;
            }
        }

        let (head, tail) = rest.split_at(cut);
        fragments.push(head);
        rest = tail;
    }

    fragments.push(rest);
    fragments
}

/// Datagram transport bound to one local address
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    max_payload: usize,
}

impl UdpTransport {
    /// Bind a new socket
    pub async fn bind(address: SocketAddr, max_payload: usize) -> Result<Self> {
        let socket = UdpSocket::bind(address).await.map_err(|e| {
            ServerError::Network(NetworkError::Bind {
                address: address.to_string(),
                reason: e.to_string(),
            })
        })?;
        Ok(Self::from_socket(Arc::new(socket), max_payload))
    }

    /// Wrap an existing socket
    pub fn from_socket(socket: Arc<UdpSocket>, max_payload: usize) -> Self {
        Self {
            socket,
            max_payload,
        }
    }

    /// Payload ceiling in bytes
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive one datagram
    pub async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket
            .recv_from(buf)
            .await
            .map_err(|e| ServerError::Network(NetworkError::ReadError(e.to_string())))
    }

    /// Send `text` to `to`, fragmenting as needed. Returns the datagram count.
    pub async fn send_text(&self, to: SocketAddr, text: &str) -> Result<usize> {
        let fragments = fragment(text, self.max_payload);
        for piece in &fragments {
            self.socket
                .send_to(piece.as_bytes(), to)
                .await
                .map_err(|e| ServerError::Network(NetworkError::WriteError(e.to_string())))?;
        }

        trace!(
            to = %to,
            bytes = text.len(),
            fragments = fragments.len(),
            "Sent text"
        );

        Ok(fragments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_fragment() {
        assert_eq!(fragment("hello", 512), vec!["hello"]);
        assert_eq!(fragment("", 512), vec![""]);
    }

    #[test]
    fn test_fragments_respect_ceiling_and_order() {
        let text = "x".repeat(1300);
        let pieces = fragment(&text, 512);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.len() <= 512));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_fragments_never_split_characters() {
        // 3-byte characters do not divide 64 evenly
        let text = "é€".repeat(50);
        let pieces = fragment(&text, 64);
        assert!(pieces.iter().all(|p| p.len() <= 64));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_fragments_prefer_line_breaks() {
        let text = format!("{}\n{}", "a".repeat(40), "b".repeat(40));
        let pieces = fragment(&text, 64);
        assert_eq!(pieces[0], format!("{}\n", "a".repeat(40)));
        assert_eq!(pieces[1], "b".repeat(40));
    }

    #[tokio::test]
    async fn test_send_text_fragments_over_loopback() {
        let server = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), 64)
            .await
            .unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        let text = "z".repeat(100);
        assert_eq!(server.send_text(client_addr, &text).await.unwrap(), 2);

        let mut buf = [0u8; 128];
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 64);
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 36);
    }
}
