//! Network module
//!
//! Everything between the UDP socket and the game world:
//! - Transport (socket wrapper and payload fragmentation)
//! - Dispatcher (command routing under the world lock)
//! - Datagram handler (receive loop)

pub mod dispatcher;
pub mod handler;
pub mod transport;

pub use dispatcher::{Dispatcher, Outbound};
pub use handler::DatagramHandler;
pub use transport::UdpTransport;
