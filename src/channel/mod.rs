//! Inbound channels
//!
//! The unreliable datagram loop (registration, status) and the reliable
//! stream listener with its per-connection workers (registration, chat).

pub mod datagram;
pub mod stream;

pub use datagram::DatagramChannel;
pub use stream::{ConnectionHandler, StreamChannel};
