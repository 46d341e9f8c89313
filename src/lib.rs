//! Presence relay
//!
//! Accepts registrations and status updates over UDP and chat over TCP,
//! keeps a live directory of connected participants, and fans messages out
//! to the right subset of them.

pub mod broadcast;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use config::RelayConfig;
pub use server::Server;
