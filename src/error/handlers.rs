//! Error handlers
//!
//! Provides error reporting and classification helpers.

use crate::error::types::RelayError;
use log::error;
use std::io;

/// Report a fatal relay error
pub fn handle_error(err: &RelayError) {
    error!("Relay error: {}", err);
}

/// Accept failures caused by one misbehaving peer rather than the listener itself
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Datagram receive failures that stem from ICMP feedback for an earlier send
pub fn is_transient_receive_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
