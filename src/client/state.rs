//! Module `state`
//!
//! Defines the identity and record kept for every registered
//! participant-transport pairing.

use std::fmt;
use std::net::SocketAddr;

use crate::client::StreamHandle;

/// Status assigned at registration.
pub const DEFAULT_STATUS: &str = "online";

/// Transport a client registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Datagram,
    Stream,
}

/// Selects which records a snapshot returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFilter {
    Only(Protocol),
    Any,
}

impl ProtocolFilter {
    pub fn matches(&self, protocol: Protocol) -> bool {
        match self {
            ProtocolFilter::Only(wanted) => *wanted == protocol,
            ProtocolFilter::Any => true,
        }
    }
}

/// Identity of a connection: transport kind plus peer address.
///
/// Usernames are display labels only; two records may share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey {
    protocol: Protocol,
    addr: SocketAddr,
}

impl ClientKey {
    pub fn datagram(addr: SocketAddr) -> Self {
        Self {
            protocol: Protocol::Datagram,
            addr,
        }
    }

    pub fn stream(addr: SocketAddr) -> Self {
        Self {
            protocol: Protocol::Stream,
            addr,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Datagram => write!(f, "udp_{}", self.addr),
            Protocol::Stream => write!(f, "tcp_{}", self.addr),
        }
    }
}

/// Where deliveries to a client go.
#[derive(Debug, Clone)]
pub enum PeerHandle {
    /// Reverse address for send-to delivery
    Datagram(SocketAddr),
    /// Held connection, written to directly
    Stream(StreamHandle),
}

/// One registered participant on one transport.
///
/// The protocol is fixed by the key at construction and cannot change.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    key: ClientKey,
    username: String,
    status: String,
    peer: PeerHandle,
}

impl ClientRecord {
    /// Record for a client registered over the unreliable channel.
    pub fn datagram(addr: SocketAddr, username: impl Into<String>) -> Self {
        Self {
            key: ClientKey::datagram(addr),
            username: username.into(),
            status: DEFAULT_STATUS.to_string(),
            peer: PeerHandle::Datagram(addr),
        }
    }

    /// Record for a client registered over the reliable channel, holding its connection.
    pub fn stream(addr: SocketAddr, username: impl Into<String>, handle: StreamHandle) -> Self {
        Self {
            key: ClientKey::stream(addr),
            username: username.into(),
            status: DEFAULT_STATUS.to_string(),
            peer: PeerHandle::Stream(handle),
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn key(&self) -> &ClientKey {
        &self.key
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn protocol(&self) -> Protocol {
        self.key.protocol()
    }

    pub fn peer(&self) -> &PeerHandle {
        &self.peer
    }

    // --------------------
    // Setter methods
    // --------------------

    /// Replaces the status wholesale.
    pub fn set_status(&mut self, status: String) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn keys_are_scoped_by_transport() {
        assert_ne!(ClientKey::datagram(addr(9000)), ClientKey::stream(addr(9000)));
        assert_eq!(ClientKey::datagram(addr(9000)).to_string(), "udp_127.0.0.1:9000");
        assert_eq!(ClientKey::stream(addr(9000)).to_string(), "tcp_127.0.0.1:9000");
    }

    #[test]
    fn new_records_start_online() {
        let record = ClientRecord::datagram(addr(9001), "alice");
        assert_eq!(record.status(), "online");
        assert_eq!(record.protocol(), Protocol::Datagram);
        assert!(matches!(record.peer(), PeerHandle::Datagram(a) if *a == addr(9001)));
    }

    #[test]
    fn filter_matching() {
        assert!(ProtocolFilter::Any.matches(Protocol::Stream));
        assert!(ProtocolFilter::Only(Protocol::Datagram).matches(Protocol::Datagram));
        assert!(!ProtocolFilter::Only(Protocol::Datagram).matches(Protocol::Stream));
    }
}
