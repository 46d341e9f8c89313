//! Module `datagram`
//!
//! Owns the unreliable receive loop. One datagram is one frame. Bad frames
//! are logged and dropped; only a failure of the socket itself ends the loop.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::broadcast::BroadcastEngine;
use crate::client::{ClientKey, ClientRecord, ClientRegistry, Protocol, ProtocolFilter};
use crate::config::RelayConfig;
use crate::error::handlers::is_transient_receive_error;
use crate::error::{FrameError, RelayError};
use crate::protocol::{Frame, OutboundFrame, parse_frame, validate_username};

pub struct DatagramChannel {
    socket: Arc<UdpSocket>,
    registry: ClientRegistry,
    engine: Arc<BroadcastEngine>,
    buffer_size: usize,
    max_username_length: usize,
}

impl DatagramChannel {
    pub fn new(
        socket: Arc<UdpSocket>,
        registry: ClientRegistry,
        engine: Arc<BroadcastEngine>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            socket,
            registry,
            engine,
            buffer_size: config.datagram_buffer_size,
            max_username_length: config.max_username_length,
        }
    }

    /// Receives datagrams until the socket fails.
    pub async fn run(&self) -> Result<(), RelayError> {
        // One spare byte: a datagram that fills it was truncated by the kernel.
        let mut buf = vec![0u8; self.buffer_size + 1];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((n, from)) => self.handle_datagram(&buf[..n], from).await,
                Err(e) if is_transient_receive_error(&e) => {
                    warn!("Ignoring transient datagram receive error: {}", e);
                }
                Err(e) => return Err(RelayError::Receive(e)),
            }
        }
    }

    /// Processes one datagram received from `from`.
    ///
    /// Datagrams longer than the receive buffer are dropped whole.
    pub async fn handle_datagram(&self, data: &[u8], from: SocketAddr) {
        let key = ClientKey::datagram(from);

        if data.len() > self.buffer_size {
            warn!(
                "Dropping datagram from {}: {}",
                key,
                FrameError::TooLong(self.buffer_size)
            );
            return;
        }

        let raw = match std::str::from_utf8(data) {
            Ok(raw) => raw,
            Err(_) => {
                warn!("Dropping datagram from {}: {}", key, FrameError::InvalidUtf8);
                return;
            }
        };

        match parse_frame(raw) {
            Frame::Register { username } => self.register(key, username).await,
            Frame::Status { text } => self.update_status(&key, text).await,
            frame @ (Frame::Chat { .. } | Frame::Ascii { .. }) => {
                warn!(
                    "Dropping datagram from {}: {}",
                    key,
                    FrameError::WrongTransport(frame.tag())
                );
            }
            Frame::Malformed(e) => warn!("Dropping malformed datagram from {}: {}", key, e),
        }
    }

    async fn register(&self, key: ClientKey, username: String) {
        if let Err(e) = validate_username(&username, self.max_username_length) {
            warn!("Rejecting registration from {}: {}", key, e);
            return;
        }

        let replaced = self
            .registry
            .upsert(ClientRecord::datagram(key.addr(), username.clone()))
            .await;
        if replaced.is_some() {
            info!("Datagram client {} re-registered as {}", key, username);
        } else {
            info!("Datagram client registered for status updates: {} at {}", username, key);
        }
    }

    async fn update_status(&self, key: &ClientKey, text: String) {
        let Some(username) = self.registry.update_status(key, text.clone()).await else {
            debug!("Ignoring status from unregistered sender {}", key);
            return;
        };

        info!("Status update from {}: {}", username, text);
        let notice = OutboundFrame::Status { username, text };
        self.engine
            .fan_out(
                &notice,
                ProtocolFilter::Only(Protocol::Datagram),
                Some(key),
            )
            .await;
    }
}
