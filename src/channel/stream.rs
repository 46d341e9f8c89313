//! Module `stream`
//!
//! Owns the reliable listener. Every accepted connection gets its own worker
//! that reads newline-terminated frames until the peer disconnects, a read
//! fails, or the relay closes the connection after a failed delivery.

use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::broadcast::BroadcastEngine;
use crate::client::{ClientKey, ClientRecord, ClientRegistry, Protocol, ProtocolFilter, StreamHandle};
use crate::config::RelayConfig;
use crate::error::handlers::is_transient_accept_error;
use crate::error::{FrameError, ReadError, RelayError};
use crate::protocol::{Frame, FrameReader, OutboundFrame, parse_frame, validate_username};

/// Accept loop for the reliable channel.
pub struct StreamChannel {
    listener: TcpListener,
    handler: Arc<ConnectionHandler>,
}

impl StreamChannel {
    pub fn new(listener: TcpListener, handler: ConnectionHandler) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
        }
    }

    /// Accepts connections until the listener fails.
    ///
    /// Connection workers live in a `JoinSet` owned by this future; dropping
    /// the future aborts them all and releases their sockets.
    pub async fn run(&self) -> Result<(), RelayError> {
        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted stream connection from {}", peer);
                        let handler = Arc::clone(&self.handler);
                        workers.spawn(async move {
                            handler.handle_connection(stream, peer).await;
                        });
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        warn!("Error accepting connection: {}", e);
                    }
                    Err(e) => return Err(RelayError::Accept(e)),
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Connection worker panicked: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Per-connection worker logic, shared by every connection.
pub struct ConnectionHandler {
    registry: ClientRegistry,
    engine: Arc<BroadcastEngine>,
    max_frame_length: usize,
    max_username_length: usize,
}

impl ConnectionHandler {
    pub fn new(registry: ClientRegistry, engine: Arc<BroadcastEngine>, config: &RelayConfig) -> Self {
        Self {
            registry,
            engine,
            max_frame_length: config.max_frame_length,
            max_username_length: config.max_username_length,
        }
    }

    /// Serves one connection to completion, then deregisters it.
    pub async fn handle_connection<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let key = ClientKey::stream(peer);
        let (read_half, write_half) = tokio::io::split(stream);
        let handle = StreamHandle::new(write_half);
        let mut frames = FrameReader::new(read_half, self.max_frame_length);

        loop {
            let read = tokio::select! {
                _ = handle.closed() => {
                    info!("Connection {} closed by relay", key);
                    break;
                }
                read = frames.read_frame() => read,
            };

            match read {
                Ok(Some(raw)) => self.handle_frame(&key, &handle, &raw).await,
                Ok(None) => {
                    info!("Connection closed by client {}", key);
                    break;
                }
                Err(ReadError::Malformed(e)) => {
                    warn!("Dropping malformed frame from {}: {}", key, e);
                }
                Err(ReadError::Io(e)) => {
                    warn!("Failed to read from {}: {}", key, e);
                    break;
                }
            }
        }

        handle.close().await;
        if let Some(record) = self.registry.remove(&key).await {
            info!("Stream client {} ({}) disconnected", key, record.username());
        }
    }

    async fn handle_frame(&self, key: &ClientKey, handle: &StreamHandle, raw: &str) {
        match parse_frame(raw) {
            Frame::Register { username } => self.register(key, handle, username).await,
            Frame::Chat { username, message } => {
                self.relay(key, OutboundFrame::Chat { username, message }).await;
            }
            Frame::Ascii { payload } => self.relay(key, OutboundFrame::Raw(payload)).await,
            frame @ Frame::Status { .. } => {
                warn!(
                    "Dropping frame from {}: {}",
                    key,
                    FrameError::WrongTransport(frame.tag())
                );
            }
            Frame::Malformed(e) => warn!("Dropping malformed frame from {}: {}", key, e),
        }
    }

    async fn register(&self, key: &ClientKey, handle: &StreamHandle, username: String) {
        if let Err(e) = validate_username(&username, self.max_username_length) {
            warn!("Rejecting registration from {}: {}", key, e);
            return;
        }

        let record = ClientRecord::stream(key.addr(), username.clone(), handle.clone());
        if self.registry.upsert(record).await.is_some() {
            info!("Stream client {} re-registered as {}", key, username);
        } else {
            info!("Stream client registered for chat: {} at {}", username, key);
        }
    }

    /// Fans a frame out to every other stream client, if the sender is registered.
    async fn relay(&self, key: &ClientKey, message: OutboundFrame) {
        if !self.registry.contains(key).await {
            debug!("Ignoring frame from unregistered sender {}", key);
            return;
        }

        let report = self
            .engine
            .fan_out(&message, ProtocolFilter::Only(Protocol::Stream), Some(key))
            .await;
        debug!(
            "Relayed frame from {} to {}/{} peers",
            key, report.delivered, report.attempted
        );
    }
}
