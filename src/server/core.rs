use log::{error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};

use crate::broadcast::BroadcastEngine;
use crate::channel::{ConnectionHandler, DatagramChannel, StreamChannel};
use crate::client::{ClientRegistry, PeerHandle};
use crate::config::RelayConfig;
use crate::error::RelayError;

/// The relay: both channel loops plus the registry they share.
pub struct Server {
    registry: ClientRegistry,
    datagram: DatagramChannel,
    stream: StreamChannel,
    datagram_addr: SocketAddr,
    stream_addr: SocketAddr,
}

impl Server {
    /// Binds the datagram socket and the stream listener described by `config`.
    ///
    /// Fails with [`RelayError::Config`] before binding anything when the
    /// stream port cannot be derived from the datagram port.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let datagram_socket = config.datagram_socket();
        let stream_socket = config.stream_socket()?;

        let socket = UdpSocket::bind(&datagram_socket)
            .await
            .map_err(|e| RelayError::Bind(datagram_socket.clone(), e))?;

        let listener = TcpListener::bind(&stream_socket)
            .await
            .map_err(|e| RelayError::Bind(stream_socket.clone(), e))?;

        let datagram_addr = socket.local_addr()?;
        let stream_addr = listener.local_addr()?;
        info!("Datagram channel listening on {}", datagram_addr);
        info!("Stream channel listening on {}", stream_addr);

        let registry = ClientRegistry::new();
        let socket = Arc::new(socket);
        let engine = Arc::new(BroadcastEngine::new(
            registry.clone(),
            Arc::clone(&socket),
            config.delivery_timeout(),
        ));

        let datagram = DatagramChannel::new(socket, registry.clone(), Arc::clone(&engine), &config);
        let handler = ConnectionHandler::new(registry.clone(), engine, &config);
        let stream = StreamChannel::new(listener, handler);

        Ok(Self {
            registry,
            datagram,
            stream,
            datagram_addr,
            stream_addr,
        })
    }

    pub fn datagram_addr(&self) -> SocketAddr {
        self.datagram_addr
    }

    pub fn stream_addr(&self) -> SocketAddr {
        self.stream_addr
    }

    /// Shared handle to the live registry.
    pub fn registry(&self) -> ClientRegistry {
        self.registry.clone()
    }

    /// Runs both loops until one fails or `shutdown` resolves.
    ///
    /// On return every connection worker has been aborted and every held
    /// stream connection closed.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send,
    {
        let loops = async {
            tokio::select! {
                result = self.datagram.run() => result,
                result = self.stream.run() => result,
            }
        };
        supervise(&self.registry, loops, shutdown).await
    }

    pub async fn run_until_ctrl_c(self) -> Result<(), RelayError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl-C handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

/// Waits for the first of `loops` and `shutdown`, then releases every client.
async fn supervise<L, F>(registry: &ClientRegistry, loops: L, shutdown: F) -> Result<(), RelayError>
where
    L: Future<Output = Result<(), RelayError>>,
    F: Future<Output = ()>,
{
    // The loops are dropped with this block, aborting every connection worker.
    let result = {
        tokio::pin!(loops);
        tokio::pin!(shutdown);
        tokio::select! {
            result = &mut loops => result,
            _ = &mut shutdown => {
                info!("Shutting down relay...");
                Ok(())
            }
        }
    };

    if let Err(e) = &result {
        error!("Relay stopping after fatal error: {}", e);
    }
    release_clients(registry).await;
    result
}

async fn release_clients(registry: &ClientRegistry) {
    let records = registry.drain().await;
    let count = records.len();
    for record in records {
        if let PeerHandle::Stream(handle) = record.peer() {
            handle.close().await;
        }
    }
    info!("Released {} registered clients", count);
}
