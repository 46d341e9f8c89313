//! Module `engine`
//!
//! Fan-out over an immutable registry snapshot. Each recipient is tried
//! exactly once; a failure removes that recipient and moves on. There are
//! no retries.
//!
//! Datagram sends never wait on the peer and go out in turn. Stream sends
//! run concurrently, each bounded by the delivery timeout, so one stalled
//! peer costs the sender at most one timeout per fan-out.

use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinSet;

use crate::broadcast::FanOutReport;
use crate::client::{ClientKey, ClientRecord, ClientRegistry, PeerHandle, ProtocolFilter, StreamHandle};
use crate::error::DeliveryError;
use crate::protocol::OutboundFrame;

/// Shared fan-out service used by both channels.
pub struct BroadcastEngine {
    registry: ClientRegistry,
    socket: Arc<UdpSocket>,
    delivery_timeout: Duration,
}

impl BroadcastEngine {
    /// `socket` is the relay's datagram socket; datagram peers are sent to from it.
    pub fn new(registry: ClientRegistry, socket: Arc<UdpSocket>, delivery_timeout: Duration) -> Self {
        Self {
            registry,
            socket,
            delivery_timeout,
        }
    }

    /// Delivers `message` to every record matching `filter` except `exclude`.
    ///
    /// Recipients registered after the snapshot is taken are not included.
    /// Returns once every attempt has succeeded, failed, or timed out.
    pub async fn fan_out(
        &self,
        message: &OutboundFrame,
        filter: ProtocolFilter,
        exclude: Option<&ClientKey>,
    ) -> FanOutReport {
        let recipients = self.registry.snapshot(filter).await;
        let datagram = message.to_datagram();
        let stream_frame: Arc<[u8]> = message.to_stream_frame().into();
        let mut report = FanOutReport::default();
        let mut pending = JoinSet::new();

        for record in recipients {
            if Some(record.key()) == exclude {
                continue;
            }
            report.attempted += 1;

            let handle = match record.peer() {
                PeerHandle::Datagram(addr) => {
                    let result = self.socket.send_to(&datagram, *addr).await;
                    match result {
                        Ok(_) => report.delivered += 1,
                        Err(e) => self.record_failure(&record, e.into(), &mut report).await,
                    }
                    continue;
                }
                PeerHandle::Stream(handle) => handle.clone(),
            };

            let frame = Arc::clone(&stream_frame);
            let timeout = self.delivery_timeout;
            pending.spawn(async move {
                let result = send_with_timeout(&handle, &frame, timeout).await;
                (record, result)
            });
        }

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.delivered += 1,
                Ok((record, Err(e))) => self.record_failure(&record, e, &mut report).await,
                Err(e) => error!("Delivery task failed: {}", e),
            }
        }

        debug!(
            "Fan-out delivered {}/{} ({} pruned)",
            report.delivered,
            report.attempted,
            report.failed.len()
        );
        report
    }

    async fn record_failure(
        &self,
        record: &ClientRecord,
        err: DeliveryError,
        report: &mut FanOutReport,
    ) {
        warn!("Error sending to {}: {}", record.key(), err);
        self.evict(record).await;
        report.failed.push(*record.key());
    }

    async fn evict(&self, record: &ClientRecord) {
        self.registry.remove(record.key()).await;
        if let PeerHandle::Stream(handle) = record.peer() {
            handle.close().await;
        }
        warn!(
            "Removed unreachable client {} ({})",
            record.key(),
            record.username()
        );
    }
}

async fn send_with_timeout(
    handle: &StreamHandle,
    frame: &[u8],
    timeout: Duration,
) -> Result<(), DeliveryError> {
    match tokio::time::timeout(timeout, handle.send(frame)).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::TimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Protocol, StreamHandle};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn engine(registry: &ClientRegistry, timeout_ms: u64) -> BroadcastEngine {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        BroadcastEngine::new(
            registry.clone(),
            Arc::new(socket),
            Duration::from_millis(timeout_ms),
        )
    }

    async fn register_stream(
        registry: &ClientRegistry,
        port: u16,
        username: &str,
    ) -> (ClientKey, DuplexStream) {
        let (writer, reader) = tokio::io::duplex(1024);
        registry
            .upsert(ClientRecord::stream(
                addr(port),
                username,
                StreamHandle::new(writer),
            ))
            .await;
        (ClientKey::stream(addr(port)), reader)
    }

    fn chat(message: &str) -> OutboundFrame {
        OutboundFrame::Chat {
            username: "alice".into(),
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn chat_reaches_everyone_but_sender() {
        let registry = ClientRegistry::new();
        let engine = engine(&registry, 500).await;
        let (alice, mut alice_rx) = register_stream(&registry, 5001, "alice").await;
        let (_bob, mut bob_rx) = register_stream(&registry, 5002, "bob").await;
        let (_carol, mut carol_rx) = register_stream(&registry, 5003, "carol").await;

        let report = engine
            .fan_out(
                &chat("hi"),
                ProtocolFilter::Only(Protocol::Stream),
                Some(&alice),
            )
            .await;
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);
        assert!(report.is_complete());

        for rx in [&mut bob_rx, &mut carol_rx] {
            let mut buf = vec![0u8; 14];
            rx.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"CHAT:alice:hi\n");
        }

        let nothing = tokio::time::timeout(Duration::from_millis(50), alice_rx.read_u8()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn failed_recipient_is_pruned_without_aborting() {
        let registry = ClientRegistry::new();
        let engine = engine(&registry, 500).await;
        let (alice, _alice_rx) = register_stream(&registry, 5011, "alice").await;
        let (bob, bob_rx) = register_stream(&registry, 5012, "bob").await;
        let (_carol, mut carol_rx) = register_stream(&registry, 5013, "carol").await;
        drop(bob_rx);

        let report = engine
            .fan_out(
                &chat("still there?"),
                ProtocolFilter::Only(Protocol::Stream),
                Some(&alice),
            )
            .await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![bob]);
        assert!(!registry.contains(&bob).await);

        let expected = b"CHAT:alice:still there?\n";
        let mut buf = vec![0u8; expected.len()];
        carol_rx.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, expected);

        // The pruned client is gone from later fan-outs.
        let report = engine
            .fan_out(
                &chat("again"),
                ProtocolFilter::Only(Protocol::Stream),
                Some(&alice),
            )
            .await;
        assert_eq!(report.attempted, 1);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn stalled_recipient_times_out_and_is_closed() {
        let registry = ClientRegistry::new();
        let engine = engine(&registry, 50).await;
        let (writer, _reader) = tokio::io::duplex(4);
        let handle = StreamHandle::new(writer);
        registry
            .upsert(ClientRecord::stream(addr(5021), "slow", handle.clone()))
            .await;

        let report = engine
            .fan_out(&chat("a long message"), ProtocolFilter::Any, None)
            .await;

        assert_eq!(report.failed, vec![ClientKey::stream(addr(5021))]);
        assert!(handle.is_closed());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn status_goes_to_datagram_peers_only() {
        let registry = ClientRegistry::new();
        let engine = engine(&registry, 500).await;

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        registry.upsert(ClientRecord::datagram(peer_addr, "carol")).await;
        let sender = addr(5031);
        registry.upsert(ClientRecord::datagram(sender, "alice")).await;
        let (_bob, mut bob_rx) = register_stream(&registry, 5032, "bob").await;

        let status = OutboundFrame::Status {
            username: "alice".into(),
            text: "away".into(),
        };
        let report = engine
            .fan_out(
                &status,
                ProtocolFilter::Only(Protocol::Datagram),
                Some(&ClientKey::datagram(sender)),
            )
            .await;
        assert_eq!(report.attempted, 1);

        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(Duration::from_secs(1), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"STATUS:alice:away");

        let nothing = tokio::time::timeout(Duration::from_millis(50), bob_rx.read_u8()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn stalled_recipients_time_out_concurrently() {
        let registry = ClientRegistry::new();
        let engine = engine(&registry, 200).await;
        let mut stalled = Vec::new();
        for port in 5041..5044u16 {
            let (writer, reader) = tokio::io::duplex(4);
            stalled.push(reader);
            registry
                .upsert(ClientRecord::stream(addr(port), "slow", StreamHandle::new(writer)))
                .await;
        }
        let (_carol, mut carol_rx) = register_stream(&registry, 5045, "carol").await;

        let started = tokio::time::Instant::now();
        let report = engine
            .fan_out(&chat("a long message"), ProtocolFilter::Any, None)
            .await;
        let elapsed = started.elapsed();

        // Three stalled peers in turn would take 600ms.
        assert!(elapsed < Duration::from_millis(450), "took {elapsed:?}");
        assert_eq!(report.attempted, 4);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed.len(), 3);
        assert_eq!(registry.len().await, 1);

        let expected = b"CHAT:alice:a long message\n";
        let mut buf = vec![0u8; expected.len()];
        carol_rx.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, expected);
    }
}
