//! Module `handle`
//!
//! A held connection handle for a stream client. The registry, the broadcast
//! engine, and the connection's own worker all share one handle; closing it
//! from any of them shuts the writer down and wakes the worker.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

use crate::error::DeliveryError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct HandleInner {
    writer: Mutex<BoxedWriter>,
    closed: AtomicBool,
    close_signal: Notify,
}

/// Cloneable handle to the write side of a stream connection.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<HandleInner>,
}

impl StreamHandle {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(HandleInner {
                writer: Mutex::new(Box::new(writer)),
                closed: AtomicBool::new(false),
                close_signal: Notify::new(),
            }),
        }
    }

    /// Writes one already-encoded frame and flushes it.
    ///
    /// Concurrent senders are serialised so frames never interleave.
    pub async fn send(&self, frame: &[u8]) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        let mut writer = self.inner.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Closes the connection. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.close_signal.notify_waiters();
        let mut writer = self.inner.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Resolves once the handle has been closed.
    pub async fn closed(&self) {
        let notified = self.inner.close_signal.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}
