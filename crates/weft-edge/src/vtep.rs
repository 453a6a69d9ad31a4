//! Virtual tunnel endpoint
//!
//! The tunnel device (TUN/TAP) the local host's traffic enters the overlay
//! through. Device I/O lives outside this crate; [`TunnelEndpoint`] is the
//! seam the forwarding loop drives, and [`LoopbackTunnel`] an in-process
//! implementation for tests.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::EdgeError;

/// The tunnel device seam driven by the forwarding loop
#[async_trait]
pub trait TunnelEndpoint: Send + Sync + 'static {
    /// Next frame read from the device; `None` once the endpoint is closed.
    async fn recv(&self) -> Option<Bytes>;

    /// Deliver a frame to the local host.
    async fn send(&self, frame: Bytes) -> Result<(), EdgeError>;

    /// Close the endpoint; pending and future `recv` calls return `None`.
    fn close(&self);
}

/// In-process tunnel endpoint for tests and simulation
pub struct LoopbackTunnel {
    ingress_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    ingress_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
    delivered: Mutex<Vec<Bytes>>,
}

impl LoopbackTunnel {
    /// Create an open tunnel
    pub fn new() -> Self {
        let (ingress_tx, ingress_rx) = mpsc::unbounded_channel();
        Self {
            ingress_tx: Mutex::new(Some(ingress_tx)),
            ingress_rx: tokio::sync::Mutex::new(ingress_rx),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Inject a frame as if the local host wrote it to the device
    ///
    /// Silently dropped once the tunnel is closed.
    pub fn inject(&self, frame: Bytes) {
        if let Some(tx) = self.ingress_tx.lock().as_ref() {
            let _ = tx.send(frame);
        }
    }

    /// Frames delivered to the local host so far
    pub fn delivered(&self) -> Vec<Bytes> {
        self.delivered.lock().clone()
    }

    /// Whether the tunnel has been closed
    pub fn is_closed(&self) -> bool {
        self.ingress_tx.lock().is_none()
    }
}

impl Default for LoopbackTunnel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelEndpoint for LoopbackTunnel {
    async fn recv(&self) -> Option<Bytes> {
        self.ingress_rx.lock().await.recv().await
    }

    async fn send(&self, frame: Bytes) -> Result<(), EdgeError> {
        if self.is_closed() {
            return Err(EdgeError::TunnelClosed);
        }
        self.delivered.lock().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.ingress_tx.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_returns_none_after_close() {
        let tunnel = LoopbackTunnel::new();
        tunnel.inject(Bytes::from_static(b"one"));
        assert_eq!(tunnel.recv().await.unwrap().as_ref(), b"one");

        tunnel.close();
        assert!(tunnel.recv().await.is_none());
        assert!(tunnel.is_closed());
        assert!(tunnel.send(Bytes::from_static(b"two")).await.is_err());
    }
}
