//! Metadata network client
//!
//! The metadata network is the gossip-backed membership layer every overlay
//! network runs on. It lives outside this crate; the [`MetaNet`] trait is
//! the slice of it the edge router consumes: the local peer handle,
//! membership events, raw frame exchange, and transactional access to the
//! local endpoint advertisement.
//!
//! [`MemoryMetaNet`] is an in-process implementation used by tests and the
//! simulator.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use weft_core::{Endpoint, PeerHandle};
use weft_gossip::{EndpointsSyncerV1, EndpointsTxn, KeyValue, DEFAULT_ENDPOINT_KEY};

use crate::error::EdgeError;

/// A membership change observed by the metadata network
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// The peer became reachable.
    Join(PeerHandle),
    /// The peer left or was declared failed.
    Leave(PeerHandle),
}

/// The slice of the metadata network the edge router consumes
#[async_trait]
pub trait MetaNet: Send + Sync + 'static {
    /// Handle of the local node.
    fn local_peer(&self) -> PeerHandle;

    /// Register seed endpoints to join the mesh through.
    fn seed_endpoints(&self, endpoints: Vec<Endpoint>) -> Result<(), EdgeError>;

    /// Run an edit over the local endpoint advertisement
    ///
    /// The edit is committed iff the transaction reports an update. Returns
    /// whether a commit happened.
    fn endpoint_txn(&self, edit: &mut dyn FnMut(&mut EndpointsTxn)) -> Result<bool, EdgeError>;

    /// Next membership event; `None` once the metadata network stops.
    async fn next_peer_event(&self) -> Option<PeerEvent>;

    /// Next raw frame received from a remote peer; `None` once stopped.
    async fn recv_frame(&self) -> Option<(PeerHandle, Bytes)>;

    /// Ship a raw frame to a peer over its preferred transport.
    async fn send_frame(&self, peer: &PeerHandle, frame: Bytes) -> Result<(), EdgeError>;
}

/// In-process metadata network for tests and simulation
pub struct MemoryMetaNet {
    local: PeerHandle,
    record: Mutex<KeyValue>,
    seeds: Mutex<Vec<Endpoint>>,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
    peer_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PeerEvent>>,
    frame_tx: mpsc::UnboundedSender<(PeerHandle, Bytes)>,
    frame_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(PeerHandle, Bytes)>>,
    shipped: Mutex<Vec<(PeerHandle, Bytes)>>,
}

impl MemoryMetaNet {
    /// Create a metadata network around the given local peer
    pub fn new(local: PeerHandle) -> Self {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        Self {
            local,
            record: Mutex::new(KeyValue::new(DEFAULT_ENDPOINT_KEY, String::new())),
            seeds: Mutex::new(Vec::new()),
            peer_tx,
            peer_rx: tokio::sync::Mutex::new(peer_rx),
            frame_tx,
            frame_rx: tokio::sync::Mutex::new(frame_rx),
            shipped: Mutex::new(Vec::new()),
        }
    }

    /// Announce a membership event to the edge router
    pub fn announce(&self, event: PeerEvent) {
        let _ = self.peer_tx.send(event);
    }

    /// Deliver a raw frame as if received from `from`
    pub fn inject_frame(&self, from: PeerHandle, frame: Bytes) {
        let _ = self.frame_tx.send((from, frame));
    }

    /// Frames shipped out so far, in order
    pub fn shipped_frames(&self) -> Vec<(PeerHandle, Bytes)> {
        self.shipped.lock().clone()
    }

    /// Seed endpoints registered so far
    pub fn seeded(&self) -> Vec<Endpoint> {
        self.seeds.lock().clone()
    }

    /// Current raw value of the local endpoint advertisement
    pub fn advertisement(&self) -> String {
        self.record.lock().value.clone()
    }
}

#[async_trait]
impl MetaNet for MemoryMetaNet {
    fn local_peer(&self) -> PeerHandle {
        self.local.clone()
    }

    fn seed_endpoints(&self, endpoints: Vec<Endpoint>) -> Result<(), EdgeError> {
        let mut seeds = self.seeds.lock();
        for endpoint in endpoints {
            if !seeds.contains(&endpoint) {
                seeds.push(endpoint);
            }
        }
        Ok(())
    }

    fn endpoint_txn(&self, edit: &mut dyn FnMut(&mut EndpointsTxn)) -> Result<bool, EdgeError> {
        let mut record = self.record.lock();
        let mut txn = EndpointsSyncerV1.txn(&record)?;
        edit(&mut txn);
        if !txn.updated() {
            return Ok(false);
        }
        record.value = txn.after();
        Ok(true)
    }

    async fn next_peer_event(&self) -> Option<PeerEvent> {
        self.peer_rx.lock().await.recv().await
    }

    async fn recv_frame(&self) -> Option<(PeerHandle, Bytes)> {
        self.frame_rx.lock().await.recv().await
    }

    async fn send_frame(&self, peer: &PeerHandle, frame: Bytes) -> Result<(), EdgeError> {
        self.shipped.lock().push((peer.clone(), frame));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{EndpointFamily, SimPeer};

    #[tokio::test]
    async fn test_events_and_frames_flow_through() {
        let net = MemoryMetaNet::new(SimPeer::local("self"));
        let b = SimPeer::remote("b");

        net.announce(PeerEvent::Join(b.clone()));
        match net.next_peer_event().await {
            Some(PeerEvent::Join(p)) => assert_eq!(p.hash_id(), "b"),
            other => panic!("unexpected event: {other:?}"),
        }

        net.inject_frame(b.clone(), Bytes::from_static(b"frame"));
        let (from, frame) = net.recv_frame().await.unwrap();
        assert_eq!(from.hash_id(), "b");
        assert_eq!(frame.as_ref(), b"frame");
    }

    #[test]
    fn test_endpoint_txn_commits_only_updates() {
        let net = MemoryMetaNet::new(SimPeer::local("self"));

        let committed = net
            .endpoint_txn(&mut |txn| {
                txn.add_endpoints(&[Endpoint::new(EndpointFamily::UDP, "203.0.113.7:3880")]);
            })
            .unwrap();
        assert!(committed);
        assert!(net.advertisement().contains("203.0.113.7:3880"));

        // Re-adding the same endpoint is not an update.
        let committed = net
            .endpoint_txn(&mut |txn| {
                txn.add_endpoints(&[Endpoint::new(EndpointFamily::UDP, "203.0.113.7:3880")]);
            })
            .unwrap();
        assert!(!committed);
    }
}
