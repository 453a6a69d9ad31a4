//! Peer identity abstractions
//!
//! This module provides the [`MeshPeer`] trait that abstracts over peer
//! implementations. The routing engine only needs two capabilities from a
//! peer: a stable opaque identifier and a local/remote flag. Production
//! peers are membership records owned by the metadata network; tests use
//! [`SimPeer`].
//!
//! Peers travel through the core as [`PeerHandle`] (`Arc<dyn MeshPeer>`).
//! Two handles with equal [`MeshPeer::hash_id`] denote the same logical
//! peer, but membership guards compare *handles* (see [`same_peer`]) so a
//! stale notification carrying an old handle cannot evict a newer one that
//! reuses the same identifier.

use std::fmt::Debug;
use std::sync::Arc;

/// Trait for peer identity abstraction
///
/// Implementations must keep `hash_id` stable for the lifetime of the
/// handle. An empty `hash_id` marks an invalid peer and is rejected by all
/// membership operations.
pub trait MeshPeer: Debug + Send + Sync + 'static {
    /// Stable opaque identifier of the peer. Non-empty for valid peers.
    fn hash_id(&self) -> &str;

    /// Whether this peer is the local node.
    fn is_self(&self) -> bool;
}

/// Shared handle to a peer
pub type PeerHandle = Arc<dyn MeshPeer>;

/// Whether two handles refer to the same peer *object*
///
/// This is reference identity, not value identity: two distinct handles with
/// equal `hash_id` are interchangeable for lookups but are not `same_peer`.
pub fn same_peer(a: &PeerHandle, b: &PeerHandle) -> bool {
    Arc::ptr_eq(a, b)
}

/// Simple in-memory peer for simulation and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPeer {
    id: String,
    local: bool,
}

impl SimPeer {
    /// Create a new handle with the given identifier
    pub fn new(id: impl Into<String>, local: bool) -> PeerHandle {
        Arc::new(Self {
            id: id.into(),
            local,
        })
    }

    /// A local (self) peer handle
    pub fn local(id: impl Into<String>) -> PeerHandle {
        Self::new(id, true)
    }

    /// A remote peer handle
    pub fn remote(id: impl Into<String>) -> PeerHandle {
        Self::new(id, false)
    }
}

impl MeshPeer for SimPeer {
    fn hash_id(&self) -> &str {
        &self.id
    }

    fn is_self(&self) -> bool {
        self.local
    }
}
