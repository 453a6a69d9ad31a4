//! Symmetric peer-to-peer IPv4 mesh router
//!
//! Classification consults, in order: learned host routes, static CIDR
//! routes, and finally a cross-visibility flood (frames from the local node
//! go to every remote peer; frames from remote peers go to the local node).
//! Source addresses are learned from the packet stream, so return traffic
//! takes a host route as soon as the first frame in either direction has
//! been seen.
//!
//! All routing state lives in one immutable [`RouterTables`] snapshot
//! behind an `ArcSwap`. Readers load the snapshot once per frame and never
//! block; writers serialize on `write` and publish full replacements. The
//! per-peer learned-address inventory is the one piece of shared mutable
//! state; it has its own lock, taken only while the writer mutex is held.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use ipnet::Ipv4Net;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use weft_core::{same_peer, sorted, PeerHandle};

use crate::error::RouteError;

/// Minimum length of a classifiable IPv4 frame
const IPV4_HEADER_MIN: usize = 20;
const SRC_OFFSET: usize = 12;
const DST_OFFSET: usize = 16;

/// A joined peer and the host addresses learned behind it
#[derive(Debug)]
struct MeshPeerRef {
    peer: PeerHandle,
    ip_set: RwLock<HashSet<Ipv4Addr>>,
}

impl MeshPeerRef {
    fn new(peer: PeerHandle) -> Self {
        Self {
            peer,
            ip_set: RwLock::new(HashSet::new()),
        }
    }
}

#[derive(Debug, Clone)]
struct CidrRoute {
    cidr: Ipv4Net,
    peer: PeerHandle,
}

/// One consistent snapshot of the routing state
#[derive(Debug, Default)]
struct RouterTables {
    ip_to_peer: HashMap<Ipv4Addr, PeerHandle>,
    peers: HashMap<String, Arc<MeshPeerRef>>,
    cidr_routes: Vec<CidrRoute>,
}

/// The L3 IPv4 mesh forwarding engine
///
/// Safe to call concurrently from the device read loop and from any number
/// of membership or configuration paths. [`Ipv4MeshRouter::route`] is
/// wait-free except for the brief writer section entered when it learns a
/// new source binding.
pub struct Ipv4MeshRouter {
    tables: ArcSwap<RouterTables>,
    write: Mutex<()>,
}

impl Default for Ipv4MeshRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Ipv4MeshRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self {
            tables: ArcSwap::from_pointee(RouterTables::default()),
            write: Mutex::new(()),
        }
    }

    /// Classify an IPv4 frame from `from` and learn its source binding
    ///
    /// Returns the peers the frame should be forwarded to; an empty result
    /// is a silent drop. Malformed frames, frames from unjoined peers, and
    /// unroutable destinations all drop without logging; the data path
    /// must not amplify errors.
    pub fn route(&self, packet: &[u8], from: &PeerHandle) -> Vec<PeerHandle> {
        if packet.len() < IPV4_HEADER_MIN || packet[0] >> 4 != 4 {
            return Vec::new();
        }

        // One load covers host routes, peer registry, and prefix routes.
        let tables = self.tables.load();
        if !tables.peers.contains_key(from.hash_id()) {
            return Vec::new();
        }

        let dst = addr_at(packet, DST_OFFSET);
        let mut targets = Vec::new();
        if !(dst.is_loopback() || dst.is_multicast() || dst.is_unspecified() || dst.is_link_local())
        {
            if !dst.is_broadcast() {
                if let Some(owner) = tables.ip_to_peer.get(&dst) {
                    targets.push(owner.clone());
                }
            }
            if targets.is_empty() {
                if let Some(route) = tables.cidr_routes.iter().find(|r| r.cidr.contains(&dst)) {
                    targets.push(route.peer.clone());
                }
            }
            if targets.is_empty() {
                // Flood across the local/remote boundary.
                targets.extend(
                    tables
                        .peers
                        .values()
                        .filter(|r| r.peer.is_self() != from.is_self())
                        .map(|r| r.peer.clone()),
                );
            }
        }

        // Learning runs even when classification flooded or dropped.
        let src = addr_at(packet, SRC_OFFSET);
        if src.is_loopback()
            || src.is_multicast()
            || src.is_unspecified()
            || src.is_link_local()
            || src.is_broadcast()
        {
            return targets;
        }
        if tables
            .ip_to_peer
            .get(&src)
            .is_some_and(|owner| same_peer(owner, from))
        {
            return targets;
        }
        drop(tables);
        self.learn(src, from);

        targets
    }

    fn learn(&self, src: Ipv4Addr, from: &PeerHandle) {
        let _write = self.write.lock();
        let current = self.tables.load_full();

        // Double-check: another writer may have published this binding.
        if current
            .ip_to_peer
            .get(&src)
            .is_some_and(|owner| same_peer(owner, from))
        {
            return;
        }
        // The origin may have left or been replaced since classification.
        let Some(from_ref) = current.peers.get(from.hash_id()) else {
            return;
        };
        if !same_peer(&from_ref.peer, from) {
            return;
        }

        if let Some(prior) = current.ip_to_peer.get(&src) {
            if let Some(prior_ref) = current.peers.get(prior.hash_id()) {
                prior_ref.ip_set.write().remove(&src);
            }
        }
        from_ref.ip_set.write().insert(src);

        let mut ip_to_peer = current.ip_to_peer.clone();
        ip_to_peer.insert(src, from_ref.peer.clone());
        self.tables.store(Arc::new(RouterTables {
            ip_to_peer,
            peers: current.peers.clone(),
            cidr_routes: current.cidr_routes.clone(),
        }));
    }

    /// Join a peer to the mesh
    ///
    /// Idempotent for the same handle. A fresh handle reusing an existing
    /// identifier replaces the old entry; learned routes and static routes
    /// of the replaced handle are dropped with it.
    pub fn peer_join(&self, peer: &PeerHandle) {
        if peer.hash_id().is_empty() {
            return;
        }
        if self
            .tables
            .load()
            .peers
            .get(peer.hash_id())
            .is_some_and(|r| same_peer(&r.peer, peer))
        {
            return;
        }

        let _write = self.write.lock();
        let current = self.tables.load_full();
        if current
            .peers
            .get(peer.hash_id())
            .is_some_and(|r| same_peer(&r.peer, peer))
        {
            return;
        }

        let mut ip_to_peer = current.ip_to_peer.clone();
        let mut cidr_routes = current.cidr_routes.clone();
        let mut peers = current.peers.clone();
        if let Some(stale) = peers.get(peer.hash_id()) {
            let stale_ips = stale.ip_set.read();
            ip_to_peer.retain(|ip, _| !stale_ips.contains(ip));
            cidr_routes.retain(|route| !same_peer(&route.peer, &stale.peer));
        }
        peers.insert(
            peer.hash_id().to_owned(),
            Arc::new(MeshPeerRef::new(peer.clone())),
        );

        self.tables.store(Arc::new(RouterTables {
            ip_to_peer,
            peers,
            cidr_routes,
        }));
        debug!(peer = %peer.hash_id(), "peer joined");
    }

    /// Remove a peer and everything learned or configured behind it
    ///
    /// Guarded by handle identity: a stale notification carrying a replaced
    /// handle does not evict the newer peer. Idempotent.
    pub fn peer_leave(&self, peer: &PeerHandle) {
        if peer.hash_id().is_empty() {
            return;
        }
        if !self
            .tables
            .load()
            .peers
            .get(peer.hash_id())
            .is_some_and(|r| same_peer(&r.peer, peer))
        {
            return;
        }

        let _write = self.write.lock();
        let current = self.tables.load_full();
        let Some(leaving) = current.peers.get(peer.hash_id()) else {
            return;
        };
        if !same_peer(&leaving.peer, peer) {
            return;
        }

        // One publish covers all three tables; readers never see a partial
        // departure.
        let owned = leaving.ip_set.read();
        let ip_to_peer = current
            .ip_to_peer
            .iter()
            .filter(|(ip, _)| !owned.contains(*ip))
            .map(|(ip, owner)| (*ip, owner.clone()))
            .collect();
        drop(owned);
        let cidr_routes = current
            .cidr_routes
            .iter()
            .filter(|route| !same_peer(&route.peer, peer))
            .cloned()
            .collect();
        let mut peers = current.peers.clone();
        peers.remove(peer.hash_id());

        self.tables.store(Arc::new(RouterTables {
            ip_to_peer,
            peers,
            cidr_routes,
        }));
        debug!(peer = %peer.hash_id(), "peer left");
    }

    /// Add static prefix routes owned by `peer`
    ///
    /// Fails without mutating anything if the peer is not joined, carries
    /// an empty identifier, or any prefix in the candidate table would
    /// overlap another.
    pub fn add_static_cidr_routes(
        &self,
        peer: &PeerHandle,
        routes: &[Ipv4Net],
    ) -> Result<(), RouteError> {
        if routes.is_empty() {
            return Ok(());
        }
        if peer.hash_id().is_empty() {
            return Err(RouteError::InvalidPeerId);
        }

        let _write = self.write.lock();
        let current = self.tables.load_full();
        if !current
            .peers
            .get(peer.hash_id())
            .is_some_and(|r| same_peer(&r.peer, peer))
        {
            return Err(RouteError::InvalidPeer);
        }

        // Candidate post-state: existing prefixes plus the request, kept
        // un-deduplicated so an exact duplicate flags as overlapping.
        let mut candidate: Vec<Ipv4Net> = current.cidr_routes.iter().map(|r| r.cidr).collect();
        candidate.extend_from_slice(routes);
        if let Some((first, second)) = find_overlap(&candidate) {
            return Err(RouteError::PrefixOverlap { first, second });
        }

        let mut cidr_routes = current.cidr_routes.clone();
        cidr_routes.extend(routes.iter().map(|cidr| CidrRoute {
            cidr: *cidr,
            peer: peer.clone(),
        }));
        self.tables.store(Arc::new(RouterTables {
            ip_to_peer: current.ip_to_peer.clone(),
            peers: current.peers.clone(),
            cidr_routes,
        }));
        debug!(peer = %peer.hash_id(), routes = routes.len(), "static routes added");
        Ok(())
    }

    /// Remove static routes whose `(prefix, peer)` matches exactly
    ///
    /// Returns whether anything was removed.
    pub fn remove_static_cidr_routes(&self, peer: &PeerHandle, routes: &[Ipv4Net]) -> bool {
        if routes.is_empty() {
            return false;
        }

        let _write = self.write.lock();
        let current = self.tables.load_full();

        let mut removal = routes.to_vec();
        sorted::build(&mut removal, |a, b| a.cmp(b), |a, b| a == b);
        let mut removed = false;
        let cidr_routes: Vec<CidrRoute> = current
            .cidr_routes
            .iter()
            .filter(|route| {
                let matches = same_peer(&route.peer, peer)
                    && removal.binary_search(&route.cidr).is_ok();
                removed |= matches;
                !matches
            })
            .cloned()
            .collect();
        if !removed {
            return false;
        }

        self.tables.store(Arc::new(RouterTables {
            ip_to_peer: current.ip_to_peer.clone(),
            peers: current.peers.clone(),
            cidr_routes,
        }));
        debug!(peer = %peer.hash_id(), "static routes removed");
        true
    }

    /// The peer a host route currently points at, if any
    pub fn learned_owner(&self, ip: Ipv4Addr) -> Option<PeerHandle> {
        self.tables.load().ip_to_peer.get(&ip).cloned()
    }

    /// Host addresses learned behind the given handle
    ///
    /// `None` if the handle is not the joined one for its identifier.
    pub fn peer_addresses(&self, peer: &PeerHandle) -> Option<Vec<Ipv4Addr>> {
        let tables = self.tables.load();
        let r = tables.peers.get(peer.hash_id())?;
        if !same_peer(&r.peer, peer) {
            return None;
        }
        let mut addrs: Vec<Ipv4Addr> = r.ip_set.read().iter().copied().collect();
        addrs.sort();
        Some(addrs)
    }

    /// The joined handle for an identifier, if any
    pub fn peer_by_id(&self, id: &str) -> Option<PeerHandle> {
        self.tables.load().peers.get(id).map(|r| r.peer.clone())
    }

    /// Whether exactly this handle is joined
    pub fn is_joined(&self, peer: &PeerHandle) -> bool {
        self.tables
            .load()
            .peers
            .get(peer.hash_id())
            .is_some_and(|r| same_peer(&r.peer, peer))
    }

    /// Number of joined peers
    pub fn peer_count(&self) -> usize {
        self.tables.load().peers.len()
    }

    /// The static route table in lookup order
    pub fn static_routes(&self) -> Vec<(Ipv4Net, PeerHandle)> {
        self.tables
            .load()
            .cidr_routes
            .iter()
            .map(|r| (r.cidr, r.peer.clone()))
            .collect()
    }
}

fn addr_at(packet: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(
        packet[offset],
        packet[offset + 1],
        packet[offset + 2],
        packet[offset + 3],
    )
}

/// Two prefixes overlap iff one contains the other's network address
fn find_overlap(prefixes: &[Ipv4Net]) -> Option<(Ipv4Net, Ipv4Net)> {
    for (i, a) in prefixes.iter().enumerate() {
        for b in &prefixes[i + 1..] {
            if a.contains(&b.network()) || b.contains(&a.network()) {
                return Some((*a, *b));
            }
        }
    }
    None
}
