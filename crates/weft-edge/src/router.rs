//! The edge router
//!
//! One `EdgeRouter` runs per active overlay network. It joins the local
//! peer to the forwarding engine, pumps frames between the tunnel endpoint
//! and the metadata network, mirrors membership events into the engine, and
//! keeps the engine's static routes and the local endpoint advertisement in
//! step with the network configuration.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use ipnet::Ipv4Net;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use weft_core::{Endpoint, NetworkConfig, NetworkMode, PeerHandle};
use weft_gossip::NetworkEndpointV1;
use weft_routing::Ipv4MeshRouter;
use weft_runtime::Scope;

use crate::error::EdgeError;
use crate::metanet::{MetaNet, PeerEvent};
use crate::vtep::TunnelEndpoint;

/// How long a noted endpoint failure keeps the endpoint deprioritized
const ENDPOINT_FAILURE_WINDOW: Duration = Duration::from_secs(300);

struct EdgeInner {
    router: Ipv4MeshRouter,
    metanet: Arc<dyn MetaNet>,
    vtep: Arc<dyn TunnelEndpoint>,
    cfg: Mutex<Option<NetworkConfig>>,
    endpoint_failures: DashMap<Endpoint, Instant>,
}

impl EdgeInner {
    /// Add the static routes the configuration assigns to `peer`
    fn apply_peer_routes(&self, peer: &PeerHandle) {
        let mut routes: Vec<Ipv4Net> = {
            let cfg = self.cfg.lock();
            let Some(cfg) = cfg.as_ref() else { return };
            cfg.static_routes
                .iter()
                .filter(|route| route.peer == peer.hash_id())
                .map(|route| route.cidr)
                .collect()
        };
        // A repeated join notification must not re-add what is in place.
        let existing: HashSet<Ipv4Net> = self
            .router
            .static_routes()
            .iter()
            .filter(|(_, owner)| owner.hash_id() == peer.hash_id())
            .map(|(net, _)| *net)
            .collect();
        routes.retain(|net| !existing.contains(net));
        if routes.is_empty() {
            return;
        }
        if let Err(err) = self.router.add_static_cidr_routes(peer, &routes) {
            warn!(peer = %peer.hash_id(), error = %err, "cannot apply configured routes");
        }
    }

    /// Forward a classified frame to each of its destinations
    async fn dispatch(&self, frame: &Bytes, from: &PeerHandle) {
        for target in self.router.route(frame, from) {
            if target.is_self() {
                if let Err(err) = self.vtep.send(frame.clone()).await {
                    warn!(error = %err, "cannot deliver frame to tunnel endpoint");
                }
            } else if let Err(err) = self.metanet.send_frame(&target, frame.clone()).await {
                warn!(peer = %target.hash_id(), error = %err, "cannot ship frame");
            }
        }
    }
}

/// The edge router shell of one overlay network
pub struct EdgeRouter {
    inner: Arc<EdgeInner>,
    main: Arc<Scope>,
    forward: Arc<Scope>,
    metanet_scope: Arc<Scope>,
    config_scope: Arc<Scope>,
}

impl EdgeRouter {
    /// Build an edge router under `parent` and start its background tasks
    ///
    /// The local peer is joined to the forwarding engine immediately;
    /// everything else waits for membership events and configuration.
    pub fn new(
        parent: &Arc<Scope>,
        metanet: Arc<dyn MetaNet>,
        vtep: Arc<dyn TunnelEndpoint>,
    ) -> Result<Arc<Self>, EdgeError> {
        let inner = Arc::new(EdgeInner {
            router: Ipv4MeshRouter::new(),
            metanet,
            vtep,
            cfg: Mutex::new(None),
            endpoint_failures: DashMap::new(),
        });
        inner.router.peer_join(&inner.metanet.local_peer());

        let edge = Arc::new(Self {
            inner,
            main: parent.child("edge"),
            forward: Scope::named("forward"),
            metanet_scope: parent.child("metanet"),
            config_scope: Scope::named("config"),
        });
        edge.start_membership_pump();
        edge.start_forwarding();
        edge.start_cleanup();
        Ok(edge)
    }

    fn start_membership_pump(&self) {
        let inner = self.inner.clone();
        let exit = self.metanet_scope.exit();
        self.metanet_scope.spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = exit.cancelled() => break,
                    event = inner.metanet.next_peer_event() => event,
                };
                match event {
                    Some(PeerEvent::Join(peer)) => {
                        inner.router.peer_join(&peer);
                        inner.apply_peer_routes(&peer);
                    }
                    Some(PeerEvent::Leave(peer)) => inner.router.peer_leave(&peer),
                    None => break,
                }
            }
        });
    }

    fn start_forwarding(&self) {
        // Local traffic entering the overlay.
        let inner = self.inner.clone();
        let exit = self.forward.exit();
        self.forward.spawn(async move {
            let local = inner.metanet.local_peer();
            loop {
                let frame = tokio::select! {
                    _ = exit.cancelled() => break,
                    frame = inner.vtep.recv() => frame,
                };
                let Some(frame) = frame else { break };
                inner.dispatch(&frame, &local).await;
            }
        });

        // Remote traffic leaving the overlay or transiting through us.
        let inner = self.inner.clone();
        let exit = self.forward.exit();
        self.forward.spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = exit.cancelled() => break,
                    received = inner.metanet.recv_frame() => received,
                };
                let Some((from, frame)) = received else { break };
                inner.dispatch(&frame, &from).await;
            }
        });
    }

    fn start_cleanup(&self) {
        let exit = self.main.exit();
        let inner = self.inner.clone();
        let forward = self.forward.clone();
        let metanet_scope = self.metanet_scope.clone();
        let config_scope = self.config_scope.clone();
        self.main.spawn(async move {
            exit.cancelled().await;

            forward.shutdown();
            inner.vtep.close();
            forward.join().await;
            debug!("forwarding stopped");

            metanet_scope.shutdown();
            metanet_scope.join().await;
            debug!("metadata network stopped");

            config_scope.shutdown();
            config_scope.join().await;
            debug!("edge router cleaned up");
        });
    }

    /// Apply a network configuration
    ///
    /// Idempotent: re-applying the current configuration is a no-op. A
    /// different configuration re-plumbs the engine in place: the
    /// advertised endpoint set is updated transactionally, seed endpoints
    /// are registered, and static routes are diffed against the engine
    /// without cycling it.
    pub fn apply_config(&self, cfg: &NetworkConfig) -> Result<(), EdgeError> {
        let inner = &self.inner;
        let mut current = inner.cfg.lock();
        if current.as_ref() == Some(cfg) {
            debug!("configuration unchanged");
            return Ok(());
        }

        inner.metanet.endpoint_txn(&mut |txn| {
            txn.update_endpoints(cfg.endpoints.iter().map(|entry| {
                NetworkEndpointV1::new(entry.family, entry.endpoint.clone(), entry.priority)
            }));
        })?;
        inner
            .metanet
            .seed_endpoints(cfg.endpoints.iter().map(|e| e.descriptor()).collect())?;

        // Drop routes the new configuration no longer names.
        let desired: HashSet<(String, Ipv4Net)> = cfg
            .static_routes
            .iter()
            .map(|route| (route.peer.clone(), route.cidr))
            .collect();
        for (net, owner) in inner.router.static_routes() {
            if !desired.contains(&(owner.hash_id().to_owned(), net)) {
                inner.router.remove_static_cidr_routes(&owner, &[net]);
            }
        }

        // Add the missing ones for peers that are already joined; the rest
        // apply when their peer joins.
        let remaining: HashSet<(String, Ipv4Net)> = inner
            .router
            .static_routes()
            .into_iter()
            .map(|(net, owner)| (owner.hash_id().to_owned(), net))
            .collect();
        let mut by_peer: BTreeMap<&str, Vec<Ipv4Net>> = BTreeMap::new();
        for route in &cfg.static_routes {
            if !remaining.contains(&(route.peer.clone(), route.cidr)) {
                by_peer.entry(route.peer.as_str()).or_default().push(route.cidr);
            }
        }
        for (id, nets) in by_peer {
            let Some(handle) = inner.router.peer_by_id(id) else {
                continue;
            };
            inner.router.add_static_cidr_routes(&handle, &nets)?;
        }

        *current = Some(cfg.clone());
        info!(mode = %self.mode_of(Some(cfg)), "configuration applied");
        Ok(())
    }

    /// Working mode exposed to operators: `"ethernet"`, `"ip"`, or
    /// `"unknown"` before any configuration was applied
    pub fn mode(&self) -> &'static str {
        self.mode_of(self.inner.cfg.lock().as_ref())
    }

    fn mode_of(&self, cfg: Option<&NetworkConfig>) -> &'static str {
        match cfg {
            None => "unknown",
            Some(cfg) => match cfg.mode {
                NetworkMode::Ethernet => "ethernet",
                NetworkMode::Overlay => "ip",
            },
        }
    }

    /// The forwarding engine
    pub fn router(&self) -> &Ipv4MeshRouter {
        &self.inner.router
    }

    /// The scope owning this edge router's teardown
    pub fn scope(&self) -> &Arc<Scope> {
        &self.main
    }

    /// Record that a transport endpoint just failed
    pub fn note_endpoint_failure(&self, endpoint: Endpoint) {
        self.inner.endpoint_failures.insert(endpoint, Instant::now());
    }

    /// Whether an endpoint failed within the deprioritization window
    pub fn endpoint_recently_failed(&self, endpoint: &Endpoint) -> bool {
        let Some(noted) = self.inner.endpoint_failures.get(endpoint) else {
            return false;
        };
        let fresh = noted.elapsed() < ENDPOINT_FAILURE_WINDOW;
        drop(noted);
        if !fresh {
            self.inner.endpoint_failures.remove(endpoint);
        }
        fresh
    }
}
