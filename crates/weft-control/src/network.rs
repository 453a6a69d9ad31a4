//! Per-network lifecycle state machine
//!
//! A network is *active* while it holds an edge router. `up` builds the
//! router inside a fresh child scope; `down` clears the router immediately
//! and tears the scope down in the background; `reload` either stashes the
//! configuration (inactive), short-circuits on an equal one, or re-plumbs
//! the running router in place.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use weft_core::NetworkConfig;
use weft_edge::{EdgeError, EdgeRouter};
use weft_runtime::Scope;

/// Seam through which a network constructs its edge router
///
/// Production wires the real metadata network and tunnel device in here;
/// tests plug in-memory doubles.
pub trait EdgeBuilder: Send + Sync + 'static {
    /// Build an edge router owned by `scope`
    fn build(&self, scope: &Arc<Scope>) -> Result<Arc<EdgeRouter>, EdgeError>;
}

impl<F> EdgeBuilder for F
where
    F: Fn(&Arc<Scope>) -> Result<Arc<EdgeRouter>, EdgeError> + Send + Sync + 'static,
{
    fn build(&self, scope: &Arc<Scope>) -> Result<Arc<EdgeRouter>, EdgeError> {
        self(scope)
    }
}

#[derive(Default)]
struct NetworkState {
    cfg: Option<NetworkConfig>,
    router: Option<Arc<EdgeRouter>>,
    scope: Option<Arc<Scope>>,
}

/// A named overlay network and its lifecycle
pub struct Network {
    name: String,
    manager_scope: Arc<Scope>,
    builder: Arc<dyn EdgeBuilder>,
    state: Mutex<NetworkState>,
}

impl Network {
    pub(crate) fn new(
        name: impl Into<String>,
        manager_scope: Arc<Scope>,
        builder: Arc<dyn EdgeBuilder>,
    ) -> Self {
        Self {
            name: name.into(),
            manager_scope,
            builder,
            state: Mutex::new(NetworkState::default()),
        }
    }

    /// Name of this network
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the network currently runs an edge router
    pub fn active(&self) -> bool {
        self.state.lock().router.is_some()
    }

    /// The running edge router, if any
    pub fn router(&self) -> Option<Arc<EdgeRouter>> {
        self.state.lock().router.clone()
    }

    /// Bring the network up
    ///
    /// A no-op when already active or when no configuration has been set.
    /// On construction or configuration failure the fresh scope is torn
    /// down and the network stays inactive.
    pub fn up(&self) -> Result<(), EdgeError> {
        let mut state = self.state.lock();
        if state.router.is_some() {
            return Ok(());
        }
        let Some(cfg) = state.cfg.clone() else {
            debug!(network = %self.name, "up without configuration is a no-op");
            return Ok(());
        };

        let scope = self.manager_scope.child(format!("network-{}", self.name));
        let router = match self.builder.build(&scope) {
            Ok(router) => router,
            Err(err) => {
                warn!(network = %self.name, error = %err, "edge router construction failed");
                self.teardown(scope);
                return Err(err);
            }
        };
        if let Err(err) = router.apply_config(&cfg) {
            warn!(network = %self.name, error = %err, "initial configuration failed");
            self.teardown(scope);
            return Err(err);
        }

        info!(network = %self.name, mode = router.mode(), "network up");
        state.scope = Some(scope);
        state.router = Some(router);
        Ok(())
    }

    /// Take the network down
    ///
    /// The router slot clears immediately, so a subsequent `up` starts
    /// fresh, while the scope is shut down and joined on a background task.
    /// The caller never blocks on teardown.
    pub fn down(&self) {
        let scope = {
            let mut state = self.state.lock();
            state.router = None;
            state.scope.take()
        };
        let Some(scope) = scope else { return };
        info!(network = %self.name, "network going down");
        self.teardown(scope);
    }

    /// Install a new configuration
    ///
    /// `None` is a no-op. While inactive the configuration is stashed for
    /// the next `up`. While active, an equal configuration short-circuits
    /// and a different one re-plumbs the running router in place.
    pub fn reload(&self, cfg: Option<&NetworkConfig>) -> Result<(), EdgeError> {
        let Some(cfg) = cfg else { return Ok(()) };
        let mut state = self.state.lock();
        match state.router.clone() {
            None => {
                state.cfg = Some(cfg.clone());
                Ok(())
            }
            Some(router) => {
                if state.cfg.as_ref() == Some(cfg) {
                    debug!(network = %self.name, "configuration unchanged");
                    return Ok(());
                }
                state.cfg = Some(cfg.clone());
                router.apply_config(cfg)
            }
        }
    }

    fn teardown(&self, scope: Arc<Scope>) {
        scope.shutdown();
        self.manager_scope.spawn(async move {
            scope.join().await;
        });
    }
}
