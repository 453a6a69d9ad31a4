//! Named-network manager
//!
//! Owns one [`Network`] per name in the daemon configuration document and
//! reconciles the set on configuration updates: missing networks are
//! created, existing ones are reloaded, and networks that disappeared from
//! the document are taken down and dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use weft_core::DaemonConfig;
use weft_edge::EdgeError;
use weft_runtime::Scope;

use crate::network::{EdgeBuilder, Network};

/// Manager of all named overlay networks of one daemon
pub struct NetworkManager {
    scope: Arc<Scope>,
    builder: Arc<dyn EdgeBuilder>,
    networks: Mutex<BTreeMap<String, Arc<Network>>>,
}

impl NetworkManager {
    /// Create a manager whose background teardown tasks run under `scope`
    pub fn new(scope: Arc<Scope>, builder: Arc<dyn EdgeBuilder>) -> Self {
        Self {
            scope,
            builder,
            networks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Look up a network by name
    pub fn get_network(&self, name: &str) -> Option<Arc<Network>> {
        self.networks.lock().get(name).cloned()
    }

    /// Names of all managed networks
    pub fn network_names(&self) -> Vec<String> {
        self.networks.lock().keys().cloned().collect()
    }

    /// Reconcile the managed networks with a configuration document
    ///
    /// Creates networks new to the document, reloads every named one, and
    /// takes down networks the document no longer mentions. Returns one
    /// entry per network whose reload failed; an empty result means the
    /// whole document applied.
    pub fn update_config(&self, cfg: &DaemonConfig) -> Vec<(String, EdgeError)> {
        let mut networks = self.networks.lock();
        let mut failures = Vec::new();

        for (name, net_cfg) in &cfg.networks {
            let network = networks.entry(name.clone()).or_insert_with(|| {
                info!(network = %name, "network configured");
                Arc::new(Network::new(
                    name.clone(),
                    self.scope.clone(),
                    self.builder.clone(),
                ))
            });
            if let Err(err) = network.reload(Some(net_cfg)) {
                failures.push((name.clone(), err));
            }
        }

        networks.retain(|name, network| {
            if cfg.networks.contains_key(name) {
                return true;
            }
            info!(network = %name, "network removed from configuration");
            network.down();
            false
        });

        failures
    }
}
