//! Configuration model for overlay networks
//!
//! These types describe the per-network section of the daemon configuration
//! document. Parsing the document itself (YAML, file watching) happens in
//! the front end; the core only consumes the decoded values and relies on
//! field-wise equality to short-circuit no-op reloads.

use std::collections::BTreeMap;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, EndpointFamily};

/// Forwarding mode of an overlay network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// L2 frame forwarding.
    Ethernet,
    /// L3 IPv4 mesh forwarding. Exposed to operators as `"ip"`.
    Overlay,
}

/// A seed or advertised transport endpoint in the configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Transport family tag.
    #[serde(rename = "type")]
    pub family: EndpointFamily,
    /// Family-specific address.
    pub endpoint: String,
    /// Advertised priority. Lower is preferred.
    #[serde(default)]
    pub priority: u32,
}

impl EndpointConfig {
    /// The endpoint descriptor this entry names.
    pub fn descriptor(&self) -> Endpoint {
        Endpoint::new(self.family, self.endpoint.clone())
    }
}

/// An administratively configured IPv4 prefix route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRouteConfig {
    /// Destination prefix.
    pub cidr: Ipv4Net,
    /// `hash_id` of the peer owning the prefix.
    pub peer: String,
}

/// Configuration of a single named overlay network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Forwarding mode.
    pub mode: NetworkMode,
    /// Seed endpoints to join through, and local endpoints to advertise.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Static prefix routes.
    #[serde(default)]
    pub static_routes: Vec<StaticRouteConfig>,
}

impl NetworkConfig {
    /// A minimal L3 overlay config with no endpoints or routes.
    pub fn overlay() -> Self {
        Self {
            mode: NetworkMode::Overlay,
            endpoints: Vec::new(),
            static_routes: Vec::new(),
        }
    }
}

/// The daemon configuration document: named overlay networks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Overlay networks keyed by name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert_eq!(
            serde_json::to_string(&NetworkMode::Overlay).unwrap(),
            "\"overlay\""
        );
        assert_eq!(
            serde_json::from_str::<NetworkMode>("\"ethernet\"").unwrap(),
            NetworkMode::Ethernet
        );
    }

    #[test]
    fn test_equality_short_circuit_key() {
        let mut a = NetworkConfig::overlay();
        let b = a.clone();
        assert_eq!(a, b);

        a.endpoints.push(EndpointConfig {
            family: EndpointFamily::UDP,
            endpoint: "203.0.113.7:3880".into(),
            priority: 0,
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_priority_defaults_to_zero() {
        let decoded: EndpointConfig =
            serde_json::from_str(r#"{"type":2,"endpoint":"203.0.113.7:3880"}"#).unwrap();
        assert_eq!(decoded.priority, 0);
        assert_eq!(decoded.descriptor().family, EndpointFamily::UDP);
    }
}
