//! # Weft Control
//!
//! Lifecycle management for named overlay networks.
//!
//! A [`Network`] binds a name to a configuration, an edge router, and a
//! cancellation scope, and moves between *inactive* and *active* through
//! [`Network::up`], [`Network::down`], and [`Network::reload`]. The
//! [`NetworkManager`] owns one `Network` per name in the daemon
//! configuration and reconciles the set on configuration updates.
//!
//! Transitions are serialized per network but independent across networks.
//! `down` never blocks on task teardown: the scope is shut down and joined
//! on a background task under the manager's scope.

pub mod manager;
pub mod network;

pub use manager::NetworkManager;
pub use network::{EdgeBuilder, Network};
