//! # Weft Core
//!
//! Core traits, types, and configuration model for the weft overlay mesh.
//!
//! This crate provides the foundational abstractions shared by the routing
//! engine, the gossip data model, and the network lifecycle machinery.
//!
//! ## Key Traits
//!
//! - [`MeshPeer`]: Abstraction over peer identification (test stubs for
//!   simulation, membership records in production)
//!
//! ## Key Types
//!
//! - [`Endpoint`]: A transport endpoint descriptor (`family` + address)
//! - [`EndpointFamily`]: Small-integer transport family tag
//! - [`NetworkConfig`]: Per-network configuration document
//!
//! ## Modules
//!
//! - [`sorted`]: Generic build/merge/subtract over sorted vectors, used by
//!   the gossip data model and the router's prefix bookkeeping

pub mod config;
pub mod endpoint;
pub mod identity;
pub mod sorted;

pub use config::{DaemonConfig, EndpointConfig, NetworkConfig, NetworkMode, StaticRouteConfig};
pub use endpoint::{Endpoint, EndpointFamily};
pub use identity::{same_peer, MeshPeer, PeerHandle, SimPeer};
