//! # Weft Routing
//!
//! L3 IPv4 forwarding engine for the weft overlay mesh.
//!
//! Every node runs the same engine: frames read from the local tunnel
//! device and frames received from remote peers are classified against a
//! shared routing state, producing the set of peers the frame should be
//! forwarded to. The engine learns host routes from the source addresses it
//! observes, honors administratively configured prefix routes, and falls
//! back to flooding when it knows nothing about a destination.
//!
//! ## Core Types
//!
//! - [`Ipv4MeshRouter`]: The forwarding engine
//! - [`RouteError`]: Control-path failures (data-path failures are silent
//!   drops)
//!
//! ## Concurrency
//!
//! The routing state is published as a single immutable snapshot swapped
//! atomically, so classification never takes a lock: a reader samples one
//! consistent view of the host routes, the peer registry, and the prefix
//! routes. Writers serialize on a mutex and publish whole-table
//! replacements.

pub mod error;
pub mod mesh;

pub use error::RouteError;
pub use mesh::Ipv4MeshRouter;
