//! Routing error types

use ipnet::Ipv4Net;
use thiserror::Error;

/// Control-path errors raised by the forwarding engine
///
/// Data-path problems (malformed frames, unknown origins) are silent drops
/// and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The peer is not currently joined to the mesh.
    #[error("invalid peer")]
    InvalidPeer,

    /// The peer carries an empty identifier.
    #[error("invalid ID of peer")]
    InvalidPeerId,

    /// Two prefixes in the candidate route table cover the same addresses.
    #[error("route prefix {first} overlaps route prefix {second}")]
    PrefixOverlap { first: Ipv4Net, second: Ipv4Net },
}
