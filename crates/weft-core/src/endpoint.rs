//! Transport endpoint descriptors
//!
//! An [`Endpoint`] names a reachable transport: a family tag plus a
//! family-specific address string. The tag values are shared with the
//! backend connector registry, so unknown tags must survive a decode/encode
//! round trip. [`EndpointFamily`] is therefore a transparent integer
//! newtype rather than a closed enum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport family tag
///
/// Known values are exposed as constants; anything else is carried through
/// unchanged for forward compatibility with new connector backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EndpointFamily(pub u16);

impl EndpointFamily {
    /// Unresolved or unconfigured transport.
    pub const UNKNOWN: EndpointFamily = EndpointFamily(0);
    /// Stream transport over TCP.
    pub const TCP: EndpointFamily = EndpointFamily(1);
    /// Datagram transport over UDP.
    pub const UDP: EndpointFamily = EndpointFamily(2);
    /// Local unix domain socket transport.
    pub const UNIX: EndpointFamily = EndpointFamily(3);
}

impl fmt::Display for EndpointFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EndpointFamily::UNKNOWN => write!(f, "unknown"),
            EndpointFamily::TCP => write!(f, "tcp"),
            EndpointFamily::UDP => write!(f, "udp"),
            EndpointFamily::UNIX => write!(f, "unix"),
            EndpointFamily(other) => write!(f, "family#{other}"),
        }
    }
}

/// A transport endpoint descriptor
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("{family}://{address}")]
pub struct Endpoint {
    /// Transport family of the endpoint.
    pub family: EndpointFamily,
    /// Family-specific address, e.g. `203.0.113.7:3880` for udp.
    pub address: String,
}

impl Endpoint {
    /// Create an endpoint descriptor
    pub fn new(family: EndpointFamily, address: impl Into<String>) -> Self {
        Self {
            family,
            address: address.into(),
        }
    }
}
