//! # Weft Edge
//!
//! The edge router shell: one per active overlay network.
//!
//! An [`EdgeRouter`] wires three collaborators together behind a single
//! [`EdgeRouter::apply_config`] entrypoint:
//!
//! - the metadata network client ([`MetaNet`]) delivering membership events
//!   and remote frames, and carrying the local endpoint advertisement;
//! - the forwarding engine (`weft_routing::Ipv4MeshRouter`);
//! - the virtual tunnel endpoint ([`TunnelEndpoint`]) the local host's
//!   traffic enters and leaves through.
//!
//! Background work is owned by four cancellation scopes. Shutting down the
//! `main` scope tears the shell down in a fixed order: stop forwarding,
//! close the tunnel, join the forwarding tasks, then stop the metadata
//! network, then the configuration scope.

pub mod error;
pub mod metanet;
pub mod router;
pub mod vtep;

pub use error::EdgeError;
pub use metanet::{MemoryMetaNet, MetaNet, PeerEvent};
pub use router::EdgeRouter;
pub use vtep::{LoopbackTunnel, TunnelEndpoint};
