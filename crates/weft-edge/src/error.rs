//! Edge router error types

use thiserror::Error;

/// Errors surfaced by the edge router shell
#[derive(Debug, Error)]
pub enum EdgeError {
    /// The metadata network rejected an operation.
    #[error("metadata network: {0}")]
    MetaNet(String),

    /// A gossip value failed to decode or validate.
    #[error(transparent)]
    Model(#[from] weft_gossip::ModelError),

    /// The forwarding engine rejected a control-path operation.
    #[error(transparent)]
    Route(#[from] weft_routing::RouteError),

    /// The tunnel endpoint is closed.
    #[error("tunnel endpoint closed")]
    TunnelClosed,
}
