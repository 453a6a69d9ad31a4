//! # Weft Gossip
//!
//! Gossip-mergeable data model for peer metadata.
//!
//! A peer advertises the transport endpoints it can be reached on as a
//! versioned, ordered set carried in its gossip record. Replicas merge
//! concurrent updates deterministically: entries are keyed by
//! `(family, address)` and the lowest advertised priority survives, which
//! makes the merge confluent: priorities only ever move down.
//!
//! ## Core Types
//!
//! - [`NetworkEndpointV1`]: One priority-qualified endpoint
//! - [`EndpointSetV1`]: Sorted, deduplicated set of endpoints
//! - [`NetworkEndpointsV1`]: The versioned wire value (`{"v":1,"eps":[...]}`)
//! - [`EndpointsSyncerV1`]: Merge rule plugged into the membership engine
//! - [`EndpointsTxn`]: Copy-on-write transactional editor
//!
//! ## Merge semantics
//!
//! The synchronizer distinguishes *sequential* merges (one side causally
//! dominates; it wins verbatim) from *concurrent* merges (both sides updated
//! in the same round; the sets are unioned). A concurrent merge against an
//! absent remote keeps the local value: existence wins.

pub mod endpoints;
pub mod error;
pub mod sync;
pub mod txn;

pub use endpoints::{
    EndpointSetV1, NetworkEndpointV1, NetworkEndpointsV1, ENDPOINTS_V1_VERSION,
};
pub use error::{ModelError, ModelResult};
pub use sync::{EndpointsSyncerV1, KeyValue, MergeProperties, DEFAULT_ENDPOINT_KEY};
pub use txn::EndpointsTxn;
