//! Transactional editor for endpoint-set records
//!
//! The membership engine opens a transaction over a peer's record, lets the
//! caller stage edits, and commits by swapping in [`EndpointsTxn::after`]
//! when [`EndpointsTxn::updated`] reports a semantic change.
//!
//! The editor is copy-on-write: the decoded pre-image stays untouched and a
//! working copy is cloned on the first mutation, so concurrent readers of
//! the pre-image never observe a half-edited value. The editor itself is
//! not thread-safe; it is driven by a single gossip worker.

use weft_core::Endpoint;

use crate::endpoints::{EndpointSetV1, NetworkEndpointV1, NetworkEndpointsV1};
use crate::error::ModelResult;

/// Copy-on-write editor over one endpoint-set record
#[derive(Debug)]
pub struct EndpointsTxn {
    origin_raw: String,
    origin: NetworkEndpointsV1,
    work: Option<NetworkEndpointsV1>,
}

impl EndpointsTxn {
    /// Open a transaction over a raw record value
    ///
    /// Fails if the value does not decode and validate.
    pub fn open(raw: &str) -> ModelResult<Self> {
        let origin = NetworkEndpointsV1::decode_string_validated(raw)?;
        Ok(Self {
            origin_raw: raw.to_owned(),
            origin,
            work: None,
        })
    }

    fn work_mut(&mut self) -> &mut NetworkEndpointsV1 {
        self.work.get_or_insert_with(|| self.origin.clone())
    }

    fn current(&self) -> &NetworkEndpointsV1 {
        self.work.as_ref().unwrap_or(&self.origin)
    }

    /// Stage new endpoints at priority zero
    ///
    /// Merges by transport: an endpoint already present keeps its entry
    /// unless the zero priority beats it. Returns whether the staged set
    /// changed.
    pub fn add_endpoints(&mut self, endpoints: &[Endpoint]) -> bool {
        if endpoints.is_empty() {
            return false;
        }
        let additions = EndpointSetV1::from_entries(
            endpoints
                .iter()
                .map(|ep| NetworkEndpointV1::new(ep.family, ep.address.clone(), 0)),
        );
        self.work_mut().endpoints.merge(&additions)
    }

    /// Replace the whole staged set
    pub fn update_endpoints(&mut self, endpoints: impl IntoIterator<Item = NetworkEndpointV1>) {
        self.work_mut().endpoints = EndpointSetV1::from_entries(endpoints);
    }

    /// Replace the staged value with a raw wire string
    ///
    /// The string must decode and validate; the pre-image is kept on error.
    pub fn set_raw_value(&mut self, raw: &str) -> ModelResult<()> {
        let value = NetworkEndpointsV1::decode_string_validated(raw)?;
        self.work = Some(value);
        Ok(())
    }

    /// Whether the staged value differs semantically from the pre-image
    pub fn updated(&self) -> bool {
        self.work.as_ref().is_some_and(|work| *work != self.origin)
    }

    /// Encode the staged value
    ///
    /// The staged value either decoded cleanly or was produced by staging
    /// operations that keep it well-formed, so an encode failure is an
    /// unreachable invariant violation.
    pub fn after(&self) -> String {
        match self.current().encode_string() {
            Ok(raw) => raw,
            Err(err) => unreachable!("endpoint set failed to re-encode: {err}"),
        }
    }

    /// The raw pre-image this transaction was opened over
    pub fn before(&self) -> &str {
        &self.origin_raw
    }
}
