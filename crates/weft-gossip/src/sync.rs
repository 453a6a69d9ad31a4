//! Gossip merge rule for the endpoint set
//!
//! The membership engine owns the gossip records themselves; this module
//! only supplies the per-key merge semantics it plugs in. A merge is
//! *sequential* when one side causally dominates the other and *concurrent*
//! when both sides were updated in the same round.

use tracing::debug;

use crate::endpoints::NetworkEndpointsV1;
use crate::error::ModelResult;
use crate::txn::EndpointsTxn;

/// Gossip key under which a peer publishes its endpoint set
pub const DEFAULT_ENDPOINT_KEY: &str = "metadata_endpoint";

/// A keyed gossip record as handed in by the membership engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyValue {
    /// Record key.
    pub key: String,
    /// Raw wire value.
    pub value: String,
}

impl KeyValue {
    /// Create a record
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Causal relationship of the two sides of a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeProperties {
    /// Both sides were updated without either observing the other.
    pub concurrent: bool,
}

impl MergeProperties {
    /// Properties of a concurrent merge
    pub fn concurrent() -> Self {
        Self { concurrent: true }
    }

    /// Properties of a sequential merge (remote dominates)
    pub fn sequential() -> Self {
        Self { concurrent: false }
    }
}

/// Merge rule for [`NetworkEndpointsV1`] gossip records
///
/// Stateless; one instance serves every peer's record.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointsSyncerV1;

impl EndpointsSyncerV1 {
    /// Merge `remote` into `local` for a sequential round
    ///
    /// Returns whether `local` changed. Errors surface remote values that do
    /// not decode; the membership layer decides whether to quarantine the
    /// sender.
    pub fn sync(&self, local: &mut KeyValue, remote: Option<&KeyValue>) -> ModelResult<bool> {
        self.sync_with(local, remote, MergeProperties::sequential())
    }

    /// Merge `remote` into `local` under the given causal properties
    pub fn sync_with(
        &self,
        local: &mut KeyValue,
        remote: Option<&KeyValue>,
        props: MergeProperties,
    ) -> ModelResult<bool> {
        let Some(remote) = remote else {
            // A concurrent deletion never beats a value: existence wins.
            // A dominant deletion is accepted as-is.
            return Ok(!props.concurrent);
        };

        let remote_v1 = NetworkEndpointsV1::decode_string_validated(&remote.value)?;
        let mut local_v1 = match NetworkEndpointsV1::decode_string_validated(&local.value) {
            Ok(v1) => v1,
            Err(err) => {
                debug!(key = %local.key, error = %err, "replacing undecodable local value");
                local.value = remote.value.clone();
                return Ok(true);
            }
        };

        if props.concurrent {
            if !local_v1.endpoints.merge(&remote_v1.endpoints) {
                return Ok(false);
            }
            local.value = local_v1.encode_string()?;
            Ok(true)
        } else {
            if local_v1.endpoints == remote_v1.endpoints {
                return Ok(false);
            }
            local.value = remote.value.clone();
            Ok(true)
        }
    }

    /// Whether a record carries a valid endpoint-set value
    pub fn validate(&self, kv: &KeyValue) -> bool {
        NetworkEndpointsV1::decode_string_validated(&kv.value).is_ok()
    }

    /// Open a transactional editor over a record
    pub fn txn(&self, kv: &KeyValue) -> ModelResult<EndpointsTxn> {
        EndpointsTxn::open(&kv.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::{EndpointSetV1, NetworkEndpointV1};
    use weft_core::EndpointFamily;

    fn value_of(entries: Vec<NetworkEndpointV1>) -> String {
        NetworkEndpointsV1 {
            version: 1,
            endpoints: EndpointSetV1::from_entries(entries),
        }
        .encode_string()
        .unwrap()
    }

    fn kv(value: String) -> KeyValue {
        KeyValue::new(DEFAULT_ENDPOINT_KEY, value)
    }

    #[test]
    fn test_concurrent_merge_unions_sets() {
        let mut local = kv(value_of(vec![NetworkEndpointV1::new(
            EndpointFamily::UDP,
            "1.1.1.1:9",
            10,
        )]));
        let remote = kv(value_of(vec![
            NetworkEndpointV1::new(EndpointFamily::UDP, "1.1.1.1:9", 3),
            NetworkEndpointV1::new(EndpointFamily::TCP, "2.2.2.2:8", 5),
        ]));

        let changed = EndpointsSyncerV1
            .sync_with(&mut local, Some(&remote), MergeProperties::concurrent())
            .unwrap();
        assert!(changed);

        let merged = NetworkEndpointsV1::decode_string(&local.value).unwrap();
        assert_eq!(
            merged.endpoints.0,
            vec![
                NetworkEndpointV1::new(EndpointFamily::UDP, "1.1.1.1:9", 3),
                NetworkEndpointV1::new(EndpointFamily::TCP, "2.2.2.2:8", 5),
            ]
        );
    }

    #[test]
    fn test_concurrent_absence_keeps_local() {
        let original = value_of(vec![NetworkEndpointV1::new(EndpointFamily::UDP, "a", 0)]);
        let mut local = kv(original.clone());
        let changed = EndpointsSyncerV1
            .sync_with(&mut local, None, MergeProperties::concurrent())
            .unwrap();
        assert!(!changed);
        assert_eq!(local.value, original);
    }

    #[test]
    fn test_sequential_dominant_wins_verbatim() {
        let mut local = kv(value_of(vec![NetworkEndpointV1::new(
            EndpointFamily::UDP,
            "a",
            1,
        )]));
        let remote = kv(value_of(vec![NetworkEndpointV1::new(
            EndpointFamily::TCP,
            "b",
            9,
        )]));
        let changed = EndpointsSyncerV1.sync(&mut local, Some(&remote)).unwrap();
        assert!(changed);
        assert_eq!(local.value, remote.value);
    }

    #[test]
    fn test_sequential_equal_sets_unchanged() {
        let entries = vec![NetworkEndpointV1::new(EndpointFamily::UDP, "a", 1)];
        let mut local = kv(value_of(entries.clone()));
        let remote = kv(value_of(entries));
        let changed = EndpointsSyncerV1.sync(&mut local, Some(&remote)).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_undecodable_local_is_replaced() {
        let mut local = kv("not json".into());
        let remote = kv(value_of(vec![NetworkEndpointV1::new(
            EndpointFamily::UDP,
            "a",
            0,
        )]));
        let changed = EndpointsSyncerV1.sync(&mut local, Some(&remote)).unwrap();
        assert!(changed);
        assert_eq!(local.value, remote.value);
    }

    #[test]
    fn test_undecodable_remote_surfaces_error() {
        let mut local = kv(value_of(vec![]));
        let remote = kv("not json".into());
        assert!(EndpointsSyncerV1.sync(&mut local, Some(&remote)).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(EndpointsSyncerV1.validate(&kv(String::new())));
        assert!(EndpointsSyncerV1.validate(&kv(r#"{"v":1,"eps":[]}"#.into())));
        assert!(!EndpointsSyncerV1.validate(&kv(r#"{"v":7,"eps":[]}"#.into())));
        assert!(!EndpointsSyncerV1.validate(&kv("garbage".into())));
    }
}
