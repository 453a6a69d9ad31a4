//! Versioned endpoint-set values
//!
//! The wire form is a compact JSON object:
//!
//! ```text
//! {"v":1,"eps":[{"t":2,"ep":"203.0.113.7:3880","pri":10}, ...]}
//! ```
//!
//! Entries are ordered by `(priority, family, address)` and deduplicated by
//! `(family, address)` alone; when two replicas advertise the same transport
//! at different priorities, the lower one survives. Priorities are therefore
//! monotonically non-increasing across merges, which gives the set a
//! confluent fixed point under gossip.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use weft_core::sorted;
use weft_core::EndpointFamily;

use crate::error::{ModelError, ModelResult};

/// Model version of [`NetworkEndpointsV1`]
pub const ENDPOINTS_V1_VERSION: u16 = 1;

/// A peer's network endpoint with its advertised priority
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkEndpointV1 {
    /// Transport family tag.
    #[serde(rename = "t")]
    pub family: EndpointFamily,
    /// Family-specific address.
    #[serde(rename = "ep")]
    pub endpoint: String,
    /// Advertised priority. Lower is preferred; zero is omitted on the wire.
    #[serde(rename = "pri", default, skip_serializing_if = "priority_is_zero")]
    pub priority: u32,
}

fn priority_is_zero(priority: &u32) -> bool {
    *priority == 0
}

impl NetworkEndpointV1 {
    /// Create an entry
    pub fn new(family: EndpointFamily, endpoint: impl Into<String>, priority: u32) -> Self {
        Self {
            family,
            endpoint: endpoint.into(),
            priority,
        }
    }

    /// Whether two entries name the same transport, ignoring priority
    pub fn same_transport(&self, other: &Self) -> bool {
        self.family == other.family && self.endpoint == other.endpoint
    }
}

impl Ord for NetworkEndpointV1 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.family.cmp(&other.family))
            .then_with(|| self.endpoint.cmp(&other.endpoint))
    }
}

impl PartialOrd for NetworkEndpointV1 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sorted set of [`NetworkEndpointV1`], deduplicated by transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointSetV1(pub Vec<NetworkEndpointV1>);

impl EndpointSetV1 {
    /// Build a set from arbitrary entries
    pub fn from_entries(entries: impl IntoIterator<Item = NetworkEndpointV1>) -> Self {
        let mut set = Self(entries.into_iter().collect());
        set.build();
        set
    }

    /// Restore the set invariant: sorted, one entry per transport
    ///
    /// Sorts by `(priority, family, address)` and keeps the first entry of
    /// each `(family, address)` group; after the sort, that is the one with
    /// the lowest priority.
    pub fn build(&mut self) {
        sorted::build(&mut self.0, |a, b| a.cmp(b), |a, b| a == b);
        let mut seen: HashSet<(EndpointFamily, String)> = HashSet::with_capacity(self.0.len());
        self.0
            .retain(|entry| seen.insert((entry.family, entry.endpoint.clone())));
    }

    /// Merge `other` into this set
    ///
    /// The union is deduplicated by transport with the lowest-priority entry
    /// surviving; full ties prefer the existing entry. Returns whether the
    /// set changed. Both sets must already be built.
    pub fn merge(&mut self, other: &EndpointSetV1) -> bool {
        if other.0.is_empty() {
            return false;
        }
        let before = self.0.clone();
        self.0.extend(other.0.iter().cloned());
        self.build();
        self.0 != before
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in set order
    pub fn iter(&self) -> impl Iterator<Item = &NetworkEndpointV1> {
        self.0.iter()
    }
}

fn nullable_set<'de, D>(deserializer: D) -> Result<EndpointSetV1, D::Error>
where
    D: Deserializer<'de>,
{
    // Older encoders emit `"eps":null` for an empty set.
    let entries = Option::<Vec<NetworkEndpointV1>>::deserialize(deserializer)?;
    Ok(EndpointSetV1(entries.unwrap_or_default()))
}

/// The versioned endpoint-set value carried in a peer's gossip record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpointsV1 {
    /// Model version; always [`ENDPOINTS_V1_VERSION`] for valid values.
    #[serde(rename = "v")]
    pub version: u16,
    /// Advertised endpoints.
    #[serde(rename = "eps", default, deserialize_with = "nullable_set")]
    pub endpoints: EndpointSetV1,
}

impl Default for NetworkEndpointsV1 {
    fn default() -> Self {
        Self {
            version: ENDPOINTS_V1_VERSION,
            endpoints: EndpointSetV1::default(),
        }
    }
}

impl NetworkEndpointsV1 {
    /// Encode to the wire object
    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Encode to the wire object as a string
    pub fn encode_string(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from wire bytes; the endpoint set is always re-built
    pub fn decode(raw: &[u8]) -> ModelResult<Self> {
        let mut value: Self = serde_json::from_slice(raw)?;
        value.endpoints.build();
        Ok(value)
    }

    /// Decode from a wire string; an empty string is the initial value
    pub fn decode_string(raw: &str) -> ModelResult<Self> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Self::decode(raw.as_bytes())
    }

    /// Decode from a wire string and check the model version
    pub fn decode_string_validated(raw: &str) -> ModelResult<Self> {
        let value = Self::decode_string(raw)?;
        value.validate()?;
        Ok(value)
    }

    /// Check the model version
    pub fn validate(&self) -> ModelResult<()> {
        if self.version != ENDPOINTS_V1_VERSION {
            return Err(ModelError::VersionMismatch {
                name: "NetworkEndpointsV1",
                actual: self.version,
                expected: ENDPOINTS_V1_VERSION,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(family: EndpointFamily, ep: &str, pri: u32) -> NetworkEndpointV1 {
        NetworkEndpointV1::new(family, ep, pri)
    }

    #[test]
    fn test_build_orders_by_priority_then_family_then_address() {
        let mut set = EndpointSetV1(vec![
            entry(EndpointFamily::UDP, "b", 5),
            entry(EndpointFamily::TCP, "a", 5),
            entry(EndpointFamily::UDP, "a", 0),
        ]);
        set.build();
        assert_eq!(
            set.0,
            vec![
                entry(EndpointFamily::UDP, "a", 0),
                entry(EndpointFamily::TCP, "a", 5),
                entry(EndpointFamily::UDP, "b", 5),
            ]
        );
    }

    #[test]
    fn test_build_collapses_transport_to_lowest_priority() {
        let mut set = EndpointSetV1(vec![
            entry(EndpointFamily::UDP, "1.1.1.1:9", 10),
            entry(EndpointFamily::UDP, "1.1.1.1:9", 3),
        ]);
        set.build();
        assert_eq!(set.0, vec![entry(EndpointFamily::UDP, "1.1.1.1:9", 3)]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut set = EndpointSetV1(vec![
            entry(EndpointFamily::UDP, "x", 7),
            entry(EndpointFamily::TCP, "y", 2),
            entry(EndpointFamily::UDP, "x", 1),
        ]);
        set.build();
        let once = set.clone();
        set.build();
        assert_eq!(set, once);
    }

    #[test]
    fn test_merge_concurrent_priorities() {
        let mut local = EndpointSetV1::from_entries([entry(EndpointFamily::UDP, "1.1.1.1:9", 10)]);
        let remote = EndpointSetV1::from_entries([
            entry(EndpointFamily::UDP, "1.1.1.1:9", 3),
            entry(EndpointFamily::TCP, "2.2.2.2:8", 5),
        ]);

        assert!(local.merge(&remote));
        assert_eq!(
            local.0,
            vec![
                entry(EndpointFamily::UDP, "1.1.1.1:9", 3),
                entry(EndpointFamily::TCP, "2.2.2.2:8", 5),
            ]
        );
    }

    #[test]
    fn test_merge_reports_no_change_for_subset() {
        let mut local = EndpointSetV1::from_entries([
            entry(EndpointFamily::UDP, "a", 1),
            entry(EndpointFamily::TCP, "b", 2),
        ]);
        let remote = EndpointSetV1::from_entries([entry(EndpointFamily::TCP, "b", 2)]);
        assert!(!local.merge(&remote));
    }

    #[test]
    fn test_wire_round_trip() {
        let value = NetworkEndpointsV1 {
            version: 1,
            endpoints: EndpointSetV1::from_entries([
                entry(EndpointFamily::UDP, "203.0.113.7:3880", 0),
                entry(EndpointFamily::TCP, "203.0.113.7:3880", 4),
            ]),
        };
        let raw = value.encode_string().unwrap();
        assert_eq!(
            raw,
            r#"{"v":1,"eps":[{"t":2,"ep":"203.0.113.7:3880"},{"t":1,"ep":"203.0.113.7:3880","pri":4}]}"#
        );
        let decoded = NetworkEndpointsV1::decode_string(&raw).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_empty_string_is_initial_value() {
        let value = NetworkEndpointsV1::decode_string_validated("").unwrap();
        assert_eq!(value.version, ENDPOINTS_V1_VERSION);
        assert!(value.endpoints.is_empty());
    }

    #[test]
    fn test_null_endpoint_list_decodes_empty() {
        let value = NetworkEndpointsV1::decode_string(r#"{"v":1,"eps":null}"#).unwrap();
        assert!(value.endpoints.is_empty());
    }

    #[test]
    fn test_missing_priority_decodes_zero() {
        let value = NetworkEndpointsV1::decode_string(r#"{"v":1,"eps":[{"t":2,"ep":"a"}]}"#).unwrap();
        assert_eq!(value.endpoints.0[0].priority, 0);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let err = NetworkEndpointsV1::decode_string_validated(r#"{"v":2,"eps":[]}"#).unwrap_err();
        match err {
            ModelError::VersionMismatch {
                actual, expected, ..
            } => {
                assert_eq!(actual, 2);
                assert_eq!(expected, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_rebuilds_unsorted_input() {
        let raw = r#"{"v":1,"eps":[{"t":1,"ep":"b","pri":9},{"t":2,"ep":"a","pri":1},{"t":1,"ep":"b","pri":3}]}"#;
        let value = NetworkEndpointsV1::decode_string(raw).unwrap();
        assert_eq!(
            value.endpoints.0,
            vec![
                entry(EndpointFamily::UDP, "a", 1),
                entry(EndpointFamily::TCP, "b", 3),
            ]
        );
    }
}
