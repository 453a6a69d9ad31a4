//! Property tests for the endpoint-set merge algebra
//!
//! The merge must behave as a join: commutative, associative, idempotent,
//! with the lowest advertised priority surviving per transport. Entry pools
//! are kept tiny so collisions between generated sets are common.

use proptest::prelude::*;

use weft_core::EndpointFamily;
use weft_gossip::{EndpointSetV1, NetworkEndpointV1, NetworkEndpointsV1};

fn arb_entry() -> impl Strategy<Value = NetworkEndpointV1> {
    (0u16..3, 0usize..4, 0u32..4).prop_map(|(family, addr, priority)| {
        NetworkEndpointV1::new(
            EndpointFamily(family),
            ["a", "b", "c", "d"][addr],
            priority,
        )
    })
}

fn arb_set() -> impl Strategy<Value = EndpointSetV1> {
    proptest::collection::vec(arb_entry(), 0..8).prop_map(EndpointSetV1::from_entries)
}

proptest! {
    #[test]
    fn build_is_idempotent(entries in proptest::collection::vec(arb_entry(), 0..8)) {
        let mut set = EndpointSetV1(entries);
        set.build();
        let once = set.clone();
        set.build();
        prop_assert_eq!(set, once);
    }

    #[test]
    fn merge_is_commutative(a in arb_set(), b in arb_set()) {
        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn merge_is_associative(a in arb_set(), b in arb_set(), c in arb_set()) {
        let mut bc = b.clone();
        bc.merge(&c);
        let mut a_bc = a.clone();
        a_bc.merge(&bc);

        let mut ab = a.clone();
        ab.merge(&b);
        ab.merge(&c);

        prop_assert_eq!(a_bc, ab);
    }

    #[test]
    fn merge_is_idempotent(a in arb_set()) {
        let mut merged = a.clone();
        prop_assert!(!merged.merge(&a));
        prop_assert_eq!(merged, a);
    }

    #[test]
    fn merged_priority_is_minimum_per_transport(a in arb_set(), b in arb_set()) {
        let mut merged = a.clone();
        merged.merge(&b);
        for entry in merged.iter() {
            let floor = a
                .iter()
                .chain(b.iter())
                .filter(|other| other.same_transport(entry))
                .map(|other| other.priority)
                .min()
                .expect("merged entry must come from an input");
            prop_assert_eq!(entry.priority, floor);
        }
    }

    #[test]
    fn wire_round_trip(set in arb_set()) {
        let value = NetworkEndpointsV1 { version: 1, endpoints: set };
        let raw = value.encode_string().unwrap();
        let decoded = NetworkEndpointsV1::decode_string_validated(&raw).unwrap();
        prop_assert_eq!(decoded, value);
    }
}
