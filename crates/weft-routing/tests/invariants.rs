//! Property tests for routing-table invariants
//!
//! After any sequence of membership, routing, and static-route operations:
//! every learned host route points at a joined peer whose inventory holds
//! the address, every inventoried address appears as a host route, and the
//! static table never contains two overlapping prefixes.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use proptest::prelude::*;

use weft_core::{same_peer, PeerHandle, SimPeer};
use weft_routing::Ipv4MeshRouter;

#[derive(Debug, Clone)]
enum Op {
    Join(usize),
    Leave(usize),
    Route { from: usize, src: usize, dst: usize },
    AddCidr { peer: usize, net: usize },
    RemoveCidr { peer: usize, net: usize },
}

const PEERS: usize = 4;
const ADDRS: [[u8; 4]; 5] = [
    [10, 0, 0, 1],
    [10, 0, 0, 2],
    [10, 0, 0, 3],
    [192, 168, 5, 1],
    [172, 16, 9, 9],
];

fn nets() -> Vec<Ipv4Net> {
    [
        "10.0.0.0/24",
        "10.0.0.0/16",
        "192.168.0.0/16",
        "172.16.0.0/12",
    ]
    .iter()
    .map(|s| s.parse().unwrap())
    .collect()
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PEERS).prop_map(Op::Join),
        (0..PEERS).prop_map(Op::Leave),
        (0..PEERS, 0..ADDRS.len(), 0..ADDRS.len())
            .prop_map(|(from, src, dst)| Op::Route { from, src, dst }),
        (0..PEERS, 0..4usize).prop_map(|(peer, net)| Op::AddCidr { peer, net }),
        (0..PEERS, 0..4usize).prop_map(|(peer, net)| Op::RemoveCidr { peer, net }),
    ]
}

fn frame(src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    packet[12..16].copy_from_slice(&src);
    packet[16..20].copy_from_slice(&dst);
    packet
}

fn overlap(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

fn check_invariants(router: &Ipv4MeshRouter, handles: &[PeerHandle]) -> Result<(), TestCaseError> {
    // Every learned binding points at a joined peer that inventories it.
    for addr in ADDRS {
        let ip = Ipv4Addr::from(addr);
        if let Some(owner) = router.learned_owner(ip) {
            prop_assert!(router.is_joined(&owner), "owner of {ip} is not joined");
            let inventory = router
                .peer_addresses(&owner)
                .ok_or_else(|| TestCaseError::fail(format!("no inventory behind owner of {ip}")))?;
            prop_assert!(inventory.contains(&ip), "{ip} missing from owner inventory");
        }
    }
    // Every inventoried address is a learned binding back to the same peer.
    for handle in handles {
        if let Some(inventory) = router.peer_addresses(handle) {
            for ip in inventory {
                let owner = router
                    .learned_owner(ip)
                    .ok_or_else(|| TestCaseError::fail(format!("{ip} inventoried but unbound")))?;
                prop_assert!(same_peer(&owner, handle), "{ip} bound to a different peer");
            }
        }
    }
    // The static table is overlap-free.
    let routes = router.static_routes();
    for (i, (a, _)) in routes.iter().enumerate() {
        for (b, _) in &routes[i + 1..] {
            prop_assert!(!overlap(a, b), "{a} overlaps {b}");
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn table_invariants_hold_under_any_op_sequence(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let router = Ipv4MeshRouter::new();
        let handles: Vec<PeerHandle> = (0..PEERS)
            .map(|i| {
                if i == 0 {
                    SimPeer::local("peer-0")
                } else {
                    SimPeer::remote(format!("peer-{i}"))
                }
            })
            .collect();
        let nets = nets();

        for op in ops {
            match op {
                Op::Join(i) => router.peer_join(&handles[i]),
                Op::Leave(i) => router.peer_leave(&handles[i]),
                Op::Route { from, src, dst } => {
                    let _ = router.route(&frame(ADDRS[src], ADDRS[dst]), &handles[from]);
                }
                Op::AddCidr { peer, net } => {
                    let _ = router.add_static_cidr_routes(&handles[peer], &[nets[net]]);
                }
                Op::RemoveCidr { peer, net } => {
                    let _ = router.remove_static_cidr_routes(&handles[peer], &[nets[net]]);
                }
            }
            check_invariants(&router, &handles)?;
        }
    }
}
