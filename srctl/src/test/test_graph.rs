// SrCtl: An SRv6 Flow Controller with QoS-Aware Path Steering
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Test the topology graph and the netstate promotion.

use crate::net::{Link, NetError, NetState, Prefix, Router, Topology};
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

fn rt(name: &str, a: &str) -> Router {
    Router::new(name, addr(a), Prefix::default())
}

fn ln(local: &str, remote: &str, ava_bw: u32, metric: u32) -> Link {
    Link::new(addr(local), addr(remote), 1000, ava_bw, 10, metric)
}

#[test]
fn test_identity_by_name_and_endpoints() {
    // routers compare by name (ignoring case), links by the ordered endpoint pair
    assert_eq!(rt("A", "fc00::a"), rt("a", "fc00::b"));
    assert_ne!(rt("A", "fc00::a"), rt("B", "fc00::a"));
    assert_eq!(ln("fc00::1", "fc00::2", 10, 1), ln("fc00::1", "fc00::2", 99, 7));
    assert_ne!(ln("fc00::1", "fc00::2", 10, 1), ln("fc00::2", "fc00::1", 10, 1));
}

#[test]
fn test_add_and_lookup() {
    let mut g = Topology::new();
    let a = g.add_node(rt("A", "fc00::a"));
    let b = g.add_node(rt("B", "fc00::b"));

    assert_eq!(g.node_by_name("A"), Some(a));
    assert_eq!(g.node_by_name("a"), Some(a));
    assert_eq!(g.node_by_name("C"), None);
    assert_eq!(g.node(a).map(|r| r.name.as_str()), Some("A"));

    g.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 1000, 1)).unwrap();
    assert_eq!(g.node_count(), 2);
    assert_eq!(g.edge_count(), 2);

    let fwd = g.get_edge_data((addr("fc00:ab::a"), addr("fc00:ab::b"))).unwrap();
    assert_eq!(fwd.remote, addr("fc00:ab::b"));
    let rev = g.get_edge_data((addr("fc00:ab::b"), addr("fc00:ab::a"))).unwrap();
    assert_eq!(rev.remote, addr("fc00:ab::a"));
}

#[test]
fn test_duplicate_edge_rejected() {
    let mut g = Topology::new();
    let a = g.add_node(rt("A", "fc00::a"));
    let b = g.add_node(rt("B", "fc00::b"));

    g.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 1000, 1)).unwrap();
    assert_eq!(
        g.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 1000, 1)),
        Err(NetError::DuplicateLink(addr("fc00:ab::a"), addr("fc00:ab::b")))
    );
    assert_eq!(g.edge_count(), 2);
}

#[test]
fn test_dirty_window() {
    let mut g = Topology::new();
    assert!(!g.is_dirty());

    let a = g.add_node(rt("A", "fc00::a"));
    assert!(g.is_dirty());

    g.clear_dirty();
    assert!(!g.is_dirty());

    let b = g.add_node(rt("B", "fc00::b"));
    g.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 1000, 1)).unwrap();
    assert!(g.is_dirty());
    assert!(g.last_mod() >= g.dirty_since());
}

#[test]
fn test_deepcopy_is_independent() {
    let mut g = Topology::new();
    let a = g.add_node(rt("A", "fc00::a"));
    let b = g.add_node(rt("B", "fc00::b"));
    g.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 1000, 1)).unwrap();

    let mut copy = g.deepcopy();
    copy.remove_node(b);
    copy.update_edge_pair((addr("fc00:ab::a"), addr("fc00:ab::b")), |_| ()).unwrap_err();

    assert_eq!(g.node_count(), 2);
    assert_eq!(g.edge_count(), 2);
    assert_eq!(copy.node_count(), 1);
    assert_eq!(copy.edge_count(), 0);
}

#[test]
fn test_prune_removes_matching_edges() {
    let mut g = Topology::new();
    let a = g.add_node(rt("A", "fc00::a"));
    let b = g.add_node(rt("B", "fc00::b"));
    let c = g.add_node(rt("C", "fc00::c"));
    g.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 50, 1)).unwrap();
    g.add_edge_pair(b, c, ln("fc00:bc::b", "fc00:bc::c", 500, 1)).unwrap();
    g.finalize();
    g.build_cache();

    g.prune(|l| l.ava_bw < 100);

    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 2);
    assert!(g.get_edge_data((addr("fc00:ab::a"), addr("fc00:ab::b"))).is_none());
    assert!(g.get_edge_data((addr("fc00:bc::b"), addr("fc00:bc::c"))).is_some());
}

#[test]
fn test_remove_node_drops_incident_links() {
    let mut g = Topology::new();
    let a = g.add_node(rt("A", "fc00::a"));
    let b = g.add_node(rt("B", "fc00::b"));
    g.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 1000, 1)).unwrap();

    assert!(g.remove_node(b).is_some());
    assert_eq!(g.edge_count(), 0);
    assert!(g.get_edge_data((addr("fc00:ab::a"), addr("fc00:ab::b"))).is_none());
    assert!(g.get_edge_data((addr("fc00:ab::b"), addr("fc00:ab::a"))).is_none());
    assert_eq!(g.node_by_name("B"), None);
}

#[test]
fn test_node_named_guards_stale_handles() {
    let mut g = Topology::new();
    let a = g.add_node(rt("A", "fc00::a"));

    assert_eq!(g.node_named(a, "A"), Some(a));
    assert_eq!(g.node_named(a, "B"), None);

    g.remove_node(a);
    assert_eq!(g.node_named(a, "A"), None);
}

#[test]
fn test_zero_metric_is_infinite() {
    let l = ln("fc00:ab::a", "fc00:ab::b", 1000, 0);
    assert_eq!(l.metric, u32::MAX);
}

#[test]
fn test_netstate_promotion() {
    let ns = NetState::new();

    {
        let mut staging = ns.staging().write().unwrap();
        let a = staging.add_node(rt("A", "fc00::a"));
        let b = staging.add_node(rt("B", "fc00::b"));
        staging.add_edge_pair(a, b, ln("fc00:ab::a", "fc00:ab::b", 1000, 1)).unwrap();
    }

    assert_eq!(ns.read().live.node_count(), 0);

    // hard timeout zero forces promotion independent of churn
    std::thread::sleep(Duration::from_millis(1));
    assert!(ns.needs_sync(Duration::from_secs(60), Duration::from_millis(0)));
    assert!(ns.sync());

    {
        let inner = ns.read();
        assert_eq!(inner.live.node_count(), 2);
        assert_eq!(inner.live.edge_count(), 2);
        assert!(inner.live.node_by_name("A").is_some());
    }
    assert!(!ns.staging().read().unwrap().is_dirty());

    // no new promotion while staging is clean, and the snapshot identity is stable
    let before = Arc::clone(&ns.read().live);
    assert!(!ns.needs_sync(Duration::from_millis(0), Duration::from_millis(0)));
    assert!(!ns.sync());
    assert!(Arc::ptr_eq(&before, &ns.read().live));
}
