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

//! Test the flow manager: BSID allocation, the flow map and the FlowState row rendering.

use crate::flow::{
    generate_bsid, generate_unique_bsid, unix_now, Flow, FlowMap, FlowStatus, SrcPrefix,
};
use crate::net::Prefix;
use crate::path::Segment;
use crate::srdb::FlowStateEntry;
use serde_json::Value;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::Arc;

fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

fn prefix(s: &str) -> Prefix {
    s.parse().unwrap()
}

fn src_prefix(bsid: &str, segs: Vec<Segment>) -> SrcPrefix {
    SrcPrefix {
        addr: addr("2001:42::"),
        prefix_len: 64,
        priority: 0,
        router: "R9".to_string(),
        bsid: addr(bsid),
        segs,
    }
}

fn make_flow(ttl: u32, prefixes: Vec<SrcPrefix>) -> Arc<Flow> {
    Arc::new(Flow::new(
        "app".to_string(),
        "svc".to_string(),
        "proxy1".to_string(),
        "req-1".to_string(),
        addr("2001:b::1"),
        "A".to_string(),
        "B".to_string(),
        100,
        50,
        ttl,
        0,
        prefixes,
    ))
}

#[test]
fn test_bsid_stays_in_prefix() {
    let pbsid = prefix("fc00:a::/64");
    for _ in 0..100 {
        let bsid = generate_bsid(&pbsid);
        assert!(pbsid.contains(&bsid));
    }
}

#[test]
fn test_bsid_full_length_prefix_is_fixed() {
    let pbsid = prefix("fc00:a::42/128");
    assert_eq!(generate_bsid(&pbsid), addr("fc00:a::42"));
}

#[test]
fn test_bsid_allocation_fails_when_exhausted() {
    let pbsid = prefix("fc00:a::42/128");
    let mut flows: HashMap<Ipv6Addr, Arc<Flow>> = HashMap::new();
    flows.insert(
        addr("fc00:a::42"),
        make_flow(0, vec![src_prefix("fc00:a::42", vec![])]),
    );

    assert_eq!(generate_unique_bsid(&pbsid, &flows), None);
}

#[test]
fn test_bsid_zero_length_prefix_never_collides() {
    let pbsid = prefix("::/0");
    let mut flows: HashMap<Ipv6Addr, Arc<Flow>> = HashMap::new();
    for i in 0..16 {
        let b = format!("fc00::{:x}", i + 1);
        flows.insert(addr(&b), make_flow(0, vec![src_prefix(&b, vec![])]));
    }

    let bsid = generate_unique_bsid(&pbsid, &flows).unwrap();
    assert!(!flows.contains_key(&bsid));
}

#[test]
fn test_bsids_are_deduplicated() {
    let fl = make_flow(
        0,
        vec![
            src_prefix("fc00:a::1", vec![Segment::Node(addr("fc00::b"))]),
            src_prefix("fc00:a::1", vec![Segment::Node(addr("fc00::b"))]),
        ],
    );

    assert_eq!(fl.bsids(), vec![addr("fc00:a::1")]);
}

#[test]
fn test_replace_segs_touches_every_prefix() {
    let fl = make_flow(
        0,
        vec![
            src_prefix("fc00:a::1", vec![Segment::Node(addr("fc00::b"))]),
            src_prefix("fc00:a::1", vec![Segment::Node(addr("fc00::b"))]),
        ],
    );

    fl.replace_segs(vec![Segment::Node(addr("fc00::c")), Segment::Node(addr("fc00::d"))]);

    for p in fl.src_prefixes() {
        assert_eq!(p.segs.len(), 2);
        assert_eq!(p.segs[1].addr(), addr("fc00::d"));
    }
}

#[test]
fn test_flowstate_row_shape() {
    let fl = make_flow(
        60,
        vec![
            src_prefix(
                "fc00:a::1",
                vec![Segment::Node(addr("fc00::b")), Segment::Adjacency(addr("fc00:b::2"))],
            ),
            src_prefix("fc00:a::1", vec![Segment::Node(addr("fc00::b"))]),
        ],
    );
    let entry = fl.to_entry();

    let segments: Value = serde_json::from_str(&entry.segments).unwrap();
    assert_eq!(
        segments,
        serde_json::json!([["fc00::b", "fc00:b::2"], ["fc00::b"]])
    );

    let source_ips: Value = serde_json::from_str(&entry.source_ips).unwrap();
    assert_eq!(source_ips, serde_json::json!([[0, "2001:42::", 64], [0, "2001:42::", 64]]));

    let bsid: Value = serde_json::from_str(&entry.bsid).unwrap();
    assert_eq!(bsid, serde_json::json!(["fc00:a::1", "fc00:a::1"]));

    assert_eq!(entry.router, "A");
    assert_eq!(entry.bandwidth, 100);
    assert_eq!(entry.ttl, 60);
    assert_eq!(entry.status, FlowStatus::Active as i32);
}

#[test]
fn test_flowstate_row_round_trip() {
    let fl = make_flow(0, vec![src_prefix("fc00:a::1", vec![Segment::Node(addr("fc00::b"))])]);
    let entry = fl.to_entry();

    let json = serde_json::to_string(&entry).unwrap();
    let reparsed: FlowStateEntry = serde_json::from_str(&json).unwrap();

    assert_eq!(entry, reparsed);
    assert!(json.contains("\"sourceIPs\""));
    assert!(json.contains("\"_row\""));
}

#[test]
fn test_collect_dead_selects_expired_and_orphans() {
    let map = FlowMap::new();

    let active = make_flow(0, vec![src_prefix("fc00:a::1", vec![])]);
    let expired = make_flow(1, vec![src_prefix("fc00:a::2", vec![])]);
    let orphan = make_flow(0, vec![src_prefix("fc00:a::3", vec![])]);
    orphan.set_status(FlowStatus::Orphan);

    {
        let mut flows = map.write();
        flows.insert(addr("fc00:a::1"), active.clone());
        flows.insert(addr("fc00:a::2"), expired.clone());
        flows.insert(addr("fc00:a::3"), orphan.clone());
    }

    let dead = map.collect_dead(unix_now() + 10);

    assert_eq!(dead.len(), 2);
    assert!(dead.iter().any(|f| Arc::ptr_eq(f, &expired)));
    assert!(dead.iter().any(|f| Arc::ptr_eq(f, &orphan)));
    assert_eq!(map.len(), 1);
    assert!(map.read().contains_key(&addr("fc00:a::1")));
}

#[test]
fn test_snapshot_deduplicates_shared_bsids() {
    let map = FlowMap::new();
    let fl = make_flow(
        0,
        vec![src_prefix("fc00:a::1", vec![]), src_prefix("fc00:a::2", vec![])],
    );

    {
        let mut flows = map.write();
        for b in fl.bsids() {
            flows.insert(b, fl.clone());
        }
    }

    assert_eq!(map.len(), 2);
    assert_eq!(map.snapshot().len(), 1);
}
