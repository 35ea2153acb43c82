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

//! End-to-end scenarios: a running controller fed over the state bus, playing the role of the
//! data plane and the DNS proxy.

use crate::config::Config;
use crate::controller::{Controller, ControllerHandle};
use crate::flow::FlowStatus;
use crate::net::Prefix;
use crate::rules::{Rule, RuleAction};
use crate::srdb::{FlowReqEntry, FlowReqStatus, LinkStateEntry, NodeStateEntry};
use serde_json::Value;
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn start_controller(rules: Vec<Rule>, defrule: Rule) -> ControllerHandle {
    let _ = pretty_env_logger::try_init();
    Controller::with_rules(Config::default(), rules, defrule).start()
}

fn node(name: &str, addr: &str, pbsid: &str, prefix: &str) -> NodeStateEntry {
    NodeStateEntry {
        name: name.to_string(),
        addr: addr.to_string(),
        pbsid: pbsid.to_string(),
        prefix: prefix.to_string(),
        ..Default::default()
    }
}

fn link(
    name1: &str,
    addr1: &str,
    name2: &str,
    addr2: &str,
    ava_bw: u32,
    delay: u32,
) -> LinkStateEntry {
    LinkStateEntry {
        name1: name1.to_string(),
        addr1: addr1.to_string(),
        name2: name2.to_string(),
        addr2: addr2.to_string(),
        bw: 1000,
        ava_bw,
        delay,
        metric: 1,
        ..Default::default()
    }
}

fn request(source: &str, dstaddr: &str, router: &str, bw: u32, delay: u32) -> FlowReqEntry {
    FlowReqEntry {
        destination: "svc.example".to_string(),
        dstaddr: dstaddr.to_string(),
        source: source.to_string(),
        bandwidth: bw,
        delay,
        router: router.to_string(),
        proxy: "proxy1".to_string(),
        request_id: "req-1".to_string(),
        status: FlowReqStatus::Pending as i32,
        ..Default::default()
    }
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

/// Publish routers A and B with one link, and wait until the topology went live.
fn seed_topology(ctl: &Arc<Controller>, ava_bw: u32, delay: u32) -> (String, String) {
    let db = ctl.db();
    let a = db
        .nodestate
        .insert_sync(node("A", "fc00::a", "fc00:a::/64", "2001:a::/64"))
        .unwrap();
    let b = db
        .nodestate
        .insert_sync(node("B", "fc00::b", "fc00:b::/64", "2001:b::/64"))
        .unwrap();

    // the link row references the routers by name; publish it only once both are registered
    assert!(wait_until(Duration::from_secs(5), || ctl.netstate().read().routers.len() == 2));
    db.linkstate
        .insert_sync(link("A", "fc00:ab::a", "B", "fc00:ab::b", ava_bw, delay))
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        let ns = ctl.netstate().read();
        ns.live.node_count() == 2 && ns.live.edge_count() == 2
    }));

    (a, b)
}

fn req_status(ctl: &Arc<Controller>, uuid: &str) -> Option<FlowReqStatus> {
    ctl.db().flowreq.get(uuid).and_then(|r| FlowReqStatus::from_i32(r.status))
}

fn wait_for_status(ctl: &Arc<Controller>, uuid: &str, status: FlowReqStatus) -> bool {
    wait_until(Duration::from_secs(5), || req_status(ctl, uuid) == Some(status))
}

#[test]
fn test_happy_path() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 1000, 10);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:b::1", "A", 100, 50))
        .unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::Allowed));

    let states = ctl.db().flowstate.snapshot();
    assert_eq!(states.len(), 1);
    let fe = &states[0];

    assert_eq!(fe.source, "app");
    assert_eq!(fe.router, "A");
    assert_eq!(fe.dstaddr, "2001:b::1");
    assert_eq!(fe.bandwidth, 100);
    assert_eq!(fe.delay, 50);
    assert_eq!(fe.status, FlowStatus::Active as i32);

    // one segment list steering over the node SID of B
    let segments: Value = serde_json::from_str(&fe.segments).unwrap();
    assert_eq!(segments, serde_json::json!([["fc00::b"]]));

    // the binding SID lies in A's allocation prefix
    let bsids: Vec<String> = serde_json::from_str(&fe.bsid).unwrap();
    assert_eq!(bsids.len(), 1);
    let bsid: Ipv6Addr = bsids[0].parse().unwrap();
    let pbsid: Prefix = "fc00:a::/64".parse().unwrap();
    assert!(pbsid.contains(&bsid));

    assert_eq!(ctl.flows().len(), 1);

    handle.shutdown();
}

#[test]
fn test_infeasible_bandwidth() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 50, 10);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:b::1", "A", 100, 50))
        .unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::Unavailable));
    assert!(ctl.db().flowstate.is_empty());
    assert!(ctl.flows().is_empty());

    handle.shutdown();
}

#[test]
fn test_delay_exceeded() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 1000, 60);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:b::1", "A", 100, 50))
        .unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::Unavailable));
    assert!(ctl.db().flowstate.is_empty());

    handle.shutdown();
}

#[test]
fn test_deny_by_rule() {
    let deny = Rule {
        src: "app".to_string(),
        dst: "*".to_string(),
        action: RuleAction::Deny,
        bw: 0,
        delay: 0,
        ttl: 0,
        idle: 0,
        via: Vec::new(),
    };
    let handle = start_controller(vec![deny], Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 1000, 10);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:b::1", "A", 100, 50))
        .unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::Denied));
    assert!(ctl.db().flowstate.is_empty());

    handle.shutdown();
}

#[test]
fn test_rule_bandwidth_override() {
    // the rule forces 2000 units of bandwidth although the request only asks for 100
    let wide = Rule {
        src: "*".to_string(),
        dst: "*".to_string(),
        action: RuleAction::Allow,
        bw: 2000,
        delay: 0,
        ttl: 0,
        idle: 0,
        via: Vec::new(),
    };
    let handle = start_controller(vec![wide], Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 1000, 10);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:b::1", "A", 100, 50))
        .unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::Unavailable));

    handle.shutdown();
}

#[test]
fn test_unknown_router() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 1000, 10);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:b::1", "Z", 100, 50))
        .unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::NoRouter));

    handle.shutdown();
}

#[test]
fn test_no_prefix_for_destination() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 1000, 10);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:c::1", "A", 100, 50))
        .unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::NoPrefix));

    handle.shutdown();
}

#[test]
fn test_node_without_prefixes_yields_no_prefix() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();

    let db = ctl.db();
    db.nodestate.insert_sync(node("A", "fc00::a", "fc00:a::/64", "2001:a::/64")).unwrap();
    // router B announces no prefix at all
    db.nodestate.insert_sync(node("B", "fc00::b", "fc00:b::/64", "")).unwrap();
    assert!(wait_until(Duration::from_secs(5), || ctl.netstate().read().routers.len() == 2));
    db.linkstate.insert_sync(link("A", "fc00:ab::a", "B", "fc00:ab::b", 1000, 10)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        ctl.netstate().read().live.node_count() == 2
    }));

    let uuid = db.flowreq.insert_sync(request("app", "2001:b::1", "A", 100, 50)).unwrap();

    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::NoPrefix));

    handle.shutdown();
}

#[test]
fn test_topology_change_orphans_flow() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    let (_, node_b) = seed_topology(&ctl, 1000, 10);

    let uuid = ctl
        .db()
        .flowreq
        .insert_sync(request("app", "2001:b::1", "A", 100, 50))
        .unwrap();
    assert!(wait_for_status(&ctl, &uuid, FlowReqStatus::Allowed));

    let fl_uuid = ctl.db().flowstate.snapshot()[0].row.clone();

    // drop router B; the flow loses its egress router, becomes an orphan during the
    // recomputation after the next promotion, and is expired by the garbage collector
    ctl.db().nodestate.delete(&node_b).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        ctl.netstate().read().live.node_count() == 1
    }));

    assert!(wait_until(Duration::from_secs(10), || {
        ctl.db()
            .flowstate
            .get(&fl_uuid)
            .map(|fe| fe.status == FlowStatus::Expired as i32)
            .unwrap_or(false)
    }));
    assert!(ctl.flows().is_empty());

    handle.shutdown();
}

#[test]
fn test_duplicate_router_row_is_ignored() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    let ctl = handle.controller().clone();
    seed_topology(&ctl, 1000, 10);

    // a second row announcing router A must not disturb the topology
    ctl.db()
        .nodestate
        .insert_sync(node("A", "fc00::aa", "fc00:aa::/64", "2001:aa::/64"))
        .unwrap();

    std::thread::sleep(Duration::from_millis(100));
    {
        let ns = ctl.netstate().read();
        assert_eq!(ns.routers.len(), 2);
        assert_eq!(ns.routers.get("A").map(|r| r.addr.to_string()), Some("fc00::a".to_string()));
        assert_eq!(ns.live.node_count(), 2);
    }

    handle.shutdown();
}

#[test]
fn test_shutdown_terminates_all_threads() {
    let handle = start_controller(Vec::new(), Rule::default_rule(RuleAction::Allow));
    // must return, not hang
    handle.shutdown();
}
