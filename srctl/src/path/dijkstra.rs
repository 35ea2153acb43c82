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

//! # Constrained Dijkstra
//!
//! Shortest-path search over a [`Topology`] with a pluggable relaxation operator. The operator
//! can veto an edge (by reporting a cost of `u32::MAX`) and can maintain arbitrary auxiliary
//! state along the relaxation, which is how the delay bound is enforced without changing the
//! optimization objective (the IGP metric).
//!
//! The graph must be finalized and its adjacency cache built.

use crate::net::{LinkId, RouterId, Topology};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Cost value marking an edge or node as unreachable.
pub const INFINITE: u32 = u32::MAX;

/// # Dijkstra relaxation operator
///
/// Capability interface consulted by [`shortest_path`]. `init` is invoked once per search,
/// `cost` for every candidate edge, and `update` whenever a relaxation through an edge was
/// accepted. Per-search state lives in the operator itself and is dropped with it.
pub trait DijkstraOp {
    /// Prepare the per-search state for a search starting at `src`.
    fn init(&mut self, g: &Topology, src: RouterId);

    /// Cost of the path reaching the edge's head with `cur_cost` and continuing over `edge`.
    /// Returning [`INFINITE`] marks the edge as infeasible.
    fn cost(&self, g: &Topology, edge: LinkId, cur_cost: u32) -> u32;

    /// Called after the relaxation over `edge` was accepted.
    fn update(&mut self, g: &Topology, edge: LinkId);
}

/// Plain IGP metric cost, the default operator.
#[derive(Debug, Default)]
pub struct MetricCost;

impl DijkstraOp for MetricCost {
    fn init(&mut self, _g: &Topology, _src: RouterId) {}

    fn cost(&self, g: &Topology, edge: LinkId, cur_cost: u32) -> u32 {
        cur_cost.saturating_add(g.link(edge).metric)
    }

    fn update(&mut self, _g: &Topology, _edge: LinkId) {}
}

/// # Delay-bound operator
///
/// Optimizes the IGP metric while keeping the accumulated propagation delay from the source
/// below a fixed bound. The operator tracks the best known delay per node and vetoes any edge
/// that would push the delay of its tail above the bound.
#[derive(Debug)]
pub struct DelayBelow {
    limit: u32,
    delay: HashMap<RouterId, u32>,
}

impl DelayBelow {
    /// Create an operator enforcing the given delay bound.
    pub fn new(limit: u32) -> Self {
        Self { limit, delay: HashMap::new() }
    }
}

impl DijkstraOp for DelayBelow {
    fn init(&mut self, g: &Topology, src: RouterId) {
        self.delay.clear();
        for ord in 0..g.ord_count() {
            self.delay.insert(g.node_at(ord), INFINITE);
        }
        self.delay.insert(src, 0);
    }

    fn cost(&self, g: &Topology, edge: LinkId, cur_cost: u32) -> u32 {
        let link = g.link(edge);
        // endpoints of a cached edge id always resolve
        let (local, _) = g.link_endpoints(edge).unwrap();
        let cur_delay = self.delay.get(&local).copied().unwrap_or(INFINITE);
        if cur_delay.saturating_add(link.delay) > self.limit {
            return INFINITE;
        }
        cur_cost.saturating_add(link.metric)
    }

    fn update(&mut self, g: &Topology, edge: LinkId) {
        let link = g.link(edge);
        let (local, remote) = g.link_endpoints(edge).unwrap();
        let cur_delay = self.delay.get(&local).copied().unwrap_or(INFINITE);
        self.delay.insert(remote, cur_delay.saturating_add(link.delay));
    }
}

/// A path through the topology: the visited nodes and the edge chosen for every hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Visited nodes, starting at the source and ending at the destination
    pub nodes: Vec<RouterId>,
    /// Chosen edges, one per hop (`edges.len() == nodes.len() - 1`)
    pub edges: Vec<LinkId>,
}

/// Compute the cheapest feasible path from `src` to `dst` under the given operator. Returns
/// `None` when `dst` is unreachable.
pub fn shortest_path(
    g: &Topology,
    src: RouterId,
    dst: RouterId,
    op: &mut dyn DijkstraOp,
) -> Option<Path> {
    let n = g.ord_count();
    let src_ord = g.ord_of(src)?;
    let dst_ord = g.ord_of(dst)?;

    op.init(g, src);

    let mut dist: Vec<u32> = vec![INFINITE; n];
    let mut prev: Vec<Option<(usize, LinkId)>> = vec![None; n];
    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();

    dist[src_ord] = 0;
    heap.push(Reverse((0, src_ord)));

    while let Some(Reverse((d, u))) = heap.pop() {
        if d > dist[u] {
            continue;
        }
        if u == dst_ord {
            break;
        }
        for &e in g.out_edges(u) {
            // cached edge ids always have endpoints
            let (_, to) = g.link_endpoints(e).unwrap();
            let v = g.ord_of(to)?;
            let c = op.cost(g, e, d);
            if c == INFINITE {
                continue;
            }
            if c < dist[v] {
                dist[v] = c;
                prev[v] = Some((u, e));
                heap.push(Reverse((c, v)));
                op.update(g, e);
            }
        }
    }

    if dist[dst_ord] == INFINITE && src_ord != dst_ord {
        return None;
    }

    // walk the predecessors back to the source
    let mut nodes = vec![g.node_at(dst_ord)];
    let mut edges = Vec::new();
    let mut cur = dst_ord;
    while let Some((p, e)) = prev[cur] {
        nodes.push(g.node_at(p));
        edges.push(e);
        cur = p;
    }
    nodes.reverse();
    edges.reverse();

    Some(Path { nodes, edges })
}

/// Metric distances from `src` to every node, indexed by the dense node ordering.
pub fn distances(g: &Topology, src: RouterId) -> Vec<u32> {
    let n = g.ord_count();
    let mut dist: Vec<u32> = vec![INFINITE; n];
    let src_ord = match g.ord_of(src) {
        Some(o) => o,
        None => return dist,
    };
    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    dist[src_ord] = 0;
    heap.push(Reverse((0, src_ord)));
    while let Some(Reverse((d, u))) = heap.pop() {
        if d > dist[u] {
            continue;
        }
        for &e in g.out_edges(u) {
            let (_, to) = g.link_endpoints(e).unwrap();
            let v = match g.ord_of(to) {
                Some(v) => v,
                None => continue,
            };
            let c = d.saturating_add(g.link(e).metric);
            if c != INFINITE && c < dist[v] {
                dist[v] = c;
                heap.push(Reverse((c, v)));
            }
        }
    }
    dist
}
