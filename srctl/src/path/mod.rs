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

//! # Path engine
//!
//! Turns a [`PathSpec`] into an SRv6 segment list. The search runs on a working copy of the
//! live topology: the copy is first pruned by the request's feasibility predicate (e.g. drop
//! every link with insufficient available bandwidth), then one constrained Dijkstra runs per leg
//! (source to first waypoint, waypoint to waypoint, last waypoint to destination), and finally
//! the concatenated path is compressed into the minimal segment list that still pins it down:
//! any sub-path the underlay would follow on its own collapses into a single node segment.

pub mod dijkstra;
pub mod segment;

pub use dijkstra::{distances, shortest_path, DelayBelow, DijkstraOp, MetricCost, Path};
pub use segment::Segment;

use crate::net::{RouterId, Topology};

/// # Path specification
///
/// Everything the path engine needs to know about one request: endpoints, ordered waypoints,
/// an optional pre-search prune pass over the working copy, and an optional relaxation
/// operator (the plain IGP metric is used when none is given).
pub struct PathSpec<'a> {
    /// Source node in the live graph
    pub src: RouterId,
    /// Destination node in the live graph
    pub dst: RouterId,
    /// Router names to visit in order between source and destination
    pub via: &'a [String],
    /// Feasibility prune applied to the working copy before the search
    pub prune: Option<Box<dyn Fn(&mut Topology) + 'a>>,
    /// Relaxation operator for the per-leg searches
    pub op: Option<Box<dyn DijkstraOp + 'a>>,
}

impl<'a> PathSpec<'a> {
    /// A plain specification: no waypoints, no prune, default operator.
    pub fn new(src: RouterId, dst: RouterId) -> Self {
        Self { src, dst, via: &[], prune: None, op: None }
    }
}

/// Compute the segment list realizing the given path specification on the live topology.
/// Returns `None` when any leg has no feasible path, or when a waypoint is unknown.
pub fn build_segpath(live: &Topology, spec: PathSpec<'_>) -> Option<Vec<Segment>> {
    let mut work = live.deepcopy();
    if let Some(prune) = &spec.prune {
        prune(&mut work);
    }

    let mut waypoints = vec![spec.src];
    for name in spec.via {
        waypoints.push(work.node_by_name(name)?);
    }
    waypoints.push(spec.dst);

    let mut op = spec.op.unwrap_or_else(|| Box::new(MetricCost));

    let mut full = Path { nodes: vec![spec.src], edges: Vec::new() };
    for leg in waypoints.windows(2) {
        let part = shortest_path(&work, leg[0], leg[1], op.as_mut())?;
        full.nodes.extend_from_slice(&part.nodes[1..]);
        full.edges.extend_from_slice(&part.edges);
    }

    if full.nodes.len() == 1 {
        // the destination is the entry router itself
        return Some(vec![Segment::Node(live.node(spec.dst)?.addr)]);
    }

    compress(live, &full)
}

/// Compress a path into segments. A maximal sub-path whose cost equals the underlay shortest
/// path distance between its ends collapses into the node segment of its last node; a single
/// chosen edge that the underlay would not take on its own becomes an adjacency segment.
/// Compression runs against the unpruned live topology, since the underlay routes on the full
/// topology no matter which links the request may use.
fn compress(live: &Topology, path: &Path) -> Option<Vec<Segment>> {
    let mut segs = Vec::new();
    let mut i = 0;
    while i + 1 < path.nodes.len() {
        let dist = distances(live, path.nodes[i]);

        let first = live.link(path.edges[i]);
        if dist[live.ord_of(path.nodes[i + 1])?] < first.metric {
            segs.push(Segment::Adjacency(first.remote));
            i += 1;
            continue;
        }

        let mut cum = 0u32;
        let mut best = i + 1;
        for k in i + 1..path.nodes.len() {
            cum = cum.saturating_add(live.link(path.edges[k - 1]).metric);
            if dist[live.ord_of(path.nodes[k])?] == cum {
                best = k;
            } else {
                break;
            }
        }

        segs.push(Segment::Node(live.node(path.nodes[best])?.addr));
        i = best;
    }
    Some(segs)
}
