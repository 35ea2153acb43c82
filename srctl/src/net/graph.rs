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

//! # Topology graph
//!
//! Directed multigraph of [`Router`] nodes and [`Link`] edges. A node is identified by the
//! router name, an edge by the ordered pair of its endpoint addresses. The graph tracks a dirty
//! window (`dirty` flag plus modification timestamps) so that the network monitor can debounce a
//! storm of topology updates before promoting the staging graph to the live graph.
//!
//! The graph exposes [`deepcopy`](Topology::deepcopy), [`finalize`](Topology::finalize) (builds
//! the dense node ordering), [`build_cache`](Topology::build_cache) (adjacency lists used by the
//! path engine) and [`prune`](Topology::prune) (drops all edges matching a predicate, used to
//! apply per-request bandwidth feasibility before a path search).

use crate::net::{Link, LinkId, NetError, Router, RouterId};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Directed;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::Instant;

/// Identity of a directed edge, the ordered pair of endpoint addresses.
pub type LinkKey = (Ipv6Addr, Ipv6Addr);

/// # Topology
///
/// The graph of the monitored network. See the module documentation.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: StableGraph<Router, Link, Directed, u32>,
    names: HashMap<String, RouterId>,
    edges_by_key: HashMap<LinkKey, LinkId>,
    ord: Vec<RouterId>,
    ord_of: HashMap<RouterId, usize>,
    adj: Vec<Vec<LinkId>>,
    dirty: bool,
    last_mod: Instant,
    dirty_since: Instant,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// Generate an empty topology.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            graph: StableGraph::with_capacity(0, 0),
            names: HashMap::new(),
            edges_by_key: HashMap::new(),
            ord: Vec::new(),
            ord_of: HashMap::new(),
            adj: Vec::new(),
            dirty: false,
            last_mod: now,
            dirty_since: now,
        }
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of directed edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Add a router node. The router's `node_id` field is set to the new graph index, which is
    /// also returned. Name uniqueness is the caller's responsibility (the router map is the
    /// authoritative index).
    pub fn add_node(&mut self, router: Router) -> RouterId {
        let id = self.graph.add_node(router);
        self.graph[id].node_id = id;
        self.names.insert(self.graph[id].name.to_lowercase(), id);
        self.touch();
        id
    }

    /// Remove a node and all its incident edges, returning the router payload.
    pub fn remove_node(&mut self, id: RouterId) -> Option<Router> {
        let keys: Vec<LinkKey> = self
            .graph
            .edge_references()
            .filter(|e| e.source() == id || e.target() == id)
            .map(|e| e.weight().key())
            .collect();
        for key in keys {
            self.edges_by_key.remove(&key);
        }
        let removed = self.graph.remove_node(id);
        if let Some(rt) = &removed {
            self.names.remove(&rt.name.to_lowercase());
            self.touch();
        }
        removed
    }

    /// Add a directed edge carrying the given link. Rejects the edge if a link with the same
    /// endpoint address pair already exists anywhere in the graph.
    pub fn add_edge(&mut self, from: RouterId, to: RouterId, link: Link) -> Result<LinkId, NetError> {
        if self.edges_by_key.contains_key(&link.key()) {
            return Err(NetError::DuplicateLink(link.local, link.remote));
        }
        if !self.graph.contains_node(from) {
            return Err(NetError::NodeNotFound(from));
        }
        if !self.graph.contains_node(to) {
            return Err(NetError::NodeNotFound(to));
        }
        let key = link.key();
        let e = self.graph.add_edge(from, to, link);
        self.edges_by_key.insert(key, e);
        self.touch();
        Ok(e)
    }

    /// Add both directions of a bidirectional link between two nodes.
    pub fn add_edge_pair(&mut self, a: RouterId, b: RouterId, link: Link) -> Result<(), NetError> {
        let reverse = link.reversed();
        if self.edges_by_key.contains_key(&reverse.key()) {
            return Err(NetError::DuplicateLink(reverse.local, reverse.remote));
        }
        self.add_edge(a, b, link)?;
        self.add_edge(b, a, reverse)?;
        Ok(())
    }

    /// Remove both directions of a bidirectional link, identified by either direction's key.
    pub fn remove_edge_pair(&mut self, key: LinkKey) -> Result<(), NetError> {
        let fwd = self
            .edges_by_key
            .remove(&key)
            .ok_or_else(|| NetError::UnknownLink(key.0, key.1))?;
        self.graph.remove_edge(fwd);
        if let Some(rev) = self.edges_by_key.remove(&(key.1, key.0)) {
            self.graph.remove_edge(rev);
        }
        self.touch();
        Ok(())
    }

    /// Apply a mutation to both directions of a bidirectional link.
    pub fn update_edge_pair<F>(&mut self, key: LinkKey, f: F) -> Result<(), NetError>
    where
        F: Fn(&mut Link),
    {
        let fwd = *self.edges_by_key.get(&key).ok_or_else(|| NetError::UnknownLink(key.0, key.1))?;
        f(&mut self.graph[fwd]);
        if let Some(rev) = self.edges_by_key.get(&(key.1, key.0)).copied() {
            f(&mut self.graph[rev]);
        }
        self.touch();
        Ok(())
    }

    /// Get the router stored at the given node, if the node exists.
    pub fn node(&self, id: RouterId) -> Option<&Router> {
        self.graph.node_weight(id)
    }

    /// Resolve a node by id and verify that it still carries the named router. Returns `None`
    /// when the node is absent or the index was reused for a different router. This is the
    /// staleness guard for router handles resolved against an older graph generation.
    pub fn node_named(&self, id: RouterId, name: &str) -> Option<RouterId> {
        self.graph.node_weight(id).filter(|rt| rt.name.eq_ignore_ascii_case(name)).map(|_| id)
    }

    /// Resolve a node by router name (case-insensitive).
    pub fn node_by_name(&self, name: &str) -> Option<RouterId> {
        self.names.get(&name.to_lowercase()).copied()
    }

    /// Get the link stored under the given endpoint address pair.
    pub fn get_edge_data(&self, key: LinkKey) -> Option<&Link> {
        self.edges_by_key.get(&key).and_then(|e| self.graph.edge_weight(*e))
    }

    /// Get the link of a known edge index.
    pub fn link(&self, e: LinkId) -> &Link {
        &self.graph[e]
    }

    /// Endpoints of a known edge index.
    pub fn link_endpoints(&self, e: LinkId) -> Option<(RouterId, RouterId)> {
        self.graph.edge_endpoints(e)
    }

    /// Deep copy of the graph, sharing no mutable state with the original.
    pub fn deepcopy(&self) -> Self {
        self.clone()
    }

    /// Build the dense node ordering used by the path engine. Idempotent; must be re-run after
    /// nodes were added or removed.
    pub fn finalize(&mut self) {
        self.ord = self.graph.node_indices().collect();
        self.ord_of = self.ord.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    }

    /// Build the adjacency cache over the dense ordering. Requires [`finalize`](Self::finalize)
    /// to have run on the current node set.
    pub fn build_cache(&mut self) {
        debug_assert_eq!(self.ord.len(), self.graph.node_count());
        self.adj = self
            .ord
            .iter()
            .map(|id| self.graph.edges(*id).map(|e| e.id()).collect())
            .collect();
    }

    /// Remove every edge for which the predicate returns `true`. The adjacency cache is rebuilt
    /// if it was present. The node set (and thus the dense ordering) is left untouched.
    pub fn prune<F>(&mut self, pred: F)
    where
        F: Fn(&Link) -> bool,
    {
        let dead: Vec<LinkId> = self
            .graph
            .edge_references()
            .filter(|e| pred(e.weight()))
            .map(|e| e.id())
            .collect();
        for e in dead {
            if let Some(link) = self.graph.remove_edge(e) {
                self.edges_by_key.remove(&link.key());
            }
        }
        if !self.adj.is_empty() {
            self.build_cache();
        }
    }

    /// Number of entries in the dense node ordering.
    pub fn ord_count(&self) -> usize {
        self.ord.len()
    }

    /// Dense index of a node, if the graph is finalized and the node exists.
    pub fn ord_of(&self, id: RouterId) -> Option<usize> {
        self.ord_of.get(&id).copied()
    }

    /// Node at a dense index.
    pub fn node_at(&self, ord: usize) -> RouterId {
        self.ord[ord]
    }

    /// Outgoing edges of the node at a dense index. Empty when the cache was not built.
    pub fn out_edges(&self, ord: usize) -> &[LinkId] {
        self.adj.get(ord).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Checks whether the graph was modified since the dirty flag was last cleared.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, closing the current dirty window.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Time of the most recent mutation.
    pub fn last_mod(&self) -> Instant {
        self.last_mod
    }

    /// Time the current dirty window was opened.
    pub fn dirty_since(&self) -> Instant {
        self.dirty_since
    }

    fn touch(&mut self) {
        let now = Instant::now();
        if !self.dirty {
            self.dirty_since = now;
        }
        self.dirty = true;
        self.last_mod = now;
    }
}
