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

//! Router node payload of the topology graph

use crate::net::{Prefix, RouterId};
use petgraph::graph::NodeIndex;
use std::net::Ipv6Addr;

/// # Router
///
/// One physical router of the monitored network, created from a NodeState row. The router owns
/// the list of prefixes it announces, and the prefix from which binding SIDs for flows entering
/// at this router are allocated (`pbsid`). Routers are identified by their name, which is unique
/// in the network.
#[derive(Debug, Clone)]
pub struct Router {
    /// Unique router name
    pub name: String,
    /// Routable address of the router, used as its node SID
    pub addr: Ipv6Addr,
    /// Prefix reserved for binding SID allocation on this router
    pub pbsid: Prefix,
    /// Prefixes announced by this router
    pub prefixes: Vec<Prefix>,
    /// Graph node carrying this router
    pub node_id: RouterId,
}

impl Router {
    /// Create a new router. The `node_id` is invalid until the router is added to a graph.
    pub fn new(name: impl Into<String>, addr: Ipv6Addr, pbsid: Prefix) -> Self {
        Self { name: name.into(), addr, pbsid, prefixes: Vec::new(), node_id: NodeIndex::end() }
    }
}

impl PartialEq for Router {
    /// Routers are compared by name, ignoring case.
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for Router {}
