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

//! Link edge payload of the topology graph

use std::net::Ipv6Addr;

/// # Link
///
/// One direction of a physical link, created from a LinkState row. A bidirectional link is
/// represented by two directed edges carrying mirrored payloads. Links are identified by the
/// ordered pair of endpoint addresses `(local, remote)`.
#[derive(Debug, Clone)]
pub struct Link {
    /// Address of the local endpoint
    pub local: Ipv6Addr,
    /// Address of the remote endpoint
    pub remote: Ipv6Addr,
    /// Total bandwidth of the link
    pub bw: u32,
    /// Currently available bandwidth of the link
    pub ava_bw: u32,
    /// Propagation delay of the link
    pub delay: u32,
    /// IGP metric of the link. A metric of zero is stored as `u32::MAX`, which makes the link
    /// unusable for path computation until it is configured.
    pub metric: u32,
}

impl Link {
    /// Create one direction of a link. A zero metric is mapped to `u32::MAX`.
    pub fn new(local: Ipv6Addr, remote: Ipv6Addr, bw: u32, ava_bw: u32, delay: u32, metric: u32) -> Self {
        Self { local, remote, bw, ava_bw, delay, metric: if metric == 0 { u32::MAX } else { metric } }
    }

    /// The mirrored payload for the opposite direction.
    pub fn reversed(&self) -> Self {
        Self { local: self.remote, remote: self.local, ..*self }
    }

    /// Identity of this link direction.
    pub fn key(&self) -> (Ipv6Addr, Ipv6Addr) {
        (self.local, self.remote)
    }
}

impl PartialEq for Link {
    /// Links are compared by the ordered endpoint address pair.
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.remote == other.remote
    }
}

impl Eq for Link {}
