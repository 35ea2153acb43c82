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

//! SRv6 segment representation

use std::fmt;
use std::net::Ipv6Addr;

/// # SRv6 Segment
///
/// One entry of a segment list. A node segment steers the packet to a router over the underlay's
/// own shortest paths; an adjacency segment forces the packet over one specific link. The
/// external representation is always an IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Steer to a node; the underlay chooses the hops
    Node(Ipv6Addr),
    /// Steer over one specific adjacency, identified by its remote endpoint address
    Adjacency(Ipv6Addr),
}

impl Segment {
    /// The IPv6 address representing this segment on the wire.
    pub fn addr(&self) -> Ipv6Addr {
        match self {
            Self::Node(a) => *a,
            Self::Adjacency(a) => *a,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr())
    }
}
