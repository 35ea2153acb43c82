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

//! Module containing the basic type definitions of the network model

use petgraph::prelude::*;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;
use thiserror::Error;

type IndexType = u32;
/// Router Identification (and index into the topology graph)
pub type RouterId = NodeIndex<IndexType>;
/// Link Identification (and index into the topology graph)
pub type LinkId = EdgeIndex<IndexType>;

/// An IPv6 prefix, written `addr/len`.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct Prefix {
    /// Network address of the prefix
    pub addr: Ipv6Addr,
    /// Prefix length in bits, `0..=128`
    pub len: u8,
}

impl Prefix {
    /// Create a new prefix. The address is kept as given, the host bits are only masked out when
    /// comparing or matching.
    pub fn new(addr: Ipv6Addr, len: u8) -> Self {
        Self { addr, len }
    }

    /// Bitmask covering the network part of the prefix.
    pub fn mask(&self) -> u128 {
        if self.len == 0 {
            0
        } else {
            u128::MAX << (128 - self.len as u32)
        }
    }

    /// The network address with all host bits cleared.
    pub fn network(&self) -> Ipv6Addr {
        Ipv6Addr::from(u128::from(self.addr) & self.mask())
    }

    /// Checks if the given address lies inside the prefix.
    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        u128::from(*addr) & self.mask() == u128::from(self.addr) & self.mask()
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self { addr: Ipv6Addr::UNSPECIFIED, len: 0 }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for Prefix {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '/');
        let addr = parts
            .next()
            .and_then(|a| a.parse::<Ipv6Addr>().ok())
            .ok_or_else(|| NetError::InvalidPrefix(s.to_string()))?;
        let len = parts
            .next()
            .and_then(|l| l.parse::<u8>().ok())
            .filter(|l| *l <= 128)
            .ok_or_else(|| NetError::InvalidPrefix(s.to_string()))?;
        Ok(Self { addr, len })
    }
}

/// Network state errors
#[derive(Error, Debug, PartialEq)]
pub enum NetError {
    /// A router with the same name is already registered
    #[error("Duplicate router entry `{0}`")]
    DuplicateRouter(String),
    /// The router name is not present in the router map
    #[error("Unknown router `{0}`")]
    UnknownRouter(String),
    /// A link with the same endpoint address pair already exists in the graph
    #[error("Duplicate link entry {0} -> {1}")]
    DuplicateLink(Ipv6Addr, Ipv6Addr),
    /// The link endpoint address pair is not present in the graph
    #[error("Unknown link {0} -> {1}")]
    UnknownLink(Ipv6Addr, Ipv6Addr),
    /// The node id does not exist in the graph
    #[error("Node {0:?} was not found in the topology")]
    NodeNotFound(RouterId),
    /// The string could not be parsed as an IPv6 prefix
    #[error("Cannot parse `{0}` as an IPv6 prefix")]
    InvalidPrefix(String),
    /// The string could not be parsed as an IPv6 address
    #[error("Cannot parse `{0}` as an IPv6 address")]
    InvalidAddress(String),
}
