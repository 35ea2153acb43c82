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

//! Row definitions of the monitored and written tables

use crate::srdb::Entry;
use serde::{Deserialize, Serialize};

/// Status column of a FlowReq row. The integer assignment is part of the contract between the
/// proxy and the controller and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowReqStatus {
    /// Request was not yet processed
    Pending = 0,
    /// Flow was created, the binding SID can be used
    Allowed = 1,
    /// A rule denies the flow
    Denied = 2,
    /// No feasible path exists in the current topology
    Unavailable = 3,
    /// The requesting router is unknown
    NoRouter = 4,
    /// No announced prefix covers the destination address
    NoPrefix = 5,
    /// Processing failed (allocation, commit, malformed request)
    Error = 6,
}

impl FlowReqStatus {
    /// Decode the status column.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Pending),
            1 => Some(Self::Allowed),
            2 => Some(Self::Denied),
            3 => Some(Self::Unavailable),
            4 => Some(Self::NoRouter),
            5 => Some(Self::NoPrefix),
            6 => Some(Self::Error),
            _ => None,
        }
    }
}

/// One router of the data plane, published by the routing daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStateEntry {
    /// Row UUID
    #[serde(rename = "_row")]
    pub row: String,
    /// Row version, bumped on every change
    #[serde(rename = "_version")]
    pub version: u64,
    /// Unique router name
    pub name: String,
    /// Routable address of the router
    pub addr: String,
    /// Binding SID allocation prefix, written `addr/len`
    pub pbsid: String,
    /// `;`-separated list of announced prefixes, each written `addr/len`
    pub prefix: String,
}

/// One link of the data plane, published by the routing daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkStateEntry {
    /// Row UUID
    #[serde(rename = "_row")]
    pub row: String,
    /// Row version, bumped on every change
    #[serde(rename = "_version")]
    pub version: u64,
    /// Name of the first endpoint router
    pub name1: String,
    /// Address of the first endpoint
    pub addr1: String,
    /// Name of the second endpoint router
    pub name2: String,
    /// Address of the second endpoint
    pub addr2: String,
    /// Total bandwidth
    pub bw: u32,
    /// Currently available bandwidth
    pub ava_bw: u32,
    /// Propagation delay
    pub delay: u32,
    /// IGP metric; zero means unconfigured
    pub metric: u32,
}

/// One flow request, inserted by the DNS proxy. The controller only ever writes the `status`
/// column back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowReqEntry {
    /// Row UUID
    #[serde(rename = "_row")]
    pub row: String,
    /// Row version, bumped on every change
    #[serde(rename = "_version")]
    pub version: u64,
    /// Requested destination name
    pub destination: String,
    /// Resolved destination address
    pub dstaddr: String,
    /// Requesting application name
    pub source: String,
    /// Requested bandwidth
    pub bandwidth: u32,
    /// Requested maximum delay
    pub delay: u32,
    /// Access router the request entered at
    pub router: String,
    /// Identity of the requesting proxy
    pub proxy: String,
    /// Proxy-local request identifier
    pub request_id: String,
    /// Request status, see [`FlowReqStatus`]
    pub status: i32,
}

/// One committed flow, written by the controller and consumed by the proxy and the routers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowStateEntry {
    /// Row UUID
    #[serde(rename = "_row")]
    pub row: String,
    /// Row version, bumped on every change
    #[serde(rename = "_version")]
    pub version: u64,
    /// Destination name of the flow
    pub destination: String,
    /// Source application name of the flow
    pub source: String,
    /// Resolved destination address
    pub dstaddr: String,
    /// Segment lists, one per source prefix, as JSON: list of lists of IPv6 strings
    pub segments: String,
    /// Source prefixes as JSON: list of `[priority, addr, prefix_len]`
    #[serde(rename = "sourceIPs")]
    pub source_ips: String,
    /// Binding SIDs, one per source prefix, as JSON: list of IPv6 strings
    pub bsid: String,
    /// Ingress router of the flow
    pub router: String,
    /// Identity of the requesting proxy
    pub proxy: String,
    /// Proxy-local request identifier
    pub request_id: String,
    /// Granted bandwidth
    pub bandwidth: u32,
    /// Granted maximum delay
    pub delay: u32,
    /// Flow lifetime in seconds, zero for unlimited
    pub ttl: u32,
    /// Idle timeout in seconds
    pub idle: u32,
    /// Creation time, seconds since the epoch
    pub timestamp: u64,
    /// Flow status
    pub status: i32,
}

macro_rules! impl_entry {
    ($ty:ident, $table:expr) => {
        impl Entry for $ty {
            const TABLE: &'static str = $table;

            fn row_id(&self) -> &str {
                &self.row
            }

            fn set_row_id(&mut self, id: String) {
                self.row = id;
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

impl_entry!(NodeStateEntry, "NodeState");
impl_entry!(LinkStateEntry, "LinkState");
impl_entry!(FlowReqEntry, "FlowReq");
impl_entry!(FlowStateEntry, "FlowState");
