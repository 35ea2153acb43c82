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

//! # Network model
//!
//! The live view of the monitored network: the topology graph of routers and links, the
//! longest-prefix-match index from announced prefixes to routers, and the [`NetState`] that
//! coordinates the staging graph with the published live snapshot.

pub mod graph;
pub mod link;
pub mod lpm;
pub mod netstate;
pub mod router;
pub(crate) mod types;

pub use graph::{LinkKey, Topology};
pub use link::Link;
pub use lpm::LpmTree;
pub use netstate::{NetState, NsInner};
pub use router::Router;
pub use types::{LinkId, NetError, Prefix, RouterId};
