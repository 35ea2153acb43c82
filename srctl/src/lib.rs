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

#![deny(missing_docs)]

//! # SrCtl: An SRv6 Flow Controller with QoS-Aware Path Steering
//!
//! This is the control plane of an IPv6 Segment Routing deployment. A DNS proxy on the access
//! router intercepts AAAA queries and, before delivering the reply, asks this controller for an
//! SRv6 path satisfying the per-flow QoS requirements (bandwidth, delay) and for a Binding SID
//! the router installs to steer the traffic over that path. The controller maintains a live
//! topology from router and link state published by the data plane, serves flow requests
//! concurrently, and keeps installed flows up to date as the topology changes.
//!
//! ## Structure
//!
//! - **[`net`]**: The network model: the topology graph of [`Router`](net::Router) nodes and
//!   [`Link`](net::Link) edges, the longest-prefix-match index, and the
//!   [`NetState`](net::NetState) coordinating the mutable staging graph with the published
//!   immutable live snapshot.
//!
//! - **[`path`]**: The path engine. A [`PathSpec`](path::PathSpec) describes one request
//!   (endpoints, waypoints, feasibility prune, relaxation operator); the engine answers with an
//!   SRv6 segment list.
//!
//! - **[`flow`]**: The flow manager: admitted flows, their binding SIDs and segment lists, and
//!   the flow map used for BSID uniqueness.
//!
//! - **[`srdb`]**: The state bus client: typed tables, monitors with at-most-once change
//!   delivery, and synchronous transactions. The bus is the only transport between the proxy
//!   and the controller.
//!
//! - **[`rules`]**: The ordered first-match rule set gating every request.
//!
//! - **[`controller`]**: Ties everything together: the monitor threads, the bounded request
//!   queue with its worker pool, and the network monitor loop that promotes the staging graph
//!   and garbage-collects flows.
//!
//! ## Usage
//!
//! ```no_run
//! use srctl::config::Config;
//! use srctl::controller::Controller;
//! use srctl::Error;
//!
//! fn main() -> Result<(), Error> {
//!     let cfg = Config::load("srctl.conf")?;
//!     let handle = Controller::new(cfg)?.start();
//!     handle.join();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
mod error;
pub mod flow;
pub mod net;
pub mod path;
pub mod pipeline;
pub mod rules;
pub mod srdb;

mod test;

pub use error::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stopper, to check when to stop, or to send the stop command
#[derive(Clone, Debug, Default)]
pub struct Stopper {
    b: Arc<AtomicBool>,
}

impl Stopper {
    /// Create a new stopper
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the stop command.
    pub fn send_stop(&self) {
        self.b.store(true, Ordering::Relaxed);
    }

    /// Checks if the stop flag is set.
    pub fn is_stop(&self) -> bool {
        self.b.load(Ordering::Relaxed)
    }
}
