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

//! # Network state
//!
//! Holds the two topology graphs. Every topology update from the state bus lands in the
//! *staging* graph; path computation only ever reads the *live* graph, an immutable snapshot
//! promoted from staging after a quiescence window. Promotion deep-copies staging outside any
//! netstate lock, prepares the copy (finalize + adjacency cache), and swaps it in under the
//! netstate write lock, so a reader holding the read lock never observes a partially updated or
//! unprepared topology.
//!
//! Lock order: the netstate lock is always acquired before the staging lock.

use crate::net::{LpmTree, Router, Topology};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// State guarded by the netstate lock.
#[derive(Debug)]
pub struct NsInner {
    /// The immutable live topology snapshot. The identity of this `Arc` only ever changes under
    /// the netstate write lock.
    pub live: Arc<Topology>,
    /// All known routers, indexed by name
    pub routers: HashMap<String, Router>,
    /// Longest-prefix-match index from announced prefixes to the owning router's name
    pub prefixes: LpmTree<String>,
}

/// # Network state
///
/// See the module documentation.
#[derive(Debug)]
pub struct NetState {
    inner: RwLock<NsInner>,
    staging: RwLock<Topology>,
}

impl Default for NetState {
    fn default() -> Self {
        Self::new()
    }
}

impl NetState {
    /// Create an empty network state with empty live and staging graphs.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(NsInner {
                live: Arc::new(Topology::new()),
                routers: HashMap::new(),
                prefixes: LpmTree::new(),
            }),
            staging: RwLock::new(Topology::new()),
        }
    }

    /// Acquire the netstate read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, NsInner> {
        self.inner.read().unwrap()
    }

    /// Acquire the netstate write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, NsInner> {
        self.inner.write().unwrap()
    }

    /// The staging graph and its lock.
    pub fn staging(&self) -> &RwLock<Topology> {
        &self.staging
    }

    /// Checks whether the staging graph is dirty and the debounce window has passed: either no
    /// mutation arrived for `soft`, or the dirty window has been open for longer than `hard`.
    pub fn needs_sync(&self, soft: Duration, hard: Duration) -> bool {
        let staging = self.staging.read().unwrap();
        if !staging.is_dirty() {
            return false;
        }
        let now = Instant::now();
        now.duration_since(staging.last_mod()) > soft
            || now.duration_since(staging.dirty_since()) > hard
    }

    /// Promote the staging graph to the live graph. Returns `true` if a new snapshot was
    /// published, `false` if staging was not dirty. The previous live snapshot is released only
    /// after the netstate write lock has been dropped.
    pub fn sync(&self) -> bool {
        let copy = {
            let staging = self.staging.read().unwrap();
            if !staging.is_dirty() {
                return false;
            }
            staging.deepcopy()
        };

        let mut copy = copy;
        copy.finalize();
        copy.build_cache();

        let old = {
            let mut inner = self.inner.write().unwrap();
            std::mem::replace(&mut inner.live, Arc::new(copy))
        };
        drop(old);

        self.staging.write().unwrap().clear_dirty();

        true
    }
}
