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

//! # Flow manager
//!
//! A [`Flow`] is one admitted flow request: the granted QoS values, the resolved ingress and
//! egress routers, and one [`SrcPrefix`] per configured provider, each carrying a binding SID
//! and a segment list. The [`FlowMap`] indexes every flow under each of its binding SIDs, which
//! makes BSID uniqueness a simple map lookup during allocation.

use crate::net::Prefix;
use crate::path::Segment;
use crate::srdb::FlowStateEntry;
use rand::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Attempts of the rejection sampler before BSID allocation gives up.
pub const MAX_BSID_ATTEMPTS: usize = 64;

/// Lifecycle state of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    /// The flow is installed and usable
    Active = 0,
    /// The flow was expired by the garbage collector
    Expired = 1,
    /// The ingress or egress router left the topology; the garbage collector will expire it
    Orphan = 2,
}

/// Per-provider state of a flow: the source address block, the binding SID and the segment list
/// steering traffic of this source prefix.
#[derive(Debug, Clone)]
pub struct SrcPrefix {
    /// Source address block of the provider
    pub addr: Ipv6Addr,
    /// Prefix length of the source address block
    pub prefix_len: u8,
    /// Preference among the flow's source prefixes
    pub priority: i32,
    /// Egress router towards the provider
    pub router: String,
    /// Binding SID installed for this source prefix
    pub bsid: Ipv6Addr,
    /// Segment list attached to the binding SID
    pub segs: Vec<Segment>,
}

/// Mutable tail of a flow, guarded by the flow's own lock.
#[derive(Debug)]
struct FlowPaths {
    status: FlowStatus,
    src_prefixes: Vec<SrcPrefix>,
}

/// # Flow
///
/// One admitted flow. The identity and QoS values are immutable; the status and the per-provider
/// segment lists may change over the flow's lifetime (recomputation, orphaning, expiry) and are
/// guarded by an internal lock.
#[derive(Debug)]
pub struct Flow {
    /// Row UUID of the committed FlowState row
    pub uuid: String,
    /// Source application name
    pub src: String,
    /// Destination name
    pub dst: String,
    /// Identity of the requesting proxy
    pub proxy: String,
    /// Proxy-local request identifier
    pub request_id: String,
    /// Resolved destination address
    pub dstaddr: Ipv6Addr,
    /// Name of the ingress router
    pub srcrt: String,
    /// Name of the egress router covering the destination
    pub dstrt: String,
    /// Granted bandwidth
    pub bw: u32,
    /// Granted maximum delay
    pub delay: u32,
    /// Lifetime in seconds, zero for unlimited
    pub ttl: u32,
    /// Idle timeout in seconds
    pub idle: u32,
    /// Creation time, seconds since the epoch
    pub timestamp: u64,
    paths: Mutex<FlowPaths>,
}

impl Flow {
    /// Create an active flow with a fresh row UUID and the given per-provider prefixes.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src: String,
        dst: String,
        proxy: String,
        request_id: String,
        dstaddr: Ipv6Addr,
        srcrt: String,
        dstrt: String,
        bw: u32,
        delay: u32,
        ttl: u32,
        idle: u32,
        src_prefixes: Vec<SrcPrefix>,
    ) -> Self {
        Self {
            uuid: crate::srdb::random_uuid(),
            src,
            dst,
            proxy,
            request_id,
            dstaddr,
            srcrt,
            dstrt,
            bw,
            delay,
            ttl,
            idle,
            timestamp: unix_now(),
            paths: Mutex::new(FlowPaths { status: FlowStatus::Active, src_prefixes }),
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> FlowStatus {
        self.paths.lock().unwrap().status
    }

    /// Move the flow to a new lifecycle state.
    pub fn set_status(&self, status: FlowStatus) {
        self.paths.lock().unwrap().status = status;
    }

    /// Copy of the per-provider prefixes.
    pub fn src_prefixes(&self) -> Vec<SrcPrefix> {
        self.paths.lock().unwrap().src_prefixes.clone()
    }

    /// All distinct binding SIDs of this flow, in provider order.
    pub fn bsids(&self) -> Vec<Ipv6Addr> {
        let paths = self.paths.lock().unwrap();
        let mut bsids: Vec<Ipv6Addr> = Vec::new();
        for p in &paths.src_prefixes {
            if !bsids.contains(&p.bsid) {
                bsids.push(p.bsid);
            }
        }
        bsids
    }

    /// Replace the segment list of every source prefix with (a copy of) the given one.
    pub fn replace_segs(&self, segs: Vec<Segment>) {
        let mut paths = self.paths.lock().unwrap();
        for p in paths.src_prefixes.iter_mut() {
            p.segs = segs.clone();
        }
    }

    /// Checks if the flow has outlived its ttl at the given time.
    pub fn expired_at(&self, now: u64) -> bool {
        self.ttl > 0 && now > self.timestamp + u64::from(self.ttl)
    }

    /// JSON rendering of the segment lists: a list of lists of IPv6 strings.
    pub fn segments_json(&self) -> String {
        let paths = self.paths.lock().unwrap();
        let segs: Vec<Vec<String>> = paths
            .src_prefixes
            .iter()
            .map(|p| p.segs.iter().map(|s| s.addr().to_string()).collect())
            .collect();
        json!(segs).to_string()
    }

    /// JSON rendering of the source prefixes: a list of `[priority, addr, prefix_len]`.
    pub fn source_ips_json(&self) -> String {
        let paths = self.paths.lock().unwrap();
        let ips: Vec<serde_json::Value> = paths
            .src_prefixes
            .iter()
            .map(|p| json!([p.priority, p.addr.to_string(), p.prefix_len]))
            .collect();
        json!(ips).to_string()
    }

    /// JSON rendering of the binding SIDs: a list of IPv6 strings, one per source prefix.
    pub fn bsid_json(&self) -> String {
        let paths = self.paths.lock().unwrap();
        let bsids: Vec<String> =
            paths.src_prefixes.iter().map(|p| p.bsid.to_string()).collect();
        json!(bsids).to_string()
    }

    /// Render the full FlowState row of this flow.
    pub fn to_entry(&self) -> FlowStateEntry {
        FlowStateEntry {
            row: self.uuid.clone(),
            version: 0,
            destination: self.dst.clone(),
            source: self.src.clone(),
            dstaddr: self.dstaddr.to_string(),
            segments: self.segments_json(),
            source_ips: self.source_ips_json(),
            bsid: self.bsid_json(),
            router: self.srcrt.clone(),
            proxy: self.proxy.clone(),
            request_id: self.request_id.clone(),
            bandwidth: self.bw,
            delay: self.delay,
            ttl: self.ttl,
            idle: self.idle,
            timestamp: self.timestamp,
            status: self.status() as i32,
        }
    }
}

/// Seconds since the epoch.
pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Generate one binding SID from the router's allocation prefix: the network bits are taken
/// from the prefix, the remaining low bits are uniformly random.
pub fn generate_bsid(pbsid: &Prefix) -> Ipv6Addr {
    let mask = pbsid.mask();
    let network = u128::from(pbsid.addr) & mask;
    let suffix = thread_rng().gen::<u128>() & !mask;
    Ipv6Addr::from(network | suffix)
}

/// Generate a binding SID that is not yet present in the flow map. The caller must hold the
/// flow map write lock so that the returned BSID stays unique until it is inserted. Returns
/// `None` when the allocation prefix is exhausted ([`MAX_BSID_ATTEMPTS`] rejections).
pub fn generate_unique_bsid(
    pbsid: &Prefix,
    flows: &HashMap<Ipv6Addr, Arc<Flow>>,
) -> Option<Ipv6Addr> {
    for _ in 0..MAX_BSID_ATTEMPTS {
        let bsid = generate_bsid(pbsid);
        if !flows.contains_key(&bsid) {
            return Some(bsid);
        }
    }
    None
}

/// # Flow map
///
/// All installed flows, indexed under every binding SID they own.
#[derive(Debug, Default)]
pub struct FlowMap {
    inner: RwLock<HashMap<Ipv6Addr, Arc<Flow>>>,
}

impl FlowMap {
    /// Create an empty flow map.
    pub fn new() -> Self {
        Self { inner: RwLock::new(HashMap::new()) }
    }

    /// Acquire the flow map read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, HashMap<Ipv6Addr, Arc<Flow>>> {
        self.inner.read().unwrap()
    }

    /// Acquire the flow map write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, HashMap<Ipv6Addr, Arc<Flow>>> {
        self.inner.write().unwrap()
    }

    /// Number of binding SIDs installed.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Checks if no flow is installed.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of all distinct flows.
    pub fn snapshot(&self) -> Vec<Arc<Flow>> {
        let map = self.read();
        let mut seen: Vec<Arc<Flow>> = Vec::new();
        for fl in map.values() {
            if !seen.iter().any(|f| Arc::ptr_eq(f, fl)) {
                seen.push(fl.clone());
            }
        }
        seen
    }

    /// Remove and return every flow that outlived its ttl or was orphaned. Only the map surgery
    /// happens under the write lock; the caller performs the expiry transactions afterwards,
    /// outside the critical section.
    pub fn collect_dead(&self, now: u64) -> Vec<Arc<Flow>> {
        let mut map = self.write();
        let mut dead: Vec<Arc<Flow>> = Vec::new();
        for fl in map.values() {
            let gone = fl.expired_at(now) || fl.status() == FlowStatus::Orphan;
            if gone && !dead.iter().any(|f| Arc::ptr_eq(f, fl)) {
                dead.push(fl.clone());
            }
        }
        for fl in &dead {
            for bsid in fl.bsids() {
                map.remove(&bsid);
            }
        }
        dead
    }
}
