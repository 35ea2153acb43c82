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

//! # Controller
//!
//! Ties the whole control plane together. The controller owns the state bus client, the rule
//! set, the network state and the flow map, and runs four groups of threads:
//!
//! - one monitor thread per table (NodeState, LinkState, FlowReq), started in that order, each
//!   only after the previous monitor finished its initial read, so the topology is known before
//!   the first request arrives;
//! - a pool of worker threads popping flow requests from the bounded queue;
//! - the network monitor loop, which promotes the staging graph after a quiescence window,
//!   recomputes installed flows after every promotion, and garbage-collects expired and
//!   orphaned flows;
//! - the callers' thread, which blocks in [`ControllerHandle::join`] until the bus is closed.
//!
//! Lock order, everywhere: netstate, then staging graph, then flow map. A synchronous bus
//! transaction is never issued while holding the flow map lock.

use crate::config::Config;
use crate::flow::{self, Flow, FlowMap, FlowStatus, SrcPrefix};
use crate::net::{Link, NetError, NetState, Prefix, Router, Topology};
use crate::path::{build_segpath, DelayBelow, PathSpec};
use crate::pipeline::ReqQueue;
use crate::rules::{self, match_rules, Rule, RuleAction};
use crate::srdb::{
    self, Action, DbError, Entry, Event, FlowReqEntry, FlowReqStatus, LinkStateEntry,
    MonitorSpec, NodeStateEntry, SrDb, Table,
};
use crate::{Error, Stopper};

use log::*;
use std::net::Ipv6Addr;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sleep between two iterations of the network monitor loop.
const NETMON_LOOP_SLEEP: Duration = Duration::from_millis(1);
/// Promote the staging graph after this much quiet time.
const GSYNC_SOFT_TIMEOUT: Duration = Duration::from_millis(5);
/// Promote the staging graph after this much total dirty time, regardless of churn.
const GSYNC_HARD_TIMEOUT: Duration = Duration::from_millis(50);
/// Period of the flow garbage collector.
const GC_FLOWS_TIMEOUT: Duration = Duration::from_millis(1000);

/// # Controller
///
/// See the module documentation.
#[derive(Debug)]
pub struct Controller {
    cfg: Config,
    rules: Vec<Rule>,
    defrule: Rule,
    db: Arc<SrDb>,
    ns: NetState,
    flows: FlowMap,
    queue: ReqQueue<FlowReqEntry>,
}

impl Controller {
    /// Create a controller from a configuration, loading the rule set from the configured rules
    /// file.
    pub fn new(cfg: Config) -> Result<Self, Error> {
        let (rules, defrule) = rules::load_rules(&cfg.rules_file)?;
        Ok(Self::with_rules(cfg, rules, defrule))
    }

    /// Create a controller with an explicit rule set.
    pub fn with_rules(cfg: Config, rules: Vec<Rule>, defrule: Rule) -> Self {
        let db = Arc::new(SrDb::new(cfg.db.clone()));
        let queue = ReqQueue::new(cfg.req_buffer_size);
        Self { cfg, rules, defrule, db, ns: NetState::new(), flows: FlowMap::new(), queue }
    }

    /// The state bus of this controller.
    pub fn db(&self) -> &Arc<SrDb> {
        &self.db
    }

    /// The network state of this controller.
    pub fn netstate(&self) -> &NetState {
        &self.ns
    }

    /// The flow map of this controller.
    pub fn flows(&self) -> &FlowMap {
        &self.flows
    }

    /// Spawn all controller threads. Blocks until every monitor finished its initial read.
    pub fn start(self) -> ControllerHandle {
        let ctl = Arc::new(self);
        let stop = Stopper::new();

        let workers: Vec<JoinHandle<()>> = (0..ctl.cfg.worker_threads)
            .map(|_| {
                let c = ctl.clone();
                thread::spawn(move || c.worker_loop())
            })
            .collect();

        let mut monitors = Vec::with_capacity(3);

        info!("starting NodeState monitor");
        let c = ctl.clone();
        monitors.push(spawn_monitor(&ctl.db.nodestate, MonitorSpec::all(), move |ev| {
            c.handle_nodestate(ev)
        }));

        info!("starting LinkState monitor");
        let c = ctl.clone();
        monitors.push(spawn_monitor(&ctl.db.linkstate, MonitorSpec::all(), move |ev| {
            c.handle_linkstate(ev)
        }));

        info!("starting FlowReq monitor");
        let c = ctl.clone();
        monitors.push(spawn_monitor(&ctl.db.flowreq, MonitorSpec::inserts(), move |ev| {
            c.queue.push(Some(ev.entry))
        }));

        let netmon = {
            let c = ctl.clone();
            let s = stop.clone();
            thread::spawn(move || c.netmon_loop(s))
        };

        ControllerHandle { ctl, monitors, workers, netmon: Some(netmon), stop }
    }

    fn worker_loop(&self) {
        loop {
            match self.queue.pop() {
                Some(req) => self.process_request(&req),
                None => break,
            }
        }
    }

    /// Apply one NodeState change to the network state. A bad row is logged and ignored.
    pub fn handle_nodestate(&self, event: Event<NodeStateEntry>) {
        let result = match event.action {
            Action::Initial | Action::Insert => self.insert_router(&event.entry),
            Action::Delete => self.remove_router(&event.entry),
            Action::Modify => {
                warn!("ignoring NodeState modification for router `{}`", event.entry.name);
                Ok(())
            }
        };
        if let Err(e) = result {
            error!("NodeState row {}: {}", event.entry.row, e);
        }
    }

    fn insert_router(&self, entry: &NodeStateEntry) -> Result<(), NetError> {
        let addr: Ipv6Addr = entry
            .addr
            .parse()
            .map_err(|_| NetError::InvalidAddress(entry.addr.clone()))?;
        let pbsid: Prefix =
            if entry.pbsid.is_empty() { Prefix::default() } else { entry.pbsid.parse()? };

        let mut ns = self.ns.write();
        if ns.routers.contains_key(&entry.name) {
            return Err(NetError::DuplicateRouter(entry.name.clone()));
        }

        let mut rt = Router::new(entry.name.clone(), addr, pbsid);
        for pref in entry.prefix.split(';').filter(|p| !p.is_empty()) {
            match pref.parse::<Prefix>() {
                Ok(p) => rt.prefixes.push(p),
                Err(_) => warn!("skipping invalid prefix `{}` on router `{}`", pref, entry.name),
            }
        }
        for p in &rt.prefixes {
            ns.prefixes.insert(p.addr, p.len, rt.name.clone());
        }

        {
            let mut staging = self.ns.staging().write().unwrap();
            rt.node_id = staging.add_node(rt.clone());
        }

        debug!("registered router `{}` ({})", rt.name, rt.addr);
        ns.routers.insert(rt.name.clone(), rt);
        Ok(())
    }

    fn remove_router(&self, entry: &NodeStateEntry) -> Result<(), NetError> {
        let mut ns = self.ns.write();
        let rt = ns
            .routers
            .remove(&entry.name)
            .ok_or_else(|| NetError::UnknownRouter(entry.name.clone()))?;
        for p in &rt.prefixes {
            ns.prefixes.remove(p.addr, p.len);
        }

        let mut staging = self.ns.staging().write().unwrap();
        if staging.remove_node(rt.node_id).is_none() {
            return Err(NetError::NodeNotFound(rt.node_id));
        }
        debug!("unregistered router `{}`", rt.name);
        Ok(())
    }

    /// Apply one LinkState change to the network state. A bad row is logged and ignored.
    pub fn handle_linkstate(&self, event: Event<LinkStateEntry>) {
        let result = match event.action {
            Action::Initial | Action::Insert => self.insert_link(&event.entry),
            Action::Modify => self.update_link(&event.entry),
            Action::Delete => self.remove_link(&event.entry),
        };
        if let Err(e) = result {
            error!("LinkState row {}: {}", event.entry.row, e);
        }
    }

    fn link_addrs(entry: &LinkStateEntry) -> Result<(Ipv6Addr, Ipv6Addr), NetError> {
        let addr1 = entry
            .addr1
            .parse()
            .map_err(|_| NetError::InvalidAddress(entry.addr1.clone()))?;
        let addr2 = entry
            .addr2
            .parse()
            .map_err(|_| NetError::InvalidAddress(entry.addr2.clone()))?;
        Ok((addr1, addr2))
    }

    fn insert_link(&self, entry: &LinkStateEntry) -> Result<(), NetError> {
        let (addr1, addr2) = Self::link_addrs(entry)?;
        let link = Link::new(addr1, addr2, entry.bw, entry.ava_bw, entry.delay, entry.metric);

        let ns = self.ns.read();
        let rt1 = ns
            .routers
            .get(&entry.name1)
            .ok_or_else(|| NetError::UnknownRouter(entry.name1.clone()))?;
        let rt2 = ns
            .routers
            .get(&entry.name2)
            .ok_or_else(|| NetError::UnknownRouter(entry.name2.clone()))?;

        let mut staging = self.ns.staging().write().unwrap();
        staging.add_edge_pair(rt1.node_id, rt2.node_id, link)?;
        debug!("registered link {} <-> {}", addr1, addr2);
        Ok(())
    }

    fn update_link(&self, entry: &LinkStateEntry) -> Result<(), NetError> {
        let (addr1, addr2) = Self::link_addrs(entry)?;
        let (bw, ava_bw, delay) = (entry.bw, entry.ava_bw, entry.delay);
        let metric = if entry.metric == 0 { u32::MAX } else { entry.metric };

        let mut staging = self.ns.staging().write().unwrap();
        staging.update_edge_pair((addr1, addr2), |l| {
            l.bw = bw;
            l.ava_bw = ava_bw;
            l.delay = delay;
            l.metric = metric;
        })
    }

    fn remove_link(&self, entry: &LinkStateEntry) -> Result<(), NetError> {
        let (addr1, addr2) = Self::link_addrs(entry)?;

        let mut staging = self.ns.staging().write().unwrap();
        staging.remove_edge_pair((addr1, addr2))?;
        debug!("unregistered link {} <-> {}", addr1, addr2);
        Ok(())
    }

    /// Process one flow request: match the rule set, resolve the routers, compute the segment
    /// path, allocate the binding SIDs, commit the flow and answer the request status.
    pub fn process_request(&self, req: &FlowReqEntry) {
        if req.status != FlowReqStatus::Pending as i32 {
            return;
        }

        let rule = match_rules(&self.rules, &req.source, &req.destination).unwrap_or(&self.defrule);
        if rule.action == RuleAction::Deny {
            self.set_flowreq_status(req, FlowReqStatus::Denied);
            return;
        }

        let dstaddr: Ipv6Addr = match req.dstaddr.parse() {
            Ok(a) => a,
            Err(_) => {
                error!("invalid destination address `{}` in request {}", req.dstaddr, req.row);
                self.set_flowreq_status(req, FlowReqStatus::Error);
                return;
            }
        };

        // the rule values override the requested ones when set
        let bw = if rule.bw != 0 { rule.bw } else { req.bandwidth };
        let delay = if rule.delay != 0 { rule.delay } else { req.delay };

        // the netstate read lock is held for the entire flow creation
        let ns = self.ns.read();

        let rt = match ns.routers.get(&req.router) {
            Some(rt) => rt,
            None => {
                self.set_flowreq_status(req, FlowReqStatus::NoRouter);
                return;
            }
        };
        let dstrt = match ns.prefixes.lookup(&dstaddr).and_then(|name| ns.routers.get(name)) {
            Some(rt) => rt,
            None => {
                self.set_flowreq_status(req, FlowReqStatus::NoPrefix);
                return;
            }
        };

        // A router freshly inserted in the netstate may still be missing from the live graph
        // until the next promotion. Such a request cannot be served yet.
        let live = &ns.live;
        let nodes = (
            live.node_named(rt.node_id, &rt.name),
            live.node_named(dstrt.node_id, &dstrt.name),
        );
        let (src_node, dst_node) = match nodes {
            (Some(s), Some(d)) => (s, d),
            _ => {
                self.set_flowreq_status(req, FlowReqStatus::Unavailable);
                return;
            }
        };

        let mut prefixes = self.select_providers();
        if prefixes.is_empty() {
            self.set_flowreq_status(req, FlowReqStatus::Error);
            return;
        }

        let mut pspec = PathSpec::new(src_node, dst_node);
        pspec.via = &rule.via;
        if bw > 0 {
            pspec.prune = Some(Box::new(move |g: &mut Topology| g.prune(|l| l.ava_bw < bw)));
        }
        if delay > 0 {
            pspec.op = Some(Box::new(DelayBelow::new(delay)));
        }

        let segs = match build_segpath(live, pspec) {
            Some(segs) if !segs.is_empty() => segs,
            _ => {
                self.set_flowreq_status(req, FlowReqStatus::Unavailable);
                return;
            }
        };

        // BSID allocation and publication happen under the flow map write lock; any status
        // transaction waits until the lock is dropped
        let fl = {
            let mut flows = self.flows.write();
            match flow::generate_unique_bsid(&rt.pbsid, &flows) {
                Some(bsid) => {
                    // the destination router is resolved, so every provider shares the
                    // primary BSID
                    for p in prefixes.iter_mut() {
                        p.bsid = bsid;
                        p.segs = segs.clone();
                    }
                    let fl = Arc::new(Flow::new(
                        req.source.clone(),
                        req.destination.clone(),
                        req.proxy.clone(),
                        req.request_id.clone(),
                        dstaddr,
                        rt.name.clone(),
                        dstrt.name.clone(),
                        bw,
                        delay,
                        rule.ttl,
                        rule.idle,
                        prefixes,
                    ));
                    for b in fl.bsids() {
                        flows.insert(b, fl.clone());
                    }
                    Some(fl)
                }
                None => None,
            }
        };
        let fl = match fl {
            Some(fl) => fl,
            None => {
                error!("binding SID space of router `{}` is exhausted", rt.name);
                self.set_flowreq_status(req, FlowReqStatus::Error);
                return;
            }
        };

        if let Err(e) = self.commit_flow(&fl) {
            error!("failed to commit flow {}: {}", fl.uuid, e);
            let mut flows = self.flows.write();
            for b in fl.bsids() {
                flows.remove(&b);
            }
            drop(flows);
            self.set_flowreq_status(req, FlowReqStatus::Error);
            return;
        }

        debug!("committed flow {} for request {}", fl.uuid, req.row);
        self.set_flowreq_status(req, FlowReqStatus::Allowed);
    }

    /// One source prefix per configured provider. Reachability of the destination through a
    /// provider is not checked; this is the policy point a smarter selection would plug into.
    fn select_providers(&self) -> Vec<SrcPrefix> {
        self.cfg
            .providers
            .iter()
            .map(|p| SrcPrefix {
                addr: p.addr,
                prefix_len: p.prefix_len,
                priority: p.priority,
                router: p.router.clone(),
                bsid: Ipv6Addr::UNSPECIFIED,
                segs: Vec::new(),
            })
            .collect()
    }

    fn set_flowreq_status(&self, req: &FlowReqEntry, status: FlowReqStatus) {
        if let Err(e) = self.db.flowreq.update_sync(&req.row, |r| r.status = status as i32) {
            error!("failed to update row uuid {} to status {:?}: {}", req.row, status, e);
        }
    }

    fn set_flow_status(&self, fl: &Flow, status: FlowStatus) {
        fl.set_status(status);
        if let Err(e) = self.db.flowstate.update_sync(&fl.uuid, |r| r.status = status as i32) {
            error!("failed to update flow {} to status {:?}: {}", fl.uuid, status, e);
        }
    }

    fn commit_flow(&self, fl: &Flow) -> Result<(), DbError> {
        self.db.flowstate.insert_sync(fl.to_entry()).map(|_| ())
    }

    fn recompute_flow(&self, fl: &Flow) {
        let ns = self.ns.read();
        let live = &ns.live;

        let nodes = (live.node_by_name(&fl.srcrt), live.node_by_name(&fl.dstrt));
        let (src, dst) = match nodes {
            (Some(s), Some(d)) => (s, d),
            _ => {
                info!("flow {} lost its routers, orphaning", fl.uuid);
                fl.set_status(FlowStatus::Orphan);
                return;
            }
        };

        let segs = match build_segpath(live, PathSpec::new(src, dst)) {
            Some(segs) if !segs.is_empty() => segs,
            _ => return,
        };
        fl.replace_segs(segs);

        let segments = fl.segments_json();
        if let Err(e) = self.db.flowstate.update_sync(&fl.uuid, move |r| r.segments = segments) {
            error!("failed to commit recomputed segments for flow {}: {}", fl.uuid, e);
        }
    }

    fn recompute_flows(&self) {
        for fl in self.flows.snapshot() {
            self.recompute_flow(&fl);
        }
    }

    fn gc_flows(&self) {
        // Expiry updates are synchronous bus transactions and must never run under the flow
        // map lock; the dead flows are unlinked first, then expired outside the critical
        // section.
        let dead = self.flows.collect_dead(flow::unix_now());
        for fl in dead {
            info!("expiring flow {}", fl.uuid);
            self.set_flow_status(&fl, FlowStatus::Expired);
        }
    }

    fn netmon_loop(&self, stop: Stopper) {
        let mut gc_last = Instant::now();
        while !stop.is_stop() {
            let now = Instant::now();

            if now.duration_since(gc_last) > GC_FLOWS_TIMEOUT {
                self.gc_flows();
                gc_last = now;
            }

            if self.ns.needs_sync(GSYNC_SOFT_TIMEOUT, GSYNC_HARD_TIMEOUT) && self.ns.sync() {
                debug!("promoted staging graph to live");
                self.recompute_flows();
            }

            thread::sleep(NETMON_LOOP_SLEEP);
        }
    }
}

/// Subscribe to a table and run the monitor on its own thread. Blocks until the monitor
/// finished delivering the initial snapshot; this is what orders NodeState before LinkState
/// before FlowReq at startup.
fn spawn_monitor<T, F>(table: &Table<T>, spec: MonitorSpec, cb: F) -> JoinHandle<()>
where
    T: Entry,
    F: FnMut(Event<T>) + Send + 'static,
{
    let (snapshot, rx) = table.subscribe();
    let (ready_tx, ready_rx) = mpsc::channel();
    let handle = thread::spawn(move || srdb::run_monitor(snapshot, rx, spec, cb, ready_tx));
    let _ = ready_rx.recv();
    handle
}

/// Running controller: the spawned threads and the stop signal of the network monitor.
#[derive(Debug)]
pub struct ControllerHandle {
    ctl: Arc<Controller>,
    monitors: Vec<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    netmon: Option<JoinHandle<()>>,
    stop: Stopper,
}

impl ControllerHandle {
    /// The running controller.
    pub fn controller(&self) -> &Arc<Controller> {
        &self.ctl
    }

    /// Block until the state bus is closed, then tear down the workers and the network
    /// monitor.
    pub fn join(mut self) {
        for m in self.monitors.drain(..) {
            let _ = m.join();
        }
        self.teardown();
    }

    /// Close the state bus and tear down all controller threads.
    pub fn shutdown(mut self) {
        self.ctl.db.close_all();
        for m in self.monitors.drain(..) {
            let _ = m.join();
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        for _ in 0..self.workers.len() {
            self.ctl.queue.push(None);
        }
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
        self.stop.send_stop();
        if let Some(netmon) = self.netmon.take() {
            let _ = netmon.join();
        }
    }
}
