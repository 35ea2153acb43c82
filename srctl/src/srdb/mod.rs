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

//! # State bus client
//!
//! The shared configuration and state database is the only transport between the DNS proxy and
//! the controller. This module holds the client side of that contract: typed tables of rows
//! (each with an opaque row UUID and a version), synchronous insert and update transactions,
//! and monitors that deliver every row change at most once, tagged with one of the actions
//! `initial`, `insert`, `modify` or `delete`.
//!
//! A monitor is a plain blocking loop over a subscription channel; it terminates when the bus is
//! closed. Initial rows are snapshotted at subscription time under the table lock, so a change
//! is never delivered both as part of the snapshot and as a change event.

pub mod entry;

pub use entry::{FlowReqEntry, FlowReqStatus, FlowStateEntry, LinkStateEntry, NodeStateEntry};

use crate::config::DbConfig;
use rand::prelude::*;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use thiserror::Error;

/// State bus errors
#[derive(Error, Debug, PartialEq)]
pub enum DbError {
    /// The row UUID does not exist in the table
    #[error("No row with uuid `{0}` in table {1}")]
    NoSuchRow(String, &'static str),
    /// A row with the same UUID already exists in the table
    #[error("Row with uuid `{0}` already exists in table {1}")]
    DuplicateRow(String, &'static str),
}

/// Action tag of a monitored row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Row existed before the monitor started
    Initial,
    /// Row was inserted
    Insert,
    /// Row was modified
    Modify,
    /// Row was deleted
    Delete,
}

/// One monitored row change.
#[derive(Debug, Clone)]
pub struct Event<T> {
    /// What happened to the row
    pub action: Action,
    /// The row after the change (before the change for deletes)
    pub entry: T,
}

/// Which actions a monitor wants to receive.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSpec {
    /// Deliver the rows present at subscription time
    pub initial: bool,
    /// Deliver inserts
    pub insert: bool,
    /// Deliver modifications
    pub modify: bool,
    /// Deliver deletions
    pub delete: bool,
}

impl MonitorSpec {
    /// Monitor every action.
    pub fn all() -> Self {
        Self { initial: true, insert: true, modify: true, delete: true }
    }

    /// Monitor only the initial snapshot and inserts.
    pub fn inserts() -> Self {
        Self { initial: true, insert: true, modify: false, delete: false }
    }

    fn wants(&self, action: Action) -> bool {
        match action {
            Action::Initial => self.initial,
            Action::Insert => self.insert,
            Action::Modify => self.modify,
            Action::Delete => self.delete,
        }
    }
}

/// A table row type, tied to its table name.
pub trait Entry: Clone + Send + 'static {
    /// Name of the table holding rows of this type
    const TABLE: &'static str;

    /// The row UUID.
    fn row_id(&self) -> &str;
    /// Set the row UUID.
    fn set_row_id(&mut self, id: String);
    /// The row version.
    fn version(&self) -> u64;
    /// Set the row version.
    fn set_version(&mut self, version: u64);
}

/// # Table
///
/// One named table of the state bus, holding rows of a single type.
#[derive(Debug)]
pub struct Table<T: Entry> {
    rows: Mutex<HashMap<String, T>>,
    subs: Mutex<Vec<Sender<Event<T>>>>,
}

impl<T: Entry> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entry> Table<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), subs: Mutex::new(Vec::new()) }
    }

    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Checks if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Synchronously insert a row. A UUID is assigned unless the entry already carries one.
    /// Returns the row UUID. Subscribers are notified with an `insert` event.
    ///
    /// Notification happens under the rows lock, so a concurrent [`subscribe`](Self::subscribe)
    /// sees every row exactly once, either in its snapshot or as a change event.
    pub fn insert_sync(&self, mut entry: T) -> Result<String, DbError> {
        if entry.row_id().is_empty() {
            entry.set_row_id(random_uuid());
        }
        entry.set_version(1);
        let uuid = entry.row_id().to_string();

        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&uuid) {
            return Err(DbError::DuplicateRow(uuid, T::TABLE));
        }
        rows.insert(uuid.clone(), entry.clone());
        self.notify(Action::Insert, entry);
        Ok(uuid)
    }

    /// Synchronously update a row in place. The closure receives the current row; the version is
    /// bumped afterwards. Subscribers are notified with a `modify` event.
    pub fn update_sync<F>(&self, uuid: &str, f: F) -> Result<(), DbError>
    where
        F: FnOnce(&mut T),
    {
        let mut rows = self.rows.lock().unwrap();
        let entry = rows
            .get_mut(uuid)
            .ok_or_else(|| DbError::NoSuchRow(uuid.to_string(), T::TABLE))?;
        f(entry);
        entry.set_version(entry.version() + 1);
        let updated = entry.clone();
        self.notify(Action::Modify, updated);
        Ok(())
    }

    /// Delete a row, returning its last content. Subscribers are notified with a `delete` event.
    pub fn delete(&self, uuid: &str) -> Result<T, DbError> {
        let mut rows = self.rows.lock().unwrap();
        let removed =
            rows.remove(uuid).ok_or_else(|| DbError::NoSuchRow(uuid.to_string(), T::TABLE))?;
        self.notify(Action::Delete, removed.clone());
        Ok(removed)
    }

    /// Read a row by UUID.
    pub fn get(&self, uuid: &str) -> Option<T> {
        self.rows.lock().unwrap().get(uuid).cloned()
    }

    /// Copy of all rows.
    pub fn snapshot(&self) -> Vec<T> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    /// Subscribe to row changes. Returns the rows present at subscription time and the change
    /// event channel. The snapshot and the channel never overlap.
    pub fn subscribe(&self) -> (Vec<T>, Receiver<Event<T>>) {
        let rows = self.rows.lock().unwrap();
        let mut subs = self.subs.lock().unwrap();
        let (tx, rx) = channel();
        subs.push(tx);
        (rows.values().cloned().collect(), rx)
    }

    /// Drop all subscriptions, terminating every monitor of this table.
    pub fn close(&self) {
        self.subs.lock().unwrap().clear();
    }

    fn notify(&self, action: Action, entry: T) {
        let mut subs = self.subs.lock().unwrap();
        subs.retain(|tx| tx.send(Event { action, entry: entry.clone() }).is_ok());
    }
}

/// # State bus
///
/// The four tables the controller reads and writes.
#[derive(Debug)]
pub struct SrDb {
    /// Bus connection parameters (carried for the external transport; the in-process bus only
    /// validates them)
    pub conf: DbConfig,
    /// Routers published by the data plane
    pub nodestate: Table<NodeStateEntry>,
    /// Links published by the data plane
    pub linkstate: Table<LinkStateEntry>,
    /// Flow requests inserted by the proxy
    pub flowreq: Table<FlowReqEntry>,
    /// Flows committed by the controller
    pub flowstate: Table<FlowStateEntry>,
}

impl SrDb {
    /// Create a bus with four empty tables.
    pub fn new(conf: DbConfig) -> Self {
        Self {
            conf,
            nodestate: Table::new(),
            linkstate: Table::new(),
            flowreq: Table::new(),
            flowstate: Table::new(),
        }
    }

    /// Close every table, terminating all monitors.
    pub fn close_all(&self) {
        self.nodestate.close();
        self.linkstate.close();
        self.flowreq.close();
        self.flowstate.close();
    }
}

/// Run a monitor loop until the bus is closed. The initial snapshot is delivered first (when
/// requested), then `ready` is signalled, then change events are dispatched as they arrive.
pub fn run_monitor<T, F>(
    snapshot: Vec<T>,
    rx: Receiver<Event<T>>,
    spec: MonitorSpec,
    mut cb: F,
    ready: Sender<()>,
) where
    T: Entry,
    F: FnMut(Event<T>),
{
    if spec.initial {
        for entry in snapshot {
            cb(Event { action: Action::Initial, entry });
        }
    }
    let _ = ready.send(());
    while let Ok(event) = rx.recv() {
        if spec.wants(event.action) {
            cb(event);
        }
    }
}

/// Generate a random row UUID.
pub(crate) fn random_uuid() -> String {
    let mut bytes = [0u8; 16];
    thread_rng().fill(&mut bytes[..]);
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
