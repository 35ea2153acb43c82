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

//! # Request pipeline queue
//!
//! A bounded blocking queue between the FlowReq monitor (single producer) and the worker
//! threads (multiple consumers). A `None` entry is the shutdown sentinel: one is pushed per
//! worker, and a worker exits when it pops one.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Bounded blocking queue with sentinel-based shutdown.
#[derive(Debug)]
pub struct ReqQueue<T> {
    buf: Mutex<VecDeque<Option<T>>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> ReqQueue<T> {
    /// Create a queue with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push an entry, blocking while the queue is full. `None` is the shutdown sentinel.
    pub fn push(&self, item: Option<T>) {
        let mut buf = self.buf.lock().unwrap();
        while buf.len() >= self.capacity {
            buf = self.not_full.wait(buf).unwrap();
        }
        buf.push_back(item);
        self.not_empty.notify_one();
    }

    /// Pop the oldest entry, blocking while the queue is empty. Returns `None` when the popped
    /// entry is the shutdown sentinel.
    pub fn pop(&self) -> Option<T> {
        let mut buf = self.buf.lock().unwrap();
        loop {
            if let Some(item) = buf.pop_front() {
                self.not_full.notify_one();
                return item;
            }
            buf = self.not_empty.wait(buf).unwrap();
        }
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.buf.lock().unwrap().len()
    }

    /// Checks if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
