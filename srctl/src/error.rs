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

//! Module containing all error types

use crate::net::NetError;
use crate::srdb::DbError;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error while reading a configuration or rules file
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be parsed
    #[error("Configuration Error: {0}")]
    Config(String),
    /// The rules file could not be parsed
    #[error("Rules Error: {0}")]
    Rules(String),
    /// Error propagated from the state bus client
    #[error("State Bus Error: {0}")]
    Db(#[from] DbError),
    /// Error propagated from the network model
    #[error("Network Error: {0}")]
    Net(#[from] NetError),
}
