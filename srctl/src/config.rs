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

//! # Controller configuration
//!
//! Line-based key/value configuration file:
//!
//! ```text
//! ovsdb_client "ovsdb-client"
//! ovsdb_server "tcp:[::1]:6640"
//! ovsdb_database "SR_test"
//! ntransacts 2
//! rules_file "rules.conf"
//! worker_threads 4
//! req_buffer_size 16
//! providers upstream1 2001:a::/48 via R1 upstream2 2001:b::/48 via R2
//! ```
//!
//! Unknown keys are rejected. When no provider is configured, the implicit `internal` provider
//! (`::/0`, no router) is used.

use crate::net::Prefix;
use crate::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv6Addr;
use std::path::Path;

/// Connection parameters of the shared state database.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    /// Client binary or connection helper
    pub client: String,
    /// Server URL
    pub server: String,
    /// Database name
    pub database: String,
    /// Number of parallel transaction handlers, at least 1
    pub ntransacts: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            client: "ovsdb-client".to_string(),
            server: "tcp:[::1]:6640".to_string(),
            database: "SR_test".to_string(),
            ntransacts: 1,
        }
    }
}

/// One configured upstream egress. Every committed flow carries one source prefix per provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    /// Provider name
    pub name: String,
    /// Source address block of the provider
    pub addr: Ipv6Addr,
    /// Prefix length of the source address block
    pub prefix_len: u8,
    /// Egress router towards the provider
    pub router: String,
    /// Preference among the flow's source prefixes
    pub priority: i32,
}

impl Provider {
    /// The implicit provider used when none is configured.
    pub fn internal() -> Self {
        Self {
            name: "internal".to_string(),
            addr: Ipv6Addr::UNSPECIFIED,
            prefix_len: 0,
            router: String::new(),
            priority: 0,
        }
    }
}

/// # Controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the rules file
    pub rules_file: String,
    /// State database connection parameters
    pub db: DbConfig,
    /// Number of flow request worker threads, at least 1
    pub worker_threads: usize,
    /// Capacity of the flow request queue, at least 1
    pub req_buffer_size: usize,
    /// Configured providers
    pub providers: Vec<Provider>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_file: "rules.conf".to_string(),
            db: DbConfig::default(),
            worker_threads: 1,
            req_buffer_size: 16,
            providers: vec![Provider::internal()],
        }
    }
}

impl Config {
    /// Load the configuration from a file, starting from the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        let mut cfg = Self::default();

        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match split_key_value(line) {
                Some(kv) => kv,
                None => return Err(Error::Config(format!("unknown line `{}`", line))),
            };
            match key {
                "ovsdb_client" => cfg.db.client = unquote(value).to_string(),
                "ovsdb_server" => cfg.db.server = unquote(value).to_string(),
                "ovsdb_database" => cfg.db.database = unquote(value).to_string(),
                "ntransacts" => cfg.db.ntransacts = parse_clamped(key, value)?,
                "rules_file" => cfg.rules_file = unquote(value).to_string(),
                "worker_threads" => cfg.worker_threads = parse_clamped(key, value)?,
                "req_buffer_size" => cfg.req_buffer_size = parse_clamped(key, value)?,
                "providers" => cfg.providers = parse_providers(value)?,
                _ => return Err(Error::Config(format!("unknown line `{}`", line))),
            }
        }

        Ok(cfg)
    }
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let key = parts.next()?;
    let value = parts.next()?.trim();
    Some((key, value))
}

fn unquote(value: &str) -> &str {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}

fn parse_clamped(key: &str, value: &str) -> Result<usize, Error> {
    let n: usize = value
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: `{}`", key, value)))?;
    Ok(n.max(1))
}

/// Parse the provider list: groups of `<name> <addr>/<len> via <router>`.
fn parse_providers(value: &str) -> Result<Vec<Provider>, Error> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 4 != 0 {
        return Err(Error::Config(format!("malformed provider list `{}`", value)));
    }

    let mut providers = Vec::new();
    for group in tokens.chunks(4) {
        let prefix: Prefix = group[1]
            .parse()
            .map_err(|_| Error::Config(format!("invalid provider prefix `{}`", group[1])))?;
        if group[2] != "via" {
            return Err(Error::Config(format!("expected `via` in provider list `{}`", value)));
        }
        providers.push(Provider {
            name: group[0].to_string(),
            addr: prefix.addr,
            prefix_len: prefix.len,
            router: group[3].to_string(),
            priority: 0,
        });
    }

    Ok(providers)
}
