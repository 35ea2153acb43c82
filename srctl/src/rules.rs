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

//! # Rules engine
//!
//! An ordered list of rules matched against the `(source, destination)` pair of a flow request.
//! The first matching rule wins; when none matches, an implicit default rule applies. A rule
//! either denies the flow or allows it, possibly overriding the requested QoS values and forcing
//! the path through a list of waypoint routers.
//!
//! Rules are loaded from a line-based file:
//!
//! ```text
//! # comments and blank lines are skipped
//! deny  badapp *
//! allow *      *.video.example bw 10000 delay 30 ttl 600 via R1,R4
//! allow *      *
//! default deny
//! ```
//!
//! A pattern is either `*` (matches everything), `*suffix` (matches any name ending in the
//! suffix) or a literal name (matched ignoring case).

use crate::Error;
use itertools::Itertools;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Whether a rule admits or rejects matching flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Admit the flow
    Allow,
    /// Reject the flow
    Deny,
}

/// # Rule
///
/// One entry of the ordered rule set.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Pattern matched against the request source
    pub src: String,
    /// Pattern matched against the request destination
    pub dst: String,
    /// Admit or reject
    pub action: RuleAction,
    /// Bandwidth override; zero keeps the requested value
    pub bw: u32,
    /// Delay override; zero keeps the requested value
    pub delay: u32,
    /// Lifetime of admitted flows, zero for unlimited
    pub ttl: u32,
    /// Idle timeout of admitted flows
    pub idle: u32,
    /// Waypoint router names the path must visit in order
    pub via: Vec<String>,
}

impl Rule {
    /// The implicit rule applied when no explicit rule matches.
    pub fn default_rule(action: RuleAction) -> Self {
        Self {
            src: "*".to_string(),
            dst: "*".to_string(),
            action,
            bw: 0,
            delay: 0,
            ttl: 0,
            idle: 0,
            via: Vec::new(),
        }
    }

    /// Checks if this rule matches the given source and destination.
    pub fn matches(&self, src: &str, dst: &str) -> bool {
        pattern_match(&self.src, src) && pattern_match(&self.dst, dst)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            match self.action {
                RuleAction::Allow => "allow",
                RuleAction::Deny => "deny",
            },
            self.src,
            self.dst
        )?;
        if !self.via.is_empty() {
            write!(f, " via {}", self.via.iter().format(","))?;
        }
        Ok(())
    }
}

fn pattern_match(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.to_lowercase().ends_with(&suffix.to_lowercase());
    }
    pattern.eq_ignore_ascii_case(name)
}

/// Find the first rule matching the given source and destination.
pub fn match_rules<'a>(rules: &'a [Rule], src: &str, dst: &str) -> Option<&'a Rule> {
    rules.iter().find(|r| r.matches(src, dst))
}

/// Parse a single rule line (not a comment, not a `default` line).
pub fn parse_rule(line: &str) -> Result<Rule, Error> {
    let err = |msg: &str| Error::Rules(format!("{}: `{}`", msg, line));

    let mut tokens = line.split_whitespace();
    let action = match tokens.next() {
        Some("allow") => RuleAction::Allow,
        Some("deny") => RuleAction::Deny,
        _ => return Err(err("expected `allow` or `deny`")),
    };
    let src = tokens.next().ok_or_else(|| err("missing source pattern"))?.to_string();
    let dst = tokens.next().ok_or_else(|| err("missing destination pattern"))?.to_string();

    let mut rule = Rule { src, dst, action, bw: 0, delay: 0, ttl: 0, idle: 0, via: Vec::new() };

    while let Some(key) = tokens.next() {
        let value = tokens.next().ok_or_else(|| err("missing option value"))?;
        match key {
            "bw" => rule.bw = value.parse().map_err(|_| err("invalid bw"))?,
            "delay" => rule.delay = value.parse().map_err(|_| err("invalid delay"))?,
            "ttl" => rule.ttl = value.parse().map_err(|_| err("invalid ttl"))?,
            "idle" => rule.idle = value.parse().map_err(|_| err("invalid idle"))?,
            "via" => rule.via = value.split(',').map(str::to_string).collect(),
            _ => return Err(err("unknown option")),
        }
    }

    Ok(rule)
}

/// Load the ordered rule set and the default rule from a file.
pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<(Vec<Rule>, Rule), Error> {
    let file = File::open(path)?;
    let mut rules = Vec::new();
    let mut defrule = Rule::default_rule(RuleAction::Allow);

    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(action) = line.strip_prefix("default") {
            defrule = match action.trim() {
                "allow" => Rule::default_rule(RuleAction::Allow),
                "deny" => Rule::default_rule(RuleAction::Deny),
                other => {
                    return Err(Error::Rules(format!("invalid default action `{}`", other)))
                }
            };
            continue;
        }
        rules.push(parse_rule(line)?);
    }

    Ok((rules, defrule))
}
