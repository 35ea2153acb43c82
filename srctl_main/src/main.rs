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

use srctl::config::Config;
use srctl::controller::Controller;

use clap::Parser;
use log::*;
use std::process;

/// The SRv6 flow controller
#[derive(Parser, Debug)]
#[clap(name = "srctl")]
struct Args {
    /// Path to the controller configuration file
    #[clap(default_value = "srctl.conf")]
    config: String,

    /// Override the configured number of worker threads (0 = one per CPU)
    #[clap(short, long)]
    workers: Option<usize>,
}

fn main() {
    pretty_env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), srctl::Error> {
    let mut cfg = Config::load(&args.config)?;
    if let Some(workers) = args.workers {
        cfg.worker_threads = if workers == 0 { num_cpus::get() } else { workers };
    }

    info!(
        "controller starting: {} workers, {} providers",
        cfg.worker_threads,
        cfg.providers.len()
    );

    let handle = Controller::new(cfg)?.start();

    info!("controller running");

    // blocks until the state bus shuts down
    handle.join();

    Ok(())
}
