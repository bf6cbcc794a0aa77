//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

mod config;
mod ctl;
mod mgmt;

use std::fs::OpenOptions;
use std::sync::Arc;

use clap::{App, Arg};
use config::Config;
use ctl::Collaborators;
use rina_rib::southbound::{ForwardingTable, LocalLowerFlowProvider, LowerFlowProvider, MemoryForwardingTable, MgmtSink};
use rina_rib::Rib;
use rina_utils::name::IpcpName;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging) {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(config.default_directive.parse().unwrap())
        .with_env_var(&config.env_filter_var)
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let matches = App::new("RINA RIB daemon")
        .version(clap::crate_version!())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    init_tracing(&config.logging);

    // Set panic handler to abort the process if any background task
    // panics (mirrors the daemon's all-or-nothing failure posture).
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    info!("starting up");

    let myname = IpcpName::new(config.ipcp_name.clone(), config.ipcp_instance.clone(), "", "");
    let rib = Rib::new(myname);

    let mgmt_fd = match OpenOptions::new()
        .read(true)
        .write(true)
        .open(&config.mgmt_fd_path)
    {
        Ok(fd) => fd,
        Err(error) => {
            error!(%error, path = %config.mgmt_fd_path, "failed to open management fd");
            std::process::exit(1);
        }
    };

    let mgmt_sink_fd = mgmt_fd.try_clone().expect("failed to clone management fd for writes");
    let table: Arc<dyn ForwardingTable> = Arc::new(MemoryForwardingTable::default());
    let sink: Arc<dyn MgmtSink> = Arc::new(mgmt::FdMgmtSink::new(mgmt_sink_fd));
    let provider: Arc<dyn LowerFlowProvider> = Arc::new(LocalLowerFlowProvider::default());
    let collab = Collaborators { provider, table: table.clone(), sink: sink.clone() };

    let ctl_rib = rib.clone();
    let ctl_collab = collab.clone();
    let ctl_socket_path = config.ctl_socket_path.clone();
    let ctl_thread = std::thread::Builder::new()
        .name("rina-ctl".to_owned())
        .spawn(move || {
            if let Err(error) = ctl::serve(ctl_rib, ctl_collab, &ctl_socket_path) {
                error!(%error, "control socket server exited");
            }
        })
        .expect("failed to spawn control socket thread");

    mgmt::run(rib, mgmt_fd, table, sink);

    let _ = ctl_thread.join();
}
