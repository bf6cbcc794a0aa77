//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The management I/O event loop: a single thread reading framed PDUs
//! off the management file descriptor, decoding the CDAP payload, and
//! dispatching it through the RIB's handler table. Runs alongside the
//! periodic 10-second sweep on the same thread, interleaving blocking
//! reads with timer callbacks the way rlite's uipcp event loop
//! interleaves `poll()` wakeups with timers.

use std::fs::File;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rina_cdap::{CdapCodec, JsonCdapCodec};
use rina_rib::rib::{self, PERIODIC_INTERVAL};
use rina_rib::southbound::{ForwardingTable, MgmtSink};
use rina_rib::Rib;
use rina_utils::Addr;
use rina_utils::mgmt::MAX_FRAME_LEN;
use tracing::{info, warn};

/// Writes framed PDUs straight back out the management fd, addressed by
/// local port-id the way the kernel keys an outbound management write.
/// The fd is behind a mutex since both the event-loop thread and
/// enrollment worker threads can write to it concurrently.
pub struct FdMgmtSink {
    fd: Mutex<File>,
}

impl FdMgmtSink {
    pub fn new(fd: File) -> FdMgmtSink {
        FdMgmtSink { fd: Mutex::new(fd) }
    }
}

impl MgmtSink for FdMgmtSink {
    fn send(&self, _local_port: u32, _remote_addr: Addr, body: &[u8]) -> std::io::Result<()> {
        self.fd.lock().unwrap().write_all(body)
    }
}

/// Runs the management event loop until the fd is closed. Blocking reads
/// are bounded so the periodic sweep still gets a chance to run even with
/// no traffic.
pub fn run(
    rib: Rib,
    mut mgmt_fd: File,
    table: Arc<dyn ForwardingTable>,
    sink: Arc<dyn MgmtSink>,
) {
    let mut buf = vec![0u8; MAX_FRAME_LEN];
    let mut last_periodic = Instant::now();

    loop {
        if last_periodic.elapsed() >= PERIODIC_INTERVAL {
            run_periodic(&rib, table.as_ref());
            last_periodic = Instant::now();
        }

        let n = match mgmt_fd.read(&mut buf) {
            Ok(0) => {
                info!("management fd closed, stopping event loop");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(%e, "management fd read failed");
                continue;
            }
        };

        let (header, body) = match rib::parse_frame(&buf[..n]) {
            Ok(parsed) => parsed,
            Err(e) => {
                e.log();
                continue;
            }
        };

        let msg = match JsonCdapCodec.decode(body) {
            Ok(msg) => msg,
            Err(e) => {
                e.log();
                continue;
            }
        };

        let Some(obj_name) = msg.obj_name.clone() else {
            warn!(?header, "CDAP message on mgmt fd missing obj_name");
            continue;
        };

        if let Err(e) = rib.dispatch(&obj_name, &msg, &table, &sink) {
            e.log();
        }
    }
}

fn run_periodic(rib: &Rib, table: &dyn ForwardingTable) {
    let mut inner = rib.lock();
    rib::reap_terminated_workers(&mut inner);
    rib::age_and_reroute(&mut inner, table);
}
