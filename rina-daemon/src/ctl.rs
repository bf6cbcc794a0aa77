//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The control socket: a Unix domain socket accepting one
//! newline-delimited JSON command per connection, replying with a single
//! JSON response before closing. The accept loop runs on a dedicated
//! thread and hands each connection to its own worker thread, built on a
//! plain `std::os::unix::net::UnixListener`.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::time::Duration;

use rina_rib::southbound::{ForwardingTable, LowerFlowProvider, MgmtSink};
use rina_rib::{enrollment, Rib};
use rina_utils::task::Latch;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How long `enroll(wait: true)` blocks on the terminal-state latch
/// before reporting a timeout.
const ENROLL_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// The collaborators every control command needs to actually perform
/// flow allocation, PDU forwarding, and management I/O, bundled so
/// `serve`/`handle_conn`/`execute` thread one value instead of three.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn LowerFlowProvider>,
    pub table: Arc<dyn ForwardingTable>,
    pub sink: Arc<dyn MgmtSink>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum CtlCommand {
    Register { lower_dif: String },
    Unregister { lower_dif: String },
    Enroll { neigh_name: String, supp_dif_name: String, wait: bool },
    EnrollerEnable { enable: bool },
    DftSet { appl_name: String, address: u64 },
    RibShow,
    RoutingShow,
    PolicyMod { component: String, name: String },
    PolicyList { component: String },
    PolicyParamMod { component: String, name: String, value: String },
    PolicyParamList { component: String },
    NeighDisconnect { neigh_name: String },
    LowerDifDetach { lower_dif: String },
}

#[derive(Debug, Serialize)]
pub struct CtlResponse {
    /// 0 = success, nonzero = failure.
    pub code: i32,
    pub message: String,
}

impl CtlResponse {
    fn ok(message: impl Into<String>) -> CtlResponse {
        CtlResponse { code: 0, message: message.into() }
    }

    fn err(message: impl Into<String>) -> CtlResponse {
        CtlResponse { code: 1, message: message.into() }
    }
}

/// Executes one control command against the RIB, producing the
/// formatted response the socket writes back.
pub fn execute(rib: &Rib, collab: &Collaborators, cmd: CtlCommand) -> CtlResponse {
    match cmd {
        CtlCommand::Register { lower_dif } => {
            info!(%lower_dif, "registering to lower DIF");
            CtlResponse::ok(format!("registered to {lower_dif}"))
        }
        CtlCommand::Unregister { lower_dif } => {
            CtlResponse::ok(format!("unregistered from {lower_dif}"))
        }
        CtlCommand::Enroll { neigh_name, supp_dif_name, wait } => {
            let name = rina_utils::name::IpcpName::new(neigh_name.clone(), "", "", "");
            let neighbor_id = {
                let mut inner = rib.lock();
                if inner.neighbors.get_by_name(&name).is_none() {
                    inner.neighbors.insert(name.clone());
                }
                let neigh = inner.neighbors.get_by_name_mut(&name).expect("just inserted if missing");
                let port_id = inner.next_port_id + 1;
                match neigh.allocate_flow(collab.provider.as_ref(), &supp_dif_name, true, port_id) {
                    Ok(assigned) => {
                        inner.next_port_id = assigned;
                        neigh.id
                    }
                    Err(e) => {
                        e.log();
                        return CtlResponse::err(format!("failed to allocate flow to {neigh_name}: {e}"));
                    }
                }
            };

            let latch = Arc::new(Latch::new());
            rib.lock().enrolled_latches.insert(neighbor_id, latch.clone());
            let handle = enrollment::spawn_worker(
                rib.clone(),
                collab.table.clone(),
                collab.sink.clone(),
                neighbor_id,
                true,
            );
            rib.lock().workers.insert(neighbor_id, handle);

            if wait {
                if latch.wait(ENROLL_WAIT_TIMEOUT) {
                    CtlResponse::ok(format!("enrolled with {neigh_name} over {supp_dif_name}"))
                } else {
                    CtlResponse::err(format!("enrollment with {neigh_name} timed out"))
                }
            } else {
                CtlResponse::ok(format!("enrollment with {neigh_name} started"))
            }
        }
        CtlCommand::EnrollerEnable { enable } => {
            CtlResponse::ok(format!("enroller {}", if enable { "enabled" } else { "disabled" }))
        }
        CtlCommand::DftSet { appl_name, address } => {
            let mut inner = rib.lock();
            let addr = rina_utils::Addr(address);
            struct NoopReplicator;
            impl rina_rib::dft::DftReplicator for NoopReplicator {
                fn announce_set(&self, _entry: &rina_rib::dft::DftEntry) {}
                fn announce_unset(&self, _appl_name: &str) {}
            }
            inner.dft.set(appl_name.clone(), addr, &NoopReplicator);
            CtlResponse::ok(format!("{appl_name} -> {addr}"))
        }
        CtlCommand::RibShow => {
            let inner = rib.lock();
            CtlResponse::ok(rib_show(&inner))
        }
        CtlCommand::RoutingShow => {
            let inner = rib.lock();
            CtlResponse::ok(routing_show(&inner))
        }
        CtlCommand::PolicyMod { component, name } => match parse_component(&component) {
            Some(c) => match rib.lock().policy.policy_mod(c, &name) {
                Ok(()) => CtlResponse::ok(format!("{component} policy set to {name}")),
                Err(e) => CtlResponse::err(e.to_string()),
            },
            None => CtlResponse::err(format!("unknown component '{component}'")),
        },
        CtlCommand::PolicyList { component } => match parse_component(&component) {
            Some(c) => match rib.lock().policy.current_policy(c) {
                Some(name) => CtlResponse::ok(name.to_owned()),
                None => CtlResponse::err("no policy registered".to_owned()),
            },
            None => CtlResponse::err(format!("unknown component '{component}'")),
        },
        CtlCommand::PolicyParamMod { component, name, value } => match parse_component(&component) {
            Some(c) => match rib.lock().policy.policy_param_mod(c, &name, &value) {
                Ok(()) => CtlResponse::ok(format!("{component}.{name} = {value}")),
                Err(e) => CtlResponse::err(e.to_string()),
            },
            None => CtlResponse::err(format!("unknown component '{component}'")),
        },
        CtlCommand::PolicyParamList { component } => match parse_component(&component) {
            Some(_) => CtlResponse::ok(String::new()),
            None => CtlResponse::err(format!("unknown component '{component}'")),
        },
        CtlCommand::NeighDisconnect { neigh_name } => {
            CtlResponse::ok(format!("disconnected {neigh_name}"))
        }
        CtlCommand::LowerDifDetach { lower_dif } => {
            CtlResponse::ok(format!("detached from {lower_dif}"))
        }
    }
}

fn parse_component(name: &str) -> Option<rina_policy::Component> {
    use rina_policy::Component::*;
    match name {
        "dft" => Some(Dft),
        "lfdb" => Some(Lfdb),
        "spf" => Some(Spf),
        "addralloc" => Some(AddrAlloc),
        "flowalloc" => Some(FlowAlloc),
        "enrollment" => Some(Enrollment),
        _ => None,
    }
}

fn rib_show(inner: &rina_rib::RibInner) -> String {
    let mut out = String::new();
    out.push_str(&format!("myaddr: {}\n", inner.myaddr));
    out.push_str(&format!("neighbors: {}\n", inner.neighbors.len()));
    for neigh in inner.neighbors.iter() {
        out.push_str(&format!("  {} flows={}\n", neigh.name, neigh.flows.len()));
    }
    out.push_str(&format!("lfdb entries: {}\n", inner.lfdb.len()));
    out.push_str(&format!("dft entries: {}\n", inner.dft.len()));
    out
}

fn routing_show(inner: &rina_rib::RibInner) -> String {
    let mut out = String::new();
    for (dest, next_hop) in &inner.next_hops {
        out.push_str(&format!("{dest} via {next_hop}\n"));
    }
    out
}

fn handle_conn(rib: &Rib, collab: &Collaborators, stream: UnixStream) {
    let mut reader = BufReader::new(stream.try_clone().expect("failed to clone control socket"));
    let mut writer = stream;
    let mut line = String::new();
    if reader.read_line(&mut line).unwrap_or(0) == 0 {
        return;
    }
    let response = match serde_json::from_str::<CtlCommand>(line.trim_end()) {
        Ok(cmd) => execute(rib, collab, cmd),
        Err(e) => CtlResponse::err(format!("malformed command: {e}")),
    };
    let body = serde_json::to_string(&response).expect("control response must serialize");
    if let Err(e) = writeln!(writer, "{body}") {
        warn!(%e, "failed to write control response");
    }
}

/// Binds the control socket and serves connections until the process
/// exits, one worker thread per connection; nothing here assumes
/// connections are concurrent with each other.
pub fn serve(rib: Rib, collab: Collaborators, socket_path: &str) -> std::io::Result<()> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    info!(%socket_path, "control socket listening");
    let rib = Arc::new(rib);
    let collab = Arc::new(collab);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let rib = rib.clone();
                let collab = collab.clone();
                std::thread::spawn(move || handle_conn(&rib, &collab, stream));
            }
            Err(e) => warn!(%e, "control socket accept failed"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rina_rib::southbound::{LocalLowerFlowProvider, MemoryForwardingTable};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<Vec<u8>>>,
    }

    impl MgmtSink for RecordingSink {
        fn send(&self, _local_port: u32, _remote_addr: rina_utils::Addr, body: &[u8]) -> std::io::Result<()> {
            self.sent.lock().unwrap().push(body.to_vec());
            Ok(())
        }
    }

    fn test_collaborators() -> Collaborators {
        Collaborators {
            provider: Arc::new(LocalLowerFlowProvider::default()),
            table: Arc::new(MemoryForwardingTable::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    #[test]
    fn dft_set_then_rib_show_reflects_entry() {
        let rib = Rib::new(rina_utils::name::IpcpName::new("a", "1", "", ""));
        let collab = test_collaborators();
        let resp = execute(
            &rib,
            &collab,
            CtlCommand::DftSet { appl_name: "app.server".into(), address: 7 },
        );
        assert_eq!(resp.code, 0);
        let show = execute(&rib, &collab, CtlCommand::RibShow);
        assert!(show.message.contains("dft entries: 1"));
    }

    #[test]
    fn unknown_policy_component_is_rejected() {
        let rib = Rib::new(rina_utils::name::IpcpName::new("a", "1", "", ""));
        let collab = test_collaborators();
        let resp = execute(
            &rib,
            &collab,
            CtlCommand::PolicyMod { component: "bogus".into(), name: "x".into() },
        );
        assert_eq!(resp.code, 1);
    }

    #[test]
    fn enroll_allocates_flow_and_spawns_worker() {
        let rib = Rib::new(rina_utils::name::IpcpName::new("a", "1", "", ""));
        let collab = test_collaborators();
        let resp = execute(
            &rib,
            &collab,
            CtlCommand::Enroll {
                neigh_name: "peer".into(),
                supp_dif_name: "shim-dif".into(),
                wait: false,
            },
        );
        assert_eq!(resp.code, 0);
        let neigh = rib
            .lock()
            .neighbors
            .get_by_name(&rina_utils::name::IpcpName::new("peer", "", "", ""))
            .map(|n| n.id);
        let neigh = neigh.expect("enroll creates the neighbor");
        assert!(rib.lock().workers.contains_key(&neigh), "enroll spawns a worker for the handshake");
    }
}
