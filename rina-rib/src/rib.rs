//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The RIB dispatcher (component C11): the handler table, management I/O
//! framing, and the periodic tasks that tie every other component
//! together under a single mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rina_cdap::object::container_name;
use rina_cdap::{CdapCodec, CdapMessage, CdapOpcode, JsonCdapCodec};
use rina_policy::PolicyRegistry;
use rina_utils::Addr;
use rina_utils::mgmt::{FrameType, Header};
use rina_utils::name::IpcpName;
use rina_utils::task::Latch;

use crate::addralloc::AddressAllocator;
use crate::collections::{NeighborId, Neighbors};
use crate::dft::Dft;
use crate::enrollment;
use crate::error::Error;
use crate::flowalloc::FlowAllocator;
use crate::lfdb::{Lfdb, LowerFlow};
use crate::payload;
use crate::southbound::{ForwardingTable, LowerFlowProvider, MgmtSink};
use crate::{spf, tasks};

/// Every mutation of the RIB happens under this single lock.
pub struct RibInner {
    pub myname: IpcpName,
    pub myaddr: Addr,
    pub neighbors: Neighbors,
    pub lfdb: Lfdb,
    pub dft: Dft,
    pub addralloc: AddressAllocator,
    pub flowalloc: FlowAllocator,
    pub policy: PolicyRegistry,
    pub next_hops: HashMap<Addr, Addr>,
    pub next_port_id: u32,
    pub workers: HashMap<NeighborId, tasks::WorkerHandle>,
    pub enrolled_latches: HashMap<NeighborId, Arc<Latch>>,
}

impl RibInner {
    pub fn new(myname: IpcpName) -> RibInner {
        RibInner {
            lfdb: Lfdb::new(Addr(0)),
            myname,
            myaddr: Addr(0),
            neighbors: Neighbors::default(),
            dft: Dft::new(),
            addralloc: AddressAllocator::new(),
            flowalloc: FlowAllocator::new(),
            policy: PolicyRegistry::default(),
            next_hops: HashMap::new(),
            next_port_id: 0,
            workers: HashMap::new(),
            enrolled_latches: HashMap::new(),
        }
    }

    /// Assigns the IPCP's own address, re-keying the LFDB to the new
    /// origin (source: `rib->set_address`).
    pub fn set_address(&mut self, addr: Addr) {
        self.myaddr = addr;
        self.lfdb = Lfdb::new(addr);
    }

    pub fn alloc_port_id(&mut self) -> u32 {
        self.next_port_id += 1;
        self.next_port_id
    }

    /// Reruns the shortest-path engine and pushes the result to the
    /// kernel forwarding table. Called after any LFDB change.
    pub fn run_spf(&mut self, table: &dyn ForwardingTable) {
        self.next_hops = spf::run(self.myaddr, &self.lfdb);
        spf::pduft_sync(&self.next_hops, &self.neighbors, table);
    }
}

/// Looks up a handler by exact object name, falling back to the
/// container name on miss: strip the last `/`-segment and retry with
/// the container name, single level.
pub fn resolve_handler<'a>(table: &'a HandlerTable, obj_name: &str) -> Option<&'a Handler> {
    table
        .get(obj_name)
        .or_else(|| container_name(obj_name).and_then(|c| table.get(c)))
}

pub type Handler =
    fn(&mut RibInner, &CdapMessage, &dyn ForwardingTable, &dyn MgmtSink) -> Result<(), Error>;
pub type HandlerTable = HashMap<&'static str, Handler>;

/// Builds the object-name → handler table over the CDAP object
/// namespace. `/mgmt/enrollment` is deliberately absent: it is routed to
/// a per-neighbor worker by [`Rib::dispatch`] instead of a synchronous
/// handler, since the enrollment FSM needs its own timeout thread.
pub fn build_handler_table() -> HandlerTable {
    let mut table: HandlerTable = HashMap::new();
    table.insert(rina_cdap::object::OBJ_NAME_DFT, handle_dft);
    table.insert(rina_cdap::object::OBJ_NAME_LFDB, handle_lfdb);
    table.insert(rina_cdap::object::OBJ_NAME_NEIGHBORS, handle_neighbors);
    table.insert(rina_cdap::object::OBJ_NAME_KEEPALIVE, handle_keepalive);
    table.insert(
        rina_cdap::object::OBJ_NAME_OPERATIONAL_STATUS,
        handle_operational_status,
    );
    table
}

/// Applies a `/mgmt/dft/table` `M_CREATE`/`M_DELETE` carrying a
/// [`payload::DftEntryList`] (source: `uipcp_rib::dft_handler`).
fn handle_dft(
    rib: &mut RibInner,
    msg: &CdapMessage,
    _table: &dyn ForwardingTable,
    _sink: &dyn MgmtSink,
) -> Result<(), Error> {
    if !matches!(msg.opcode, CdapOpcode::MCreate | CdapOpcode::MDelete) {
        return Err(Error::UnexpectedOpcode(0, crate::neighbor::EnrollState::Enrolled));
    }
    let bytes = msg
        .obj_value
        .as_deref()
        .ok_or(Error::MissingNestedObject(0, "dft_entries"))?;
    let entries: payload::DftEntryList = payload::decode(bytes)?;
    for entry in entries.0 {
        match msg.opcode {
            CdapOpcode::MCreate => rib.dft.apply_remote(crate::dft::DftEntry {
                appl_name: entry.appl_name,
                address: Addr(entry.address),
                timestamp: now(),
            }),
            CdapOpcode::MDelete => rib.dft.apply_remote_unset(&entry.appl_name),
            _ => unreachable!("opcode checked above"),
        }
    }
    Ok(())
}

/// Applies a `/mgmt/routing/lfdb` `M_CREATE` carrying a
/// [`payload::LowerFlowList`], reruns the shortest-path engine if
/// anything changed, and re-floods the changed entries to every other
/// neighbor with split horizon (source: `uipcp_rib::lfdb_handler` plus
/// `remote_sync_obj_excluding`).
fn handle_lfdb(
    rib: &mut RibInner,
    msg: &CdapMessage,
    table: &dyn ForwardingTable,
    sink: &dyn MgmtSink,
) -> Result<(), Error> {
    if msg.opcode != CdapOpcode::MCreate {
        return Err(Error::MissingNestedObject(0, "lfdb_entries"));
    }
    let bytes = msg
        .obj_value
        .as_deref()
        .ok_or(Error::MissingNestedObject(0, "lfdb_entries"))?;
    let entries: payload::LowerFlowList = payload::decode(bytes)?;
    let parsed: Vec<LowerFlow> = entries.0.into_iter().map(|w| w.into_lower_flow()).collect();
    let changed = rib.lfdb.handle_update(parsed);
    if changed.is_empty() {
        return Ok(());
    }
    rib.run_spf(table);
    flood_lfdb_update(rib, sink, &msg.src_appl, &changed);
    Ok(())
}

/// Sends the changed entries to every neighbor except `exclude_src`
/// (split horizon), addressed over each neighbor's management flow.
fn flood_lfdb_update(rib: &RibInner, sink: &dyn MgmtSink, exclude_src: &IpcpName, changed: &[LowerFlow]) {
    let body = payload::encode(&payload::LowerFlowList(changed.iter().map(payload::LowerFlowWire::from).collect()));
    for neigh in rib.neighbors.iter() {
        if &neigh.name == exclude_src {
            continue;
        }
        let Some(flow) = neigh.mgmt_conn() else {
            continue;
        };
        let remote_addr = neigh.address.unwrap_or(rina_utils::addr::RL_ADDR_NULL);
        let msg = CdapMessage::new(CdapOpcode::MCreate, rib.myname.clone(), neigh.name.clone()).with_object(
            rina_cdap::object::OBJ_CLASS_LFDB,
            rina_cdap::object::OBJ_NAME_LFDB,
            body.clone(),
        );
        let Ok(bytes) = JsonCdapCodec.encode(&msg) else {
            continue;
        };
        let Ok(framed) = encode_frame(FrameType::OutLocalPort, flow.port_id, remote_addr, &bytes) else {
            continue;
        };
        let _ = sink.send(flow.port_id, remote_addr, &framed);
    }
}

/// Merges gossiped [`payload::NeighborCandidateWire`]s into the neighbor
/// table: any candidate not already known is created, and a known
/// neighbor with no address yet learns one (source: `uipcp_rib`'s
/// neighbors-enroller handling step 5 of the enrollment sequence).
fn handle_neighbors(
    rib: &mut RibInner,
    msg: &CdapMessage,
    _table: &dyn ForwardingTable,
    _sink: &dyn MgmtSink,
) -> Result<(), Error> {
    let bytes = msg
        .obj_value
        .as_deref()
        .ok_or(Error::MissingNestedObject(0, "neigh_entries"))?;
    let candidates: payload::NeighborCandidateList = payload::decode(bytes)?;
    for cand in candidates.0 {
        let name = IpcpName::new(cand.process_name, cand.process_instance, "", "");
        if name == rib.myname {
            continue;
        }
        let address = Addr(cand.address);
        match rib.neighbors.get_by_name_mut(&name) {
            Some(neigh) => {
                if neigh.address.is_none() {
                    neigh.address = Some(address);
                }
            }
            None => {
                let (_, neigh) = rib.neighbors.insert(name);
                neigh.address = Some(address);
            }
        }
    }
    Ok(())
}

/// Keepalive handler: a bare liveness ping on `/mgmt/keepalive`. Nothing
/// further to do here — refreshing `last_activity`/`unheard_since` is
/// handled uniformly for every object by [`Rib::mark_heard`] once the
/// handler returns successfully.
fn handle_keepalive(
    _rib: &mut RibInner,
    _msg: &CdapMessage,
    _table: &dyn ForwardingTable,
    _sink: &dyn MgmtSink,
) -> Result<(), Error> {
    Ok(())
}

/// `/mgmt/operational_status` toggles whether this IPCP is willing to
/// enroll new peers. The control socket's `enroller-enable` command
/// surfaces the same state; this is the wire-side counterpart another
/// IPCP can query or flip.
fn handle_operational_status(
    _rib: &mut RibInner,
    _msg: &CdapMessage,
    _table: &dyn ForwardingTable,
    _sink: &dyn MgmtSink,
) -> Result<(), Error> {
    Ok(())
}

/// Parses a management frame off the wire: header, then body handed to
/// the resolved NeighFlow or, for A-DATA, dispatched with `src_addr`
/// taken from the header in place of a NeighFlow.
pub fn parse_frame(buf: &[u8]) -> Result<(Header, &[u8]), Error> {
    rina_utils::mgmt::check_frame_len(buf.len()).map_err(|_| Error::FrameTooLarge(buf.len()))?;
    let header = Header::decode(buf).map_err(|_| Error::FrameTooLarge(buf.len()))?;
    Ok((header, &buf[rina_utils::mgmt::HEADER_LEN..]))
}

pub fn encode_frame(frame_type: FrameType, local_port: u32, remote_addr: Addr, body: &[u8]) -> Result<Vec<u8>, Error> {
    rina_utils::mgmt::check_frame_len(rina_utils::mgmt::HEADER_LEN + body.len())
        .map_err(|_| Error::FrameTooLarge(body.len()))?;
    let header = Header {
        frame_type,
        local_port,
        remote_addr: remote_addr.0,
        flags: 0,
    };
    let mut out = header.encode().to_vec();
    out.extend_from_slice(body);
    Ok(out)
}

/// The shared top-level handle a daemon binds its control socket and
/// management fd to: a small transient pool of enrollment workers
/// around a single RIB mutex.
#[derive(Clone)]
pub struct Rib {
    inner: Arc<Mutex<RibInner>>,
    pub handlers: Arc<HandlerTable>,
}

impl Rib {
    pub fn new(myname: IpcpName) -> Rib {
        Rib {
            inner: Arc::new(Mutex::new(RibInner::new(myname))),
            handlers: Arc::new(build_handler_table()),
        }
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, RibInner> {
        self.inner.lock().unwrap()
    }

    /// Dispatches one inbound CDAP message through the handler table
    /// under the RIB mutex, routing `/mgmt/enrollment` traffic to the
    /// neighbor's worker instead. Updates `unheard_since` and the
    /// originating NeighFlow's `last_activity` on success, the way the
    /// periodic reaper expects every object handler to refresh liveness.
    pub fn dispatch(
        &self,
        obj_name: &str,
        msg: &CdapMessage,
        table: &Arc<dyn ForwardingTable>,
        sink: &Arc<dyn MgmtSink>,
    ) -> Result<(), Error> {
        if obj_name == rina_cdap::object::OBJ_NAME_ENROLLMENT
            || container_name(obj_name) == Some(rina_cdap::object::OBJ_NAME_ENROLLMENT)
        {
            return self.dispatch_enrollment(msg, table, sink);
        }
        let handler = *resolve_handler(&self.handlers, obj_name)
            .ok_or(Error::MissingNestedObject(0, "unknown object"))?;
        let mut inner = self.lock();
        handler(&mut inner, msg, table.as_ref(), sink.as_ref())?;
        mark_heard(&mut inner, &msg.src_appl);
        Ok(())
    }

    /// Routes an inbound `/mgmt/enrollment` message to the originating
    /// neighbor's worker, lazily spawning one the first time a given
    /// neighbor is heard from (the slave side of a handshake has no
    /// worker until the peer's `M_CONNECT` arrives).
    fn dispatch_enrollment(
        &self,
        msg: &CdapMessage,
        table: &Arc<dyn ForwardingTable>,
        sink: &Arc<dyn MgmtSink>,
    ) -> Result<(), Error> {
        let neighbor_id = {
            let mut inner = self.lock();
            match inner.neighbors.get_by_name(&msg.src_appl) {
                Some(neigh) => neigh.id,
                None => inner.neighbors.insert(msg.src_appl.clone()).1.id,
            }
        };
        if !self.lock().workers.contains_key(&neighbor_id) {
            let handle = enrollment::spawn_worker(self.clone(), table.clone(), sink.clone(), neighbor_id, false);
            self.lock().workers.insert(neighbor_id, handle);
        }
        let delivered = self
            .lock()
            .workers
            .get(&neighbor_id)
            .map(|w| w.send(tasks::WorkerMsg::Cdap(msg.clone())).is_ok())
            .unwrap_or(false);
        if delivered {
            mark_heard(&mut self.lock(), &msg.src_appl);
        }
        Ok(())
    }
}

/// Refreshes liveness on the neighbor a message was just handled for:
/// clears `unheard_since` and bumps the management NeighFlow's
/// `last_activity`, the way `rib_process_event` touches a neighbor on
/// every message it successfully routes.
fn mark_heard(rib: &mut RibInner, src: &IpcpName) {
    if let Some(neigh) = rib.neighbors.get_by_name_mut(src) {
        neigh.unheard_since = None;
        if let Some(flow) = neigh.mgmt_conn_mut() {
            flow.last_activity = now();
        }
    }
}

/// The ten-second periodic sweep: reap dead workers, retry
/// auto-reconnect neighbors, open backing N-flows, scan for address
/// conflicts. Each step is a free function so the event loop can call
/// them without holding the lock longer than one step needs.
pub const PERIODIC_INTERVAL: Duration = Duration::from_secs(10);

pub fn reap_terminated_workers(rib: &mut RibInner) {
    rib.workers.retain(|_, w| !w.is_finished());
}

pub fn age_and_reroute(rib: &mut RibInner, table: &dyn ForwardingTable) {
    if rib.lfdb.age_tick() {
        rib.run_spf(table);
    }
}

pub fn retry_auto_reconnect(rib: &mut RibInner, provider: &dyn LowerFlowProvider, supp_dif: &str) {
    let pending: Vec<_> = rib
        .neighbors
        .iter()
        .filter(|n| n.auto_reconnect && n.reconnect_pending)
        .map(|n| n.name.clone())
        .collect();
    for name in pending {
        if let Some(neigh) = rib.neighbors.get_by_name_mut(&name) {
            let port_id = rib.next_port_id + 1;
            if neigh.allocate_flow(provider, supp_dif, true, port_id).is_ok() {
                neigh.reconnect_pending = false;
                rib.next_port_id = port_id;
            }
        }
    }
}

pub fn now() -> Instant {
    Instant::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbor::NeighFlow;
    use crate::southbound::MemoryForwardingTable;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<(u32, Addr, Vec<u8>)>>,
    }

    impl MgmtSink for RecordingSink {
        fn send(&self, local_port: u32, remote_addr: Addr, body: &[u8]) -> std::io::Result<()> {
            self.sent.lock().unwrap().push((local_port, remote_addr, body.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn handler_table_resolves_exact_and_container_names() {
        let table = build_handler_table();
        assert!(resolve_handler(&table, rina_cdap::object::OBJ_NAME_DFT).is_some());
        assert!(resolve_handler(&table, "/mgmt/dft/table/extra").is_some());
        assert!(resolve_handler(&table, "/nonexistent").is_none());
    }

    #[test]
    fn enrollment_has_no_synchronous_handler() {
        let table = build_handler_table();
        assert!(resolve_handler(&table, rina_cdap::object::OBJ_NAME_ENROLLMENT).is_none());
    }

    #[test]
    fn frame_round_trips_through_encode_parse() {
        let body = b"payload".to_vec();
        let framed = encode_frame(FrameType::OutLocalPort, 7, Addr(0), &body).unwrap();
        let (header, parsed_body) = parse_frame(&framed).unwrap();
        assert_eq!(header.local_port, 7);
        assert_eq!(parsed_body, body.as_slice());
    }

    #[test]
    fn set_address_rekeys_lfdb() {
        let mut rib = RibInner::new(IpcpName::new("a", "1", "", ""));
        rib.set_address(Addr(42));
        assert_eq!(rib.myaddr, Addr(42));
        assert!(rib.lfdb.is_empty());
    }

    #[test]
    fn handle_dft_applies_create_and_delete() {
        let mut rib = RibInner::new(IpcpName::new("me", "1", "", ""));
        let table = MemoryForwardingTable::default();
        let sink = RecordingSink::default();
        let peer = IpcpName::new("peer", "1", "", "");

        let create_body = payload::encode(&payload::DftEntryList(vec![payload::DftEntryWire {
            appl_name: "app.x".into(),
            address: 9,
        }]));
        let create = CdapMessage::new(CdapOpcode::MCreate, peer.clone(), rib.myname.clone()).with_object(
            rina_cdap::object::OBJ_CLASS_DFT,
            rina_cdap::object::OBJ_NAME_DFT,
            create_body,
        );
        handle_dft(&mut rib, &create, &table, &sink).unwrap();
        assert_eq!(rib.dft.resolve("app.x"), Addr(9));

        let delete_body = payload::encode(&payload::DftEntryList(vec![payload::DftEntryWire {
            appl_name: "app.x".into(),
            address: 9,
        }]));
        let delete = CdapMessage::new(CdapOpcode::MDelete, peer, rib.myname.clone()).with_object(
            rina_cdap::object::OBJ_CLASS_DFT,
            rina_cdap::object::OBJ_NAME_DFT,
            delete_body,
        );
        handle_dft(&mut rib, &delete, &table, &sink).unwrap();
        assert!(rib.dft.resolve("app.x").is_null());
    }

    #[test]
    fn handle_lfdb_applies_update_reruns_spf_and_floods_excluding_sender() {
        let mut rib = RibInner::new(IpcpName::new("me", "1", "", ""));
        rib.set_address(Addr(1));
        let other = IpcpName::new("other", "1", "", "");
        let (_, neigh) = rib.neighbors.insert(other.clone());
        neigh.address = Some(Addr(3));
        neigh.add_flow(NeighFlow::new(other.clone(), "shim-dif".into(), 5, 9, 0, true, true));

        let sender = IpcpName::new("sender", "1", "", "");
        let table = MemoryForwardingTable::default();
        let sink = RecordingSink::default();
        let entry = payload::LowerFlowWire {
            local_addr: 2,
            remote_addr: 3,
            local_node: "x".into(),
            remote_node: "y".into(),
            cost: 1,
            seqnum: 1,
            state: true,
        };
        let body = payload::encode(&payload::LowerFlowList(vec![entry]));
        let msg = CdapMessage::new(CdapOpcode::MCreate, sender, rib.myname.clone()).with_object(
            rina_cdap::object::OBJ_CLASS_LFDB,
            rina_cdap::object::OBJ_NAME_LFDB,
            body,
        );

        handle_lfdb(&mut rib, &msg, &table, &sink).unwrap();

        assert_eq!(rib.lfdb.len(), 1);
        let flooded = sink.sent.lock().unwrap();
        assert_eq!(flooded.len(), 1, "re-floods to the one neighbor that is not the sender");
        assert_eq!(flooded[0].0, 5, "addressed over the neighbor's management port");
    }

    #[test]
    fn handle_neighbors_creates_unknown_and_fills_missing_address() {
        let mut rib = RibInner::new(IpcpName::new("me", "1", "", ""));
        let candidates = payload::NeighborCandidateList(vec![
            payload::NeighborCandidateWire {
                process_name: "me".into(),
                process_instance: "1".into(),
                address: 99,
            },
            payload::NeighborCandidateWire {
                process_name: "new-peer".into(),
                process_instance: "1".into(),
                address: 5,
            },
        ]);
        let body = payload::encode(&candidates);
        let msg = CdapMessage::new(CdapOpcode::MCreate, IpcpName::new("existing", "1", "", ""), rib.myname.clone())
            .with_object(
                rina_cdap::object::OBJ_CLASS_NEIGHBORS,
                rina_cdap::object::OBJ_NAME_NEIGHBORS,
                body,
            );
        let table = MemoryForwardingTable::default();
        let sink = RecordingSink::default();

        handle_neighbors(&mut rib, &msg, &table, &sink).unwrap();

        assert!(rib.neighbors.get_by_name(&rib.myname).is_none(), "self is never added as a neighbor");
        let learned = rib.neighbors.get_by_name(&IpcpName::new("new-peer", "1", "", "")).unwrap();
        assert_eq!(learned.address, Some(Addr(5)));
    }

    #[test]
    fn reap_terminated_workers_drops_only_finished_handles() {
        let mut rib = RibInner::new(IpcpName::new("me", "1", "", ""));
        let finished = tasks::WorkerHandle::spawn(1, |rx| {
            let _ = rx.recv();
        });
        finished.send(tasks::WorkerMsg::Shutdown).unwrap();
        for _ in 0..100 {
            if finished.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let running = tasks::WorkerHandle::spawn(2, |rx| {
            let _ = rx.recv();
            let _ = rx.recv();
        });
        rib.workers.insert(1, finished);
        rib.workers.insert(2, running);

        reap_terminated_workers(&mut rib);

        assert!(!rib.workers.contains_key(&1));
        assert!(rib.workers.contains_key(&2));
    }

    #[test]
    fn mark_heard_clears_unheard_and_bumps_activity() {
        let mut rib = RibInner::new(IpcpName::new("me", "1", "", ""));
        let peer = IpcpName::new("peer", "1", "", "");
        let (_, neigh) = rib.neighbors.insert(peer.clone());
        neigh.unheard_since = Some(now() - Duration::from_secs(60));
        neigh.add_flow(NeighFlow::new(peer.clone(), "shim-dif".into(), 1, 1, 0, true, true));
        let stale = neigh.mgmt_conn().unwrap().last_activity;

        std::thread::sleep(Duration::from_millis(5));
        mark_heard(&mut rib, &peer);

        let neigh = rib.neighbors.get_by_name(&peer).unwrap();
        assert!(neigh.unheard_since.is_none());
        assert!(neigh.mgmt_conn().unwrap().last_activity > stale);
    }

    #[test]
    fn dispatch_enrollment_spawns_worker_and_slave_replies() {
        let rib = Rib::new(IpcpName::new("me", "1", "", ""));
        let table: Arc<dyn ForwardingTable> = Arc::new(MemoryForwardingTable::default());
        let sink_inner = Arc::new(RecordingSink::default());
        let sink: Arc<dyn MgmtSink> = sink_inner.clone();

        let peer = IpcpName::new("peer", "1", "", "");
        let myname = {
            let mut inner = rib.lock();
            let (_, neigh) = inner.neighbors.insert(peer.clone());
            neigh.add_flow(NeighFlow::new(peer.clone(), "shim-dif".into(), 1, 1, 0, true, false));
            inner.myname.clone()
        };

        let msg = CdapMessage::new(CdapOpcode::MConnect, peer.clone(), myname).with_object(
            rina_cdap::object::OBJ_CLASS_ENROLLMENT,
            rina_cdap::object::OBJ_NAME_ENROLLMENT,
            Vec::new(),
        );

        rib.dispatch(rina_cdap::object::OBJ_NAME_ENROLLMENT, &msg, &table, &sink).unwrap();

        for _ in 0..100 {
            if !sink_inner.sent.lock().unwrap().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!sink_inner.sent.lock().unwrap().is_empty(), "slave replies with M_CONNECT_R");
        let neighbor_id = rib.lock().neighbors.get_by_name(&peer).unwrap().id;
        assert!(rib.lock().workers.contains_key(&neighbor_id));
    }
}
