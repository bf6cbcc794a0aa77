//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The enrollment state machine (component C5), grounded on rlite's
//! `uipcp-normal-enroll.cpp` `enroll_fsm_handlers` table: one handler per
//! [`EnrollState`], driven by inbound CDAP opcodes, with a per-neighbor
//! timer that aborts a stalled handshake.

use std::sync::Arc;
use std::time::Duration;

use rina_cdap::{CdapCodec, CdapMessage, CdapOpcode, JsonCdapCodec};
use rina_utils::Addr;
use rina_utils::mgmt::FrameType;
use rina_utils::name::IpcpName;

use crate::collections::NeighborId;
use crate::debug::Debug;
use crate::error::Error;
use crate::neighbor::EnrollState;
use crate::payload;
use crate::rib::{self, HandlerTable, Rib, RibInner};
use crate::southbound::{ForwardingTable, MgmtSink};
use crate::tasks::{self, WorkerHandle, WorkerMsg};

/// The fields the FSM needs out of an inbound CDAP message; the RIB
/// dispatcher extracts these from the nested `EnrollmentInfo` object
/// before calling [`step`].
#[derive(Clone, Debug, Default)]
pub struct EnrollMsg {
    pub opcode: Option<CdapOpcode>,
    pub result: i32,
    pub address: Option<Addr>,
    pub start_early: bool,
}

impl EnrollMsg {
    pub fn opcode(opcode: CdapOpcode) -> EnrollMsg {
        EnrollMsg {
            opcode: Some(opcode),
            ..EnrollMsg::default()
        }
    }
}

/// Side effects the FSM asks its caller to perform. The RIB dispatcher
/// actually owns the CDAPConn and the RIB's address/lower-flow state, so
/// the FSM only ever returns intent.
#[derive(Debug)]
pub enum Effect {
    SendConnect,
    /// The slave's reply to `M_CONNECT`, sent before entering `S_WAIT_START`
    /// (source: `Neighbor::none`).
    SendConnectR,
    SendStart { address: Addr },
    SendStartR { address: Addr },
    SendCreateNeighborCandidates,
    SendStop { start_early: bool },
    SendStopR,
    SendStartStatus,
    SetAddress(Addr),
    CommitLowerFlowAndSync,
    RestartTimer,
    StopTimer,
    Abort,
    /// Dispatch to the RIB's generic handler table: an `M_CREATE`/`M_READ`
    /// etc. arriving once we're ENROLLED, or an `M_CREATE` arriving while
    /// `I_WAIT_STOP` is accepted per the source's carve-out.
    DispatchToRib,
    /// `M_START(status)` arrived after we already started early; no-op
    /// other than a log line (source: "Ignoring M_START(status)").
    IgnoreRedundantStart,
}

/// Runs one FSM step from `state` given `msg`, returning the next state
/// and the effects the caller must perform in order. Mirrors
/// `Neighbor::enroll_fsm_run` dispatching into the per-state handlers.
pub fn step(
    id: NeighborId,
    state: EnrollState,
    initiator: bool,
    msg: &EnrollMsg,
) -> (EnrollState, Vec<Effect>) {
    use CdapOpcode::*;
    use EnrollState::*;

    let (next, effects) = match state {
        None => {
            if initiator {
                (IWaitConnectR, vec![Effect::SendConnect])
            } else {
                (SWaitStart, vec![Effect::SendConnectR])
            }
        }

        IWaitConnectR => match msg.opcode {
            Some(MConnectR) if msg.result == 0 => (
                IWaitStartR,
                vec![Effect::SendStart { address: Addr(0) }, Effect::RestartTimer],
            ),
            _ => (None, vec![Effect::Abort]),
        },

        SWaitStart => match msg.opcode {
            Some(MStart) => {
                let address = msg.address.unwrap_or(Addr(0));
                (
                    IWaitStopR,
                    vec![
                        Effect::SetAddress(address),
                        Effect::SendStartR { address },
                        Effect::SendCreateNeighborCandidates,
                        Effect::SendStop { start_early: true },
                    ],
                )
            }
            _ => (None, vec![Effect::Abort]),
        },

        IWaitStartR => {
            if msg.result != 0 {
                (None, vec![Effect::Abort])
            } else {
                match msg.address {
                    Some(addr) if !addr.is_null() => (
                        IWaitStop,
                        vec![Effect::SetAddress(addr), Effect::RestartTimer],
                    ),
                    _ => (IWaitStop, vec![Effect::RestartTimer]),
                }
            }
        }

        IWaitStop => match msg.opcode {
            Some(MCreate) => (IWaitStop, vec![Effect::DispatchToRib]),
            Some(MStop) => {
                if let Some(addr) = msg.address {
                    let mut effects = vec![Effect::SetAddress(addr), Effect::SendStopR];
                    if msg.start_early {
                        effects.push(Effect::StopTimer);
                        effects.push(Effect::CommitLowerFlowAndSync);
                        (Enrolled, effects)
                    } else {
                        effects.push(Effect::RestartTimer);
                        // The canonical handshake would move to
                        // IWaitStart here, but that handler is a stub in
                        // the system this was modeled on: treat a
                        // deferred start as a protocol violation rather
                        // than enter an unimplemented state.
                        effects.push(Effect::Abort);
                        (None, effects)
                    }
                } else {
                    (None, vec![Effect::Abort])
                }
            }
            _ => (None, vec![Effect::Abort]),
        },

        SWaitStopR => match msg.opcode {
            Some(MStopR) if msg.result == 0 => (
                Enrolled,
                vec![
                    Effect::SendStartStatus,
                    Effect::StopTimer,
                    Effect::CommitLowerFlowAndSync,
                ],
            ),
            _ => (None, vec![Effect::Abort]),
        },

        IWaitStart => (None, vec![Effect::Abort]),

        Enrolled => {
            if msg.opcode == Some(MStart) {
                (Enrolled, vec![Effect::IgnoreRedundantStart])
            } else {
                (Enrolled, vec![Effect::DispatchToRib])
            }
        }
    };

    if next != state {
        Debug::EnrollmentStateChange(&id, state, next).log();
    }
    (next, effects)
}

/// Called by the per-neighbor timeout when no FSM progress has been made
/// in the allotted window (source: `enroll_timeout_cb` calling `abort`).
pub fn on_timeout(id: NeighborId, state: EnrollState) -> Error {
    Debug::EnrollmentTimeout(&id, state).log();
    Error::EnrollmentTimedOut(id)
}

/// How long a worker waits for handshake progress before treating silence
/// as a stalled enrollment (source: `kEnrollTimeout`).
const ENROLL_TIMER: Duration = Duration::from_secs(7);

/// Spawns the worker thread that owns one neighbor's enrollment handshake:
/// it drains `WorkerMsg::Cdap` off its queue, runs [`step`], executes the
/// resulting effects against the RIB, and rearms its own timeout on every
/// message the way `enroll_tmr_start`/`enroll_timeout_cb` do. `initiator`
/// workers kick the FSM off immediately, the way `Neighbor::initiate`
/// issues the first `M_CONNECT` without waiting on an inbound message.
pub fn spawn_worker(
    rib: Rib,
    table: Arc<dyn ForwardingTable>,
    sink: Arc<dyn MgmtSink>,
    neighbor_id: NeighborId,
    initiator: bool,
) -> WorkerHandle {
    WorkerHandle::spawn(neighbor_id, move |rx| {
        if initiator && !apply_step(&rib, table.as_ref(), sink.as_ref(), neighbor_id, initiator, &EnrollMsg::default(), None) {
            return;
        }
        loop {
            match tasks::recv_with_timeout(&rx, ENROLL_TIMER) {
                Some(WorkerMsg::Cdap(msg)) => {
                    let enroll_msg = decode_enroll_msg(&msg);
                    if !apply_step(&rib, table.as_ref(), sink.as_ref(), neighbor_id, initiator, &enroll_msg, Some(&msg)) {
                        return;
                    }
                }
                Some(WorkerMsg::Timeout) => {
                    let Some(state) = current_state(&rib, neighbor_id) else {
                        return;
                    };
                    if !matches!(state, EnrollState::Enrolled | EnrollState::None) {
                        let _ = on_timeout(neighbor_id, state);
                        abort(&rib, neighbor_id);
                        return;
                    }
                }
                Some(WorkerMsg::Shutdown) | None => return,
            }
        }
    })
}

/// Reads the originating NeighFlow's current state, runs one FSM step,
/// stores the resulting state back on it, and executes the effects.
/// Returns whether the worker should keep running: a terminal `None`
/// (aborted) or `Enrolled` (handshake complete) ends the worker's job.
fn apply_step(
    rib: &Rib,
    table: &dyn ForwardingTable,
    sink: &dyn MgmtSink,
    neighbor_id: NeighborId,
    initiator: bool,
    msg: &EnrollMsg,
    raw: Option<&CdapMessage>,
) -> bool {
    let mut inner = rib.lock();
    let state = inner
        .neighbors
        .get_by_id(neighbor_id)
        .ok()
        .and_then(|n| n.mgmt_conn().map(|f| f.enroll_state))
        .unwrap_or(EnrollState::None);
    let (next, effects) = step(neighbor_id, state, initiator, msg);
    if let Ok(neigh) = inner.neighbors.get_by_id_mut(neighbor_id) {
        if let Some(flow) = neigh.mgmt_conn_mut() {
            flow.enroll_state = next;
        }
    }
    execute_effects(&mut inner, &rib.handlers, table, sink, neighbor_id, next, &effects, raw);
    !matches!(next, EnrollState::None | EnrollState::Enrolled)
}

fn current_state(rib: &Rib, neighbor_id: NeighborId) -> Option<EnrollState> {
    rib.lock()
        .neighbors
        .get_by_id(neighbor_id)
        .ok()
        .and_then(|n| n.mgmt_conn().map(|f| f.enroll_state))
}

fn abort(rib: &Rib, neighbor_id: NeighborId) {
    let mut inner = rib.lock();
    if let Ok(neigh) = inner.neighbors.get_by_id_mut(neighbor_id) {
        if let Some(flow) = neigh.mgmt_conn_mut() {
            flow.enroll_state = EnrollState::None;
        }
    }
    if let Some(latch) = inner.enrolled_latches.remove(&neighbor_id) {
        latch.signal();
    }
}

fn decode_enroll_msg(msg: &CdapMessage) -> EnrollMsg {
    let (address, start_early) = msg
        .obj_value
        .as_deref()
        .and_then(|b| payload::decode::<payload::EnrollmentInfo>(b).ok())
        .map(|info| (info.address.map(Addr), info.start_early))
        .unwrap_or((None, false));
    EnrollMsg {
        opcode: Some(msg.opcode),
        result: msg.result.unwrap_or(0),
        address,
        start_early,
    }
}

/// Runs every effect from one FSM step against the locked RIB.
/// `RestartTimer`/`StopTimer` need no action here: the worker's own
/// `recv_with_timeout` loop re-arms on every message it processes, so the
/// timer already restarts implicitly; this just documents that the two
/// effects are observed rather than silently dropped.
fn execute_effects(
    inner: &mut RibInner,
    handlers: &HandlerTable,
    table: &dyn ForwardingTable,
    sink: &dyn MgmtSink,
    neighbor_id: NeighborId,
    next: EnrollState,
    effects: &[Effect],
    raw: Option<&CdapMessage>,
) {
    let myname = inner.myname.clone();
    let Ok(neigh_name) = inner.neighbors.get_by_id(neighbor_id).map(|n| n.name.clone()) else {
        return;
    };

    for effect in effects {
        match effect {
            Effect::SendConnect => {
                send_enroll(inner, sink, neighbor_id, &myname, &neigh_name, CdapOpcode::MConnect, None, false)
            }
            Effect::SendConnectR => {
                send_enroll(inner, sink, neighbor_id, &myname, &neigh_name, CdapOpcode::MConnectR, None, false)
            }
            Effect::SendStart { address } => send_enroll(
                inner,
                sink,
                neighbor_id,
                &myname,
                &neigh_name,
                CdapOpcode::MStart,
                Some(*address),
                false,
            ),
            Effect::SendStartR { address } => send_enroll(
                inner,
                sink,
                neighbor_id,
                &myname,
                &neigh_name,
                CdapOpcode::MStartR,
                Some(*address),
                false,
            ),
            Effect::SendCreateNeighborCandidates => {
                send_neighbor_candidates(inner, sink, neighbor_id, &myname, &neigh_name)
            }
            Effect::SendStop { start_early } => send_enroll(
                inner,
                sink,
                neighbor_id,
                &myname,
                &neigh_name,
                CdapOpcode::MStop,
                None,
                *start_early,
            ),
            Effect::SendStopR => {
                send_enroll(inner, sink, neighbor_id, &myname, &neigh_name, CdapOpcode::MStopR, None, false)
            }
            Effect::SendStartStatus => {
                send_enroll(inner, sink, neighbor_id, &myname, &neigh_name, CdapOpcode::MStartR, None, false)
            }
            Effect::SetAddress(addr) => {
                if inner.myaddr.is_null() && !addr.is_null() {
                    inner.set_address(*addr);
                }
                if let Ok(neigh) = inner.neighbors.get_by_id_mut(neighbor_id) {
                    neigh.address = Some(*addr);
                }
            }
            Effect::CommitLowerFlowAndSync => {
                if let Ok(neigh) = inner.neighbors.get_by_id(neighbor_id) {
                    if let Some(remote_addr) = neigh.address {
                        let remote_node = neigh.name.to_string();
                        inner.lfdb.update_local(remote_addr, remote_node, 1, true);
                    }
                }
                inner.run_spf(table);
                if let Some(latch) = inner.enrolled_latches.get(&neighbor_id) {
                    latch.signal();
                }
            }
            Effect::RestartTimer | Effect::StopTimer => {}
            Effect::Abort => {
                if let Some(latch) = inner.enrolled_latches.remove(&neighbor_id) {
                    latch.signal();
                }
                Debug::EnrollmentAbort(&neighbor_id, next).log();
            }
            Effect::DispatchToRib => {
                if let Some(raw) = raw {
                    if let Some(obj_name) = raw.obj_name.as_deref() {
                        if let Some(handler) = rib::resolve_handler(handlers, obj_name).copied() {
                            let _ = handler(inner, raw, table, sink);
                        }
                    }
                }
            }
            Effect::IgnoreRedundantStart => {}
        }
    }
}

fn send_enroll(
    inner: &RibInner,
    sink: &dyn MgmtSink,
    neighbor_id: NeighborId,
    myname: &IpcpName,
    neigh_name: &IpcpName,
    opcode: CdapOpcode,
    address: Option<Addr>,
    start_early: bool,
) {
    let Ok(neigh) = inner.neighbors.get_by_id(neighbor_id) else {
        return;
    };
    let Some(port_id) = neigh.mgmt_port_id else {
        return;
    };
    let remote_addr = neigh.address.unwrap_or(rina_utils::addr::RL_ADDR_NULL);
    let info = payload::EnrollmentInfo { address: address.map(|a| a.0), start_early };
    let body = payload::encode(&info);
    let msg = CdapMessage::new(opcode, myname.clone(), neigh_name.clone()).with_object(
        rina_cdap::object::OBJ_CLASS_ENROLLMENT,
        rina_cdap::object::OBJ_NAME_ENROLLMENT,
        body,
    );
    send_framed(sink, port_id, remote_addr, &msg);
}

fn send_neighbor_candidates(
    inner: &RibInner,
    sink: &dyn MgmtSink,
    neighbor_id: NeighborId,
    myname: &IpcpName,
    neigh_name: &IpcpName,
) {
    let Ok(neigh) = inner.neighbors.get_by_id(neighbor_id) else {
        return;
    };
    let Some(port_id) = neigh.mgmt_port_id else {
        return;
    };
    let remote_addr = neigh.address.unwrap_or(rina_utils::addr::RL_ADDR_NULL);
    let candidates = payload::NeighborCandidateList(
        inner
            .neighbors
            .iter()
            .filter(|n| n.id != neighbor_id)
            .filter_map(|n| {
                Some(payload::NeighborCandidateWire {
                    process_name: n.name.process_name.clone(),
                    process_instance: n.name.process_instance.clone(),
                    address: n.address?.0,
                })
            })
            .collect(),
    );
    let body = payload::encode(&candidates);
    let msg = CdapMessage::new(CdapOpcode::MCreate, myname.clone(), neigh_name.clone()).with_object(
        rina_cdap::object::OBJ_CLASS_NEIGHBORS,
        rina_cdap::object::OBJ_NAME_NEIGHBORS,
        body,
    );
    send_framed(sink, port_id, remote_addr, &msg);
}

fn send_framed(sink: &dyn MgmtSink, port_id: u32, remote_addr: Addr, msg: &CdapMessage) {
    let Ok(bytes) = JsonCdapCodec.encode(msg) else {
        return;
    };
    let Ok(framed) = rib::encode_frame(FrameType::OutLocalPort, port_id, remote_addr, &bytes) else {
        return;
    };
    let _ = sink.send(port_id, remote_addr, &framed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use EnrollState::*;

    #[test]
    fn initiator_starts_with_connect() {
        let (next, effects) = step(1, None, true, &EnrollMsg::default());
        assert_eq!(next, IWaitConnectR);
        assert!(matches!(effects[0], Effect::SendConnect));
    }

    #[test]
    fn slave_sends_connect_r_before_waiting_for_start() {
        let (next, effects) = step(1, None, false, &EnrollMsg::default());
        assert_eq!(next, SWaitStart);
        assert!(matches!(effects[0], Effect::SendConnectR));
    }

    #[test]
    fn negative_connect_r_aborts() {
        let msg = EnrollMsg {
            opcode: Some(CdapOpcode::MConnectR),
            result: -1,
            ..EnrollMsg::default()
        };
        let (next, effects) = step(1, IWaitConnectR, true, &msg);
        assert_eq!(next, None);
        assert!(matches!(effects[0], Effect::Abort));
    }

    #[test]
    fn start_early_handshake_reaches_enrolled_on_initiator() {
        let msg = EnrollMsg {
            opcode: Some(CdapOpcode::MStop),
            address: Some(Addr(7)),
            start_early: true,
            ..EnrollMsg::default()
        };
        let (next, effects) = step(1, IWaitStop, true, &msg);
        assert_eq!(next, Enrolled);
        assert!(effects.iter().any(|e| matches!(e, Effect::CommitLowerFlowAndSync)));
    }

    #[test]
    fn deferred_start_is_rejected_as_protocol_violation() {
        let msg = EnrollMsg {
            opcode: Some(CdapOpcode::MStop),
            address: Some(Addr(7)),
            start_early: false,
            ..EnrollMsg::default()
        };
        let (next, effects) = step(1, IWaitStop, true, &msg);
        assert_eq!(next, None);
        assert!(effects.iter().any(|e| matches!(e, Effect::Abort)));
    }

    #[test]
    fn slave_reaches_enrolled_on_stop_r() {
        let msg = EnrollMsg {
            opcode: Some(CdapOpcode::MStopR),
            result: 0,
            ..EnrollMsg::default()
        };
        let (next, _) = step(1, SWaitStopR, false, &msg);
        assert_eq!(next, Enrolled);
    }

    #[test]
    fn entry_into_i_wait_start_always_aborts() {
        let (next, effects) = step(1, IWaitStart, true, &EnrollMsg::default());
        assert_eq!(next, None);
        assert!(matches!(effects[0], Effect::Abort));
    }

    #[test]
    fn enrolled_ignores_redundant_start_status() {
        let msg = EnrollMsg::opcode(CdapOpcode::MStart);
        let (next, effects) = step(1, Enrolled, true, &msg);
        assert_eq!(next, Enrolled);
        assert!(matches!(effects[0], Effect::IgnoreRedundantStart));
    }
}
