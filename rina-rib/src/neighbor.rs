//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! Neighbor and NeighFlow (components C3/C4), grounded on rlite's
//! `uipcp-normal-enroll.cpp` `Neighbor` and `NeighFlow` classes.

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::time::Instant;

use rina_cdap::{CdapConn, JsonCdapCodec};
use rina_utils::Addr;
use rina_utils::name::IpcpName;

use crate::collections::NeighborId;
use crate::debug::Debug;
use crate::error::Error;
use crate::southbound::{FLOW_ALLOC_TIMEOUT, LowerFlowProvider};

/// The eight enrollment states. `I_*` are initiator-side, `S_*` are
/// enroller-side.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnrollState {
    None,
    IWaitConnectR,
    SWaitStart,
    IWaitStartR,
    SWaitStopR,
    IWaitStop,
    /// Asserted unreachable in rlite's enrollment FSM; kept in the enum
    /// for completeness, entry into it is always a protocol violation.
    IWaitStart,
    Enrolled,
}

/// One N-1 flow to a neighbor (component C3).
pub struct NeighFlow {
    pub neigh_name: IpcpName,
    pub supp_dif: String,
    pub port_id: u32,
    pub flow_fd: RawFd,
    pub lower_ipcp_id: u32,
    pub reliable: bool,
    pub initiator: bool,
    pub enroll_state: EnrollState,
    pub conn: CdapConn<JsonCdapCodec>,
    pub stats: NeighFlowStats,
    pub last_activity: Instant,
    pub enroll_timeout_id: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeighFlowStats {
    pub keepalive_misses: u32,
    pub msgs_sent: u64,
    pub msgs_received: u64,
}

impl NeighFlow {
    pub fn new(
        neigh_name: IpcpName,
        supp_dif: String,
        port_id: u32,
        flow_fd: RawFd,
        lower_ipcp_id: u32,
        reliable: bool,
        initiator: bool,
    ) -> NeighFlow {
        NeighFlow {
            neigh_name,
            supp_dif,
            port_id,
            flow_fd,
            lower_ipcp_id,
            reliable,
            initiator,
            enroll_state: EnrollState::None,
            conn: CdapConn::new(JsonCdapCodec),
            stats: NeighFlowStats::default(),
            last_activity: Instant::now(),
            enroll_timeout_id: None,
        }
    }
}

impl std::fmt::Debug for NeighFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighFlow")
            .field("port_id", &self.port_id)
            .field("enroll_state", &self.enroll_state)
            .field("reliable", &self.reliable)
            .field("initiator", &self.initiator)
            .finish()
    }
}

/// A peer IPCP (component C4). Owns 1..N NeighFlows keyed by port-id.
#[derive(Debug)]
pub struct Neighbor {
    pub id: NeighborId,
    pub name: IpcpName,
    pub address: Option<Addr>,
    pub flows: HashMap<u32, NeighFlow>,
    pub mgmt_port_id: Option<u32>,
    pub unheard_since: Option<Instant>,
    pub auto_reconnect: bool,
    pub reconnect_pending: bool,
}

impl Neighbor {
    pub fn new(id: NeighborId, name: IpcpName) -> Neighbor {
        let neigh = Neighbor {
            id,
            name,
            address: None,
            flows: HashMap::new(),
            mgmt_port_id: None,
            unheard_since: None,
            auto_reconnect: false,
            reconnect_pending: false,
        };
        Debug::NeighborCreate(&neigh.id).log();
        neigh
    }

    /// Installs a new flow; the first one added becomes the management
    /// conduit.
    pub fn add_flow(&mut self, flow: NeighFlow) {
        let port_id = flow.port_id;
        if self.mgmt_port_id.is_none() {
            self.mgmt_port_id = Some(port_id);
        }
        self.flows.insert(port_id, flow);
    }

    pub fn remove_flow(
        &mut self,
        port_id: u32,
        provider: &dyn LowerFlowProvider,
    ) -> Option<NeighFlow> {
        let flow = self.flows.remove(&port_id)?;
        let _ = provider.deallocate(flow.flow_fd);
        if self.mgmt_port_id == Some(port_id) {
            // Promote any remaining flow to management, arbitrarily.
            self.mgmt_port_id = self.flows.keys().next().copied();
        }
        Some(flow)
    }

    /// Returns the NeighFlow designated as the management conduit.
    pub fn mgmt_conn(&self) -> Option<&NeighFlow> {
        let port_id = self.mgmt_port_id?;
        self.flows.get(&port_id)
    }

    pub fn mgmt_conn_mut(&mut self) -> Option<&mut NeighFlow> {
        let port_id = self.mgmt_port_id?;
        self.flows.get_mut(&port_id)
    }

    pub fn has_mgmt_flow(&self) -> bool {
        self.mgmt_port_id.is_some()
    }

    /// Promotes `port_id` to management and prunes the old one, closing it
    /// via `provider`. Used on re-enrollment to hand management duty to
    /// the new flow.
    pub fn promote_mgmt_flow(&mut self, port_id: u32, provider: &dyn LowerFlowProvider) {
        if self.mgmt_port_id == Some(port_id) {
            return;
        }
        if let Some(old) = self.mgmt_port_id.take() {
            self.remove_flow(old, provider);
        }
        self.mgmt_port_id = Some(port_id);
    }

    /// Allocates a new N-1 flow over `supp_dif` and installs it. The RIB
    /// mutex must be released around the OS call; callers pass a provider
    /// obtained before locking or drop the guard themselves.
    pub fn allocate_flow(
        &mut self,
        provider: &dyn LowerFlowProvider,
        supp_dif: &str,
        initiator: bool,
        next_port_id: u32,
    ) -> Result<u32, Error> {
        let (fd, lower_ipcp_id) = provider
            .allocate(&self.name.to_string(), supp_dif, FLOW_ALLOC_TIMEOUT)
            .map_err(Error::IoError)?;
        let flow = NeighFlow::new(
            self.name.clone(),
            supp_dif.to_owned(),
            next_port_id,
            fd,
            lower_ipcp_id,
            true,
            initiator,
        );
        self.add_flow(flow);
        Ok(next_port_id)
    }

    /// Closes every flow fd and reports removal to the lower-flow topology
    /// tracker.
    pub fn teardown(&mut self, provider: &dyn LowerFlowProvider) {
        for (_, flow) in self.flows.drain() {
            let _ = provider.deallocate(flow.flow_fd);
        }
        self.mgmt_port_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_flow_becomes_mgmt() {
        let mut neigh = Neighbor::new(1, IpcpName::new("b", "1", "", ""));
        neigh.add_flow(NeighFlow::new(
            neigh.name.clone(),
            "shim-dif".into(),
            7,
            3,
            0,
            true,
            true,
        ));
        assert_eq!(neigh.mgmt_port_id, Some(7));
        assert!(neigh.has_mgmt_flow());
        assert_eq!(neigh.mgmt_conn().unwrap().port_id, 7);
    }
}
