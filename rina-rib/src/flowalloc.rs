//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The end-to-end Flow Allocator (component C10): a per-flow state
//! machine driven on the initiator side by `fa_req` and on the remote
//! side by `fa_resp`, exchanging `M_CREATE`/`M_CREATE_R` on
//! `/mgmt/flowalloc/flows`.

use std::collections::HashMap;

use rina_utils::Addr;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowState {
    /// `fa_req` issued, `M_CREATE` sent, awaiting `M_CREATE_R`.
    Pending,
    /// Remote side received the request and is deciding whether to accept.
    PendingRemote,
    /// Local and remote ports are bound.
    Allocated,
}

/// Per-flow QoS and reliability parameters.
#[derive(Clone, Copy, Debug)]
pub struct FlowConfig {
    pub force_flow_control: bool,
    pub max_cwq_len: u32,
    pub initial_credit: u32,
    pub initial_a: u32,
    pub initial_rtx_timeout_ms: u32,
    pub max_rtxq_len: u32,
}

impl Default for FlowConfig {
    fn default() -> FlowConfig {
        FlowConfig {
            force_flow_control: false,
            max_cwq_len: 128,
            initial_credit: 0,
            initial_a: 0,
            initial_rtx_timeout_ms: 1000,
            max_rtxq_len: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Flow {
    pub local_port: u32,
    pub remote_port: Option<u32>,
    pub dest_addr: Addr,
    pub dest_appl: String,
    pub state: FlowState,
    pub config: FlowConfig,
}

/// Sends allocator traffic to a destination address; implemented by the
/// RIB dispatcher.
pub trait FlowAllocTransport: Send {
    fn send_create(&self, dest_addr: Addr, local_port: u32, dest_appl: &str, config: &FlowConfig);
    fn send_create_r(&self, dest_addr: Addr, remote_port: u32, local_port: u32, accepted: bool);
    fn send_delete(&self, dest_addr: Addr, remote_port: u32);
}

#[derive(Debug, Default)]
pub struct FlowAllocator {
    flows: HashMap<u32, Flow>,
    next_port_id: u32,
}

impl FlowAllocator {
    pub fn new() -> FlowAllocator {
        FlowAllocator::default()
    }

    fn alloc_port_id(&mut self) -> u32 {
        self.next_port_id += 1;
        self.next_port_id
    }

    /// Initiator side: allocates a local port-id, resolves `dest_appl` via
    /// the Directory Forwarding Table (the caller supplies the already-
    /// resolved `dest_addr` since DFT lookups live on [`crate::dft::Dft`]),
    /// and emits `M_CREATE`.
    pub fn fa_req(
        &mut self,
        dest_appl: String,
        dest_addr: Addr,
        config: FlowConfig,
        transport: &dyn FlowAllocTransport,
    ) -> u32 {
        let local_port = self.alloc_port_id();
        transport.send_create(dest_addr, local_port, &dest_appl, &config);
        self.flows.insert(
            local_port,
            Flow {
                local_port,
                remote_port: None,
                dest_addr,
                dest_appl,
                state: FlowState::Pending,
                config,
            },
        );
        local_port
    }

    /// Remote side: an `M_CREATE` arrived proposing a flow. The caller
    /// decides acceptance (e.g. by checking local application
    /// registration) and this records the half-open state.
    pub fn fa_resp(
        &mut self,
        remote_port: u32,
        dest_appl: String,
        dest_addr: Addr,
        config: FlowConfig,
        accept: bool,
        transport: &dyn FlowAllocTransport,
    ) -> Option<u32> {
        if !accept {
            transport.send_create_r(dest_addr, remote_port, 0, false);
            return None;
        }
        let local_port = self.alloc_port_id();
        transport.send_create_r(dest_addr, remote_port, local_port, true);
        self.flows.insert(
            local_port,
            Flow {
                local_port,
                remote_port: Some(remote_port),
                dest_addr,
                dest_appl,
                state: FlowState::Allocated,
                config,
            },
        );
        Some(local_port)
    }

    /// Completes the initiator side on receipt of `M_CREATE_R`, binding
    /// the local port to the remote one.
    pub fn complete(&mut self, local_port: u32, remote_port: u32, accepted: bool) -> bool {
        let Some(flow) = self.flows.get_mut(&local_port) else {
            return false;
        };
        if !accepted {
            self.flows.remove(&local_port);
            return false;
        }
        flow.remote_port = Some(remote_port);
        flow.state = FlowState::Allocated;
        true
    }

    /// Tears down flow state and issues `M_DELETE`.
    pub fn flow_deallocated(&mut self, local_port: u32, transport: &dyn FlowAllocTransport) {
        if let Some(flow) = self.flows.remove(&local_port) {
            if let Some(remote_port) = flow.remote_port {
                transport.send_delete(flow.dest_addr, remote_port);
            }
        }
    }

    pub fn get(&self, local_port: u32) -> Option<&Flow> {
        self.flows.get(&local_port)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }
}
