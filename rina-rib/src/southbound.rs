//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The seams to the external collaborators this crate treats as out of
//! scope: the OS-level flow-allocation API (N-1 flows), the kernel's PDU
//! forwarding table, and the management-fd transport enrollment and
//! LFDB/DFT sync write framed PDUs to. All three are plain traits so the
//! RIB can be driven and tested without a kernel RINA stack underneath
//! it. `Sync` is required on top of `Send` because enrollment workers
//! hold these behind an `Arc` shared across the dispatch thread and the
//! per-neighbor worker thread.

use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Mutex;
use std::time::Duration;

use rina_utils::Addr;

/// Allocates N-1 (lower) flows on behalf of the RIB by issuing an
/// OS-level flow-allocate request with a 2-second timeout.
pub trait LowerFlowProvider: Send + Sync {
    /// Allocates a flow to `neigh_name` over `supp_dif`, returning the
    /// resulting fd and lower IPCP id. `timeout` bounds the OS call.
    fn allocate(
        &self,
        neigh_name: &str,
        supp_dif: &str,
        timeout: Duration,
    ) -> std::io::Result<(RawFd, u32)>;

    fn deallocate(&self, fd: RawFd) -> std::io::Result<()>;
}

pub const FLOW_ALLOC_TIMEOUT: Duration = Duration::from_secs(2);

/// The kernel-side PDU Forwarding Table: `destination_addr ->
/// local_port_id`, mutated only via flush-then-reinstall so the kernel
/// never observes a partial table, keeping the swap atomic from the
/// kernel's viewpoint.
pub trait ForwardingTable: Send + Sync {
    fn flush(&self);
    fn set(&self, dest: Addr, port_id: u32);
}

/// Sends a framed management PDU to a neighbor's N-1 flow, addressed by
/// local port-id the way `mgmt_write` keys a write by the port it goes
/// out on. Implemented by whatever owns the management fd, since the RIB
/// itself never holds a raw descriptor.
pub trait MgmtSink: Send + Sync {
    fn send(&self, local_port: u32, remote_addr: Addr, body: &[u8]) -> std::io::Result<()>;
}

/// An in-memory `ForwardingTable` used by tests and by a userspace-only IPCP
/// that has no kernel datapath to program.
#[derive(Debug, Default)]
pub struct MemoryForwardingTable {
    entries: std::sync::Mutex<std::collections::BTreeMap<Addr, u32>>,
}

impl ForwardingTable for MemoryForwardingTable {
    fn flush(&self) {
        self.entries.lock().unwrap().clear();
    }

    fn set(&self, dest: Addr, port_id: u32) {
        self.entries.lock().unwrap().insert(dest, port_id);
    }
}

impl MemoryForwardingTable {
    pub fn snapshot(&self) -> std::collections::BTreeMap<Addr, u32> {
        self.entries.lock().unwrap().clone()
    }
}

/// Allocates N-1 flows as anonymous Unix domain socket pairs instead of
/// requesting one from a real shim DIF, for a userspace-only IPCP with no
/// kernel datapath to ask. Both ends of the pair are kept alive in
/// `open` until `deallocate` drops them, closing the fd handed out by
/// `allocate` without ever reconstructing it from a raw descriptor.
#[derive(Debug, Default)]
pub struct LocalLowerFlowProvider {
    open: Mutex<HashMap<RawFd, (UnixStream, UnixStream)>>,
}

impl LowerFlowProvider for LocalLowerFlowProvider {
    fn allocate(
        &self,
        _neigh_name: &str,
        _supp_dif: &str,
        _timeout: Duration,
    ) -> std::io::Result<(RawFd, u32)> {
        let (ours, theirs) = UnixStream::pair()?;
        let fd = theirs.as_raw_fd();
        self.open.lock().unwrap().insert(fd, (ours, theirs));
        Ok((fd, fd as u32))
    }

    fn deallocate(&self, fd: RawFd) -> std::io::Result<()> {
        self.open.lock().unwrap().remove(&fd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_provider_allocates_and_deallocates() {
        let provider = LocalLowerFlowProvider::default();
        let (fd, _lower_ipcp_id) = provider.allocate("peer", "shim-dif", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.open.lock().unwrap().len(), 1);
        provider.deallocate(fd).unwrap();
        assert!(provider.open.lock().unwrap().is_empty());
    }
}
